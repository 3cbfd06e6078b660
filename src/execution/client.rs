use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use super::wire::{self, StartRequest, StartResponse, StatusResponse};
use super::{ExecutionApi, ExecutionRequest, ExecutionStatus, RunHandle};
use crate::error::ClientError;
use crate::log::BuildLog;
use crate::secret::Secret;

/// Upper bound on any single request. There are no retries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the Testsigma execution API.
pub struct ExecutionClient {
    http: Client,
    endpoint: Url,
    api_key: Secret,
    log: BuildLog,
    last_result: String,
}

impl ExecutionClient {
    pub fn new(endpoint: Url, api_key: Secret, log: BuildLog) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ClientError::Transport {
                url: endpoint.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            log,
            last_result: String::new(),
        })
    }

    pub fn for_request(request: &ExecutionRequest, log: BuildLog) -> Result<Self, ClientError> {
        Self::new(request.endpoint.clone(), request.api_key.clone(), log)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Endpoint {
                endpoint: self.endpoint.to_string(),
                reason: "cannot be used as a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(header::AUTHORIZATION, format!("Bearer {}", self.api_key.expose()))
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, url: &Url, req: RequestBuilder) -> Result<Response, ClientError> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        if !resp.status().is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp)
    }

    async fn try_start(&self, test_plan_id: &str) -> Result<Option<RunHandle>, ClientError> {
        let url = self.url(&["execution_results"])?;
        debug!(%url, "starting test plan execution");
        let req = self.http.post(url.clone()).json(&StartRequest::new(test_plan_id));
        let resp = self.send(&url, req).await?;
        let body: StartResponse = resp.json().await.map_err(|e| ClientError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.run_handle())
    }

    async fn try_status(&self, run: &RunHandle) -> Result<StatusResponse, ClientError> {
        let url = self.url(&["execution_results", run.run_id()])?;
        let resp = self.send(&url, self.http.get(url.clone())).await?;
        resp.json().await.map_err(|e| ClientError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn download(&self, url: &Url, part: &Path) -> Result<(), ClientError> {
        let io_err = |source| ClientError::Io {
            path: part.to_path_buf(),
            source,
        };

        let mut resp = self.send(url, self.http.get(url.clone())).await?;
        let mut file = tokio::fs::File::create(part).await.map_err(io_err)?;
        let mut written: u64 = 0;
        while let Some(chunk) = resp.chunk().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })? {
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        debug!(bytes = written, path = %part.display(), "report downloaded");
        Ok(())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait::async_trait]
impl ExecutionApi for ExecutionClient {
    async fn start(&mut self, test_plan_id: &str) -> Option<RunHandle> {
        match self.try_start(test_plan_id).await {
            Ok(Some(run)) => {
                self.log.println(format!("Test plan execution started, run id: {}", run));
                Some(run)
            }
            Ok(None) => {
                self.log.error("Start response did not contain a run id");
                None
            }
            Err(e) => {
                self.log.error(format!("Failed to start test plan execution: {}", e));
                None
            }
        }
    }

    async fn status(&mut self, run: &RunHandle) -> ExecutionStatus {
        match self.try_status(run).await {
            Ok(body) => {
                if let Some(result) = body.result.as_deref().map(str::trim) {
                    if !result.is_empty() {
                        self.last_result = result.to_string();
                    }
                }
                let raw = body.status.unwrap_or_default();
                let status = wire::parse_status(&raw);
                if status == ExecutionStatus::Unknown {
                    warn!(run_id = %run, raw_status = %raw, "unrecognised execution status");
                }
                self.log.println(format!("Execution status: {}", status));
                status
            }
            Err(e) => {
                warn!(run_id = %run, error = %e, "status check failed");
                self.log.println(format!("Status check failed, will retry: {}", e));
                ExecutionStatus::Unknown
            }
        }
    }

    async fn fetch_report(&mut self, run: &RunHandle, path: &Path) -> Result<(), ClientError> {
        let url = self.url(&["reports", "junit", run.run_id()])?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ClientError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let part = part_path(path);
        if let Err(e) = self.download(&url, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
        if let Err(source) = tokio::fs::rename(&part, path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(ClientError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
        self.log.println(format!("Report saved to {}", path.display()));
        Ok(())
    }

    fn last_result(&self) -> &str {
        &self.last_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> (ExecutionClient, crate::log::CapturedLines) {
        let (log, captured) = BuildLog::memory();
        let endpoint = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
        let client = ExecutionClient::new(endpoint, Secret::new("tsk_test"), log).unwrap();
        (client, captured)
    }

    #[tokio::test]
    async fn start_posts_plan_id_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/execution_results"))
            .and(header("authorization", "Bearer tsk_test"))
            .and(body_json(serde_json::json!({ "executionId": 2190 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 5501,
                "status": "STATUS_CREATED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (mut client, captured) = client_for(&server);
        let run = client.start("2190").await.unwrap();
        assert_eq!(run.run_id(), "5501");
        assert!(captured.contains("run id: 5501"));
    }

    #[tokio::test]
    async fn start_returns_none_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (mut client, captured) = client_for(&server);
        assert!(client.start("2190").await.is_none());
        assert!(captured.contains("401"));
    }

    #[tokio::test]
    async fn start_returns_none_on_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let (mut client, _) = client_for(&server);
        assert!(client.start("2190").await.is_none());
    }

    #[tokio::test]
    async fn status_maps_body_and_records_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/execution_results/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "STATUS_COMPLETED",
                "result": "SUCCESS"
            })))
            .mount(&server)
            .await;

        let (mut client, _) = client_for(&server);
        let run = RunHandle::new("77").unwrap();
        assert_eq!(client.status(&run).await, ExecutionStatus::Completed);
        assert_eq!(client.last_result(), "SUCCESS");
    }

    #[tokio::test]
    async fn status_failure_is_unknown_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (mut client, _) = client_for(&server);
        let run = RunHandle::new("77").unwrap();
        assert_eq!(client.status(&run).await, ExecutionStatus::Unknown);
        assert_eq!(client.last_result(), "");
    }

    #[tokio::test]
    async fn fetch_report_writes_body_to_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/reports/junit/77"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<testsuites/>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/junit.xml");
        let (mut client, _) = client_for(&server);
        let run = RunHandle::new("77").unwrap();
        client.fetch_report(&run, &target).await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "<testsuites/>");
        assert!(!part_path(&target).exists());
    }

    #[tokio::test]
    async fn fetch_report_http_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("junit.xml");
        let (mut client, _) = client_for(&server);
        let run = RunHandle::new("77").unwrap();
        let err = client.fetch_report(&run, &target).await.unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        assert!(!target.exists());
        assert!(!part_path(&target).exists());
    }

    fn report_mock() -> Mock {
        Mock::given(method("GET"))
            .and(path("/api/v1/reports/junit/77"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<testsuites/>"))
    }

    #[tokio::test]
    async fn fetch_report_parent_is_a_file_is_io_error() {
        let server = MockServer::start().await;
        report_mock().mount(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "not a directory").unwrap();
        let target = blocker.join("junit.xml");

        let (mut client, _) = client_for(&server);
        let run = RunHandle::new("77").unwrap();
        let err = client.fetch_report(&run, &target).await.unwrap_err();

        assert!(matches!(err, ClientError::Io { .. }));
        assert!(!target.exists());
        assert!(!part_path(&target).exists());
    }

    #[tokio::test]
    async fn fetch_report_failed_rename_removes_part_file() {
        let server = MockServer::start().await;
        report_mock().mount(&server).await;

        // A non-empty directory at the target path makes the final rename fail
        // after the body has been written.
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("junit.xml");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let (mut client, _) = client_for(&server);
        let run = RunHandle::new("77").unwrap();
        let err = client.fetch_report(&run, &target).await.unwrap_err();

        assert!(matches!(err, ClientError::Io { path: ref failed, .. } if failed == &target));
        assert!(target.is_dir());
        assert!(!part_path(&target).exists());
    }
}
