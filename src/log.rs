//! Build console sink.
//!
//! Progress lines are appended in call order to a single writer (the host's
//! build console) and mirrored as `tracing` events under the `build_log`
//! target. Lines are never reordered or rewritten.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::{error, info};

/// Append-only, clonable line sink shared by every component of a step.
#[derive(Clone)]
pub struct BuildLog {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

/// Read handle onto the lines captured by [`BuildLog::memory`].
#[derive(Clone, Default)]
pub struct CapturedLines {
    lines: Arc<Mutex<Vec<u8>>>,
}

impl BuildLog {
    /// Log to the process's standard output.
    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// In-memory sink, used by tests and embedding hosts that forward the
    /// lines themselves.
    pub fn memory() -> (Self, CapturedLines) {
        let captured = CapturedLines::default();
        let log = Self::to_writer(SharedBuf(captured.lines.clone()));
        (log, captured)
    }

    /// Append one progress line.
    pub fn println(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        info!(target: "build_log", "{}", line);
        self.write_line(line);
    }

    /// Append one error line, prefixed the way build consoles flag errors.
    pub fn error(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        error!(target: "build_log", "{}", line);
        self.write_line(&format!("ERROR: {}", line));
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // The console is best effort; a closed pipe must not fail the build.
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl CapturedLines {
    pub fn lines(&self) -> Vec<String> {
        let buf = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// True if any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_call_order_across_clones() {
        let (log, captured) = BuildLog::memory();
        let other = log.clone();
        log.println("first");
        other.error("second");
        log.println("third");
        assert_eq!(captured.lines(), vec!["first", "ERROR: second", "third"]);
    }
}
