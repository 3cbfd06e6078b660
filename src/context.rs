//! Build context supplied by the host.

use std::collections::HashMap;

/// What the host knows about the running build: its id and the variables
/// that earlier steps or the environment made available.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    build_id: String,
    variables: HashMap<String, String>,
    inherit_env: bool,
}

impl BuildContext {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            variables: HashMap::new(),
            inherit_env: false,
        }
    }

    /// Fall back to process environment variables for names not set
    /// explicitly.
    pub fn with_env(mut self) -> Self {
        self.inherit_env = true;
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// Look up a build variable. Explicit variables win over the environment.
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(v) = self.variables.get(name) {
            return Some(v.clone());
        }
        if self.inherit_env {
            return std::env::var(name).ok();
        }
        None
    }
}
