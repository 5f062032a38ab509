//! Client connection settings

use serde::Deserialize;

use crate::error::{Error, Result};

/// Settings for one `ApiClient`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server origin, e.g. `https://medkit.example.com`. The `/api` prefix
    /// is added by the client.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Paths whose own 401 never triggers a token refresh. An entry ending
    /// in `/` matches every path below it.
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
}

fn default_timeout() -> u64 {
    30
}

fn default_exempt_paths() -> Vec<String> {
    medkit_auth::DEFAULT_EXEMPT_PATHS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout(),
            exempt_paths: default_exempt_paths(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got: {:?}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Whether `path` is exempt from the refresh protocol.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| {
            if p.ends_with('/') {
                path.starts_with(p.as_str())
            } else {
                path == p
            }
        })
    }
}
