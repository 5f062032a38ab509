//! Configuration types and loading
//!
//! Precedence: CLI flag > env vars > config file > defaults. The API origin
//! can come from `MEDKIT_API_URL` alone, so a config file is optional unless
//! one was asked for explicitly.

use medkit_client::ClientConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_api")]
    pub api: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Where the session tokens are kept between runs
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_api() -> ClientConfig {
    ClientConfig::new(String::new())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Load `path` if it exists; otherwise start from defaults.
    ///
    /// An explicitly requested file that is missing is still an error.
    pub fn load_or_default(path: &Path, explicit: bool) -> common::Result<Self> {
        if explicit || path.exists() {
            return Self::load(path);
        }
        Config {
            api: default_api(),
            session: SessionConfig::default(),
        }
        .finish()
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(url) = std::env::var("MEDKIT_API_URL") {
            self.api.base_url = url;
        }
        if self.api.base_url.is_empty() {
            return Err(common::Error::Config(
                "api.base_url is not set (config file or MEDKIT_API_URL)".into(),
            ));
        }
        self.api
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;
        Ok(self)
    }

    /// Token file from config, or the per-user default.
    pub fn token_file(&self) -> PathBuf {
        self.session
            .token_file
            .clone()
            .unwrap_or_else(default_token_file)
    }

    /// Resolve config file path from CLI arg or MEDKIT_CONFIG env var.
    ///
    /// The flag reports whether the user named the file explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("MEDKIT_CONFIG") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from("medkit.toml"), false)
    }
}

/// `$XDG_CONFIG_HOME/medkit/tokens.json`, falling back to `~/.config`.
fn default_token_file() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("medkit").join("tokens.json")
}
