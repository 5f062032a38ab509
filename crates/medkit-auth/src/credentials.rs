//! Credential storage for the session's bearer tokens
//!
//! The access and refresh tokens are always stored and removed together. A
//! store never exposes one without the other, so callers can treat "has a
//! refresh token" and "is signed in" as the same question.
//!
//! `FileTokenStore` persists the pair as a small JSON file using the fixed
//! keys `accessToken` / `refreshToken`, written with temp-file + rename so a
//! crash mid-write cannot leave half a pair behind. `MemoryTokenStore` keeps
//! the pair for the life of the process only.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// An access token together with the refresh token issued alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
        }
    }
}

/// Persistent home of the session's credential pair.
///
/// Uses `Pin<Box<dyn Future>>` return types so the client can hold an
/// `Arc<dyn TokenStore>` and tests can swap in their own store.
pub trait TokenStore: Send + Sync {
    /// Current pair, if signed in.
    fn get(&self) -> Pin<Box<dyn Future<Output = Option<CredentialPair>> + Send + '_>>;

    /// Replace the stored pair.
    fn set(&self, pair: CredentialPair) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Remove the stored pair. Clearing an empty store succeeds.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// On-disk layout. Both fields are optional so a damaged file can be
/// detected instead of failing the parse.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Token store backed by a JSON file.
///
/// The Mutex serializes writes; reads clone the in-memory copy so requests
/// never touch the disk.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<Option<CredentialPair>>,
}

impl FileTokenStore {
    /// Load the pair from the given file path.
    ///
    /// A missing file means signed out. A file holding only one of the two
    /// tokens is treated as signed out and removed.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let stored: StoredTokens = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;

            match (stored.access_token, stored.refresh_token) {
                (Some(access), Some(refresh)) => {
                    info!(path = %path.display(), "loaded session tokens");
                    Some(CredentialPair::new(access, refresh))
                }
                (None, None) => None,
                _ => {
                    warn!(path = %path.display(), "token file holds an incomplete pair, discarding");
                    remove_file(&path).await?;
                    None
                }
            }
        } else {
            debug!(path = %path.display(), "token file not found, starting signed out");
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Option<CredentialPair>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.clone() })
    }

    fn set(&self, pair: CredentialPair) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            write_atomic(&self.path, &pair).await?;
            *state = Some(pair);
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            *state = None;
            remove_file(&self.path).await
        })
    }
}

/// Token store that forgets everything when the process exits.
#[derive(Default)]
pub struct MemoryTokenStore {
    state: Mutex<Option<CredentialPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pair already stored.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            state: Mutex::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Option<CredentialPair>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.clone() })
    }

    fn set(&self, pair: CredentialPair) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().await = Some(pair);
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().await = None;
            Ok(())
        })
    }
}

/// Write the pair to a file atomically.
///
/// Writes a temp file in the same directory, restricts it to 0600 on unix,
/// then renames it over the target.
async fn write_atomic(path: &Path, pair: &CredentialPair) -> Result<()> {
    let stored = StoredTokens {
        access_token: Some(pair.access_token.expose().clone()),
        refresh_token: Some(pair.refresh_token.expose().clone()),
    };
    let json = serde_json::to_string_pretty(&stored)
        .map_err(|e| Error::CredentialParse(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted session tokens");
    Ok(())
}

async fn remove_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed token file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(format!("removing token file: {e}"))),
    }
}
