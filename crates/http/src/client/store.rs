//! Durable storage for the bearer token and role

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tutora_core::{Role, StoredSession};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileTokenStore;

/// Token store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored session is unreadable: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for the current credentials
///
/// Shared by every in-flight request. Writes are last-write-wins and
/// readers must call [`TokenStore::read`] at dispatch time rather than
/// holding on to an earlier value.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a token and role, replacing whatever was stored
    async fn save(&self, token: &str, role: Option<Role>) -> Result<(), StoreError>;

    /// Current credentials, if any
    async fn read(&self) -> Result<Option<StoredSession>, StoreError>;

    /// Remove all stored credentials
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: RwLock<Option<StoredSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a session
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, token: &str, role: Option<Role>) -> Result<(), StoreError> {
        *self.session.write().await = Some(StoredSession::new(token, role));
        Ok(())
    }

    async fn read(&self) -> Result<Option<StoredSession>, StoreError> {
        Ok(self.session.read().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.session.write().await = None;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::{StoreError, TokenStore};
    use async_trait::async_trait;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};
    use tokio::sync::Mutex;
    use tracing::debug;
    use tutora_core::{Role, StoredSession};

    const SESSION_FILE: &str = "session.json";

    /// Token store backed by a JSON file
    ///
    /// The file holds a single object with the `token` and `role` keys.
    /// Saves go through a temporary file and a rename so readers never see a
    /// half-written session.
    #[derive(Debug)]
    pub struct FileTokenStore {
        path: PathBuf,
        write_lock: Mutex<()>,
    }

    impl FileTokenStore {
        /// Store keeping `session.json` inside `dir`
        pub fn new(dir: impl AsRef<Path>) -> Self {
            Self::at_path(dir.as_ref().join(SESSION_FILE))
        }

        /// Store using an exact file path
        pub fn at_path(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                write_lock: Mutex::new(()),
            }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    #[async_trait]
    impl TokenStore for FileTokenStore {
        async fn save(&self, token: &str, role: Option<Role>) -> Result<(), StoreError> {
            let _guard = self.write_lock.lock().await;

            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let contents = serde_json::to_vec_pretty(&StoredSession::new(token, role))?;
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, contents).await?;
            tokio::fs::rename(&tmp, &self.path).await?;

            debug!("Saved session to {}", self.path.display());
            Ok(())
        }

        async fn read(&self) -> Result<Option<StoredSession>, StoreError> {
            match tokio::fs::read(&self.path).await {
                Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        async fn clear(&self) -> Result<(), StoreError> {
            let _guard = self.write_lock.lock().await;

            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!("Removed session file {}", self.path.display());
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    }
}
