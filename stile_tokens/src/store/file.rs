//! A file-backed session store

use std::{io, path::PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;

use super::{StoreError, StoredSession, TokenStore};

/// A session store backed by a single local file
///
/// The whole session is written as one JSON document, first to a sibling
/// temporary file and then renamed into place, so a reader sees either the
/// previous session or the new one. Clearing removes the file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Constructs a new file session store
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_session(&self) -> Result<Option<StoredSession>, StoreError> {
        use tokio::io::AsyncReadExt;

        let mut file = match OpenOptions::new().read(true).open(&self.path).await {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let mut data = String::new();
        file.read_to_string(&mut data).await?;
        let session = serde_json::from_str(&data)?;
        Ok(Some(session))
    }

    async fn write_session(&self, session: &StoredSession) -> Result<(), StoreError> {
        use tokio::io::AsyncWriteExt;

        let staging = self.path.with_extension("tmp");

        let mut file_opts = OpenOptions::new();

        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        file_opts.mode(0o600);

        let mut file = file_opts.open(&staging).await?;
        let data = serde_json::to_string_pretty(session)?;
        file.write_all(data.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn current(&self) -> Result<Option<StoredSession>, StoreError> {
        self.read_session().await
    }

    async fn persist(&self, session: &StoredSession) -> Result<(), StoreError> {
        self.write_session(session).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
