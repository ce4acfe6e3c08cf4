use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::model::{check_session_id, SessionRecord, SessionResult};

/// Persistence boundary for session records and final result bundles
#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Store a new record. Returns `false` if one already exists for the id.
    async fn create(&self, record: &SessionRecord) -> Result<bool>;

    async fn save(&self, record: &SessionRecord) -> Result<()>;

    async fn save_result(&self, result: &SessionResult) -> Result<()>;

    async fn load_result(&self, session_id: &str) -> Result<Option<SessionResult>>;
}

/// Stores each session as pretty-printed JSON under a root directory:
/// `<root>/<id>.json` for the record and `<root>/<id>.result.json` for the result.
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create session directory: {:?}", root))?;

        info!("Session repository at {}", root.display());

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, session_id: &str) -> Result<PathBuf> {
        check_session_id(session_id)?;
        Ok(self.root.join(format!("{}.json", session_id)))
    }

    fn result_path(&self, session_id: &str) -> Result<PathBuf> {
        check_session_id(session_id)?;
        Ok(self.root.join(format!("{}.result.json", session_id)))
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        // Replace atomically via rename.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to move {:?} into place", path))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn create_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<bool> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e).with_context(|| format!("Failed to create {:?}", path)),
        };
        file.write_all(&bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        file.sync_all()
            .await
            .with_context(|| format!("Failed to sync {:?}", path))?;
        debug!("Created {}", path.display());
        Ok(true)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to parse {:?}", path))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }
}

#[async_trait::async_trait]
impl SessionRepository for JsonFileRepository {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Self::read_json(&self.record_path(session_id)?).await
    }

    async fn create(&self, record: &SessionRecord) -> Result<bool> {
        Self::create_json(&self.record_path(&record.session_id)?, record).await
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        Self::write_json(&self.record_path(&record.session_id)?, record).await
    }

    async fn save_result(&self, result: &SessionResult) -> Result<()> {
        Self::write_json(&self.result_path(&result.session_id)?, result).await
    }

    async fn load_result(&self, session_id: &str) -> Result<Option<SessionResult>> {
        Self::read_json(&self.result_path(session_id)?).await
    }
}
