use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::KeyValueStore;
use crate::error::LlmError;

/// All records in one JSON object on disk.
///
/// Writes go to a sibling temp file that is then renamed over the original, so a crash
/// never leaves a half-written document behind.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, LlmError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => Ok(map),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Storage file is not valid JSON; starting empty"
                    );
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, String>) -> Result<(), LlmError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LlmError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), LlmError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        self.write_all(&map).await
    }

    async fn remove(&self, key: &str) -> Result<(), LlmError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }
}
