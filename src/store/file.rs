use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{KeyValueStore, MemoryStore};
use crate::error::{AppError, AppResult};

/// Memory store mirrored to a JSON file that is rewritten on every
/// mutation. The file is written before memory changes, so a failed write
/// leaves both untouched.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    // Serializes mutations so snapshots land in mutation order
    write_lock: Mutex<()>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lists: HashMap<String, Vec<Value>> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Store file {} not found, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner: MemoryStore::with_contents(lists),
            write_lock: Mutex::new(()),
        })
    }

    /// Applies `edit` to the list under `key`, persists the result and only
    /// then makes it visible in memory.
    async fn commit<F>(&self, key: &str, edit: F) -> AppResult<()>
    where
        F: FnOnce(&mut Vec<Value>),
    {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.inner.snapshot().await;
        let records = snapshot.entry(key.to_string()).or_default();
        edit(records);
        let records = records.clone();
        self.flush(&snapshot).await?;
        self.inner.replace(key, records).await
    }

    async fn flush(&self, snapshot: &HashMap<String, Vec<Value>>) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.write_file(bytes).await.map_err(|e| {
            log::error!("Failed to persist store to {}: {e}", self.path.display());
            AppError::StoreError(format!("{}: {e}", self.path.display()))
        })
    }

    async fn write_file(&self, bytes: Vec<u8>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write to a sibling file first so a crash never leaves half a snapshot
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

impl KeyValueStore for FileStore {
    fn list<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Vec<Value>>> {
        self.inner.list(key)
    }

    fn append<'a>(&'a self, key: &'a str, record: Value) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move { self.commit(key, |records| records.push(record)).await })
    }

    fn replace<'a>(&'a self, key: &'a str, records: Vec<Value>) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move { self.commit(key, |current| *current = records).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_contents_survive_reopen() {
        let path = temp_path("file-store");
        {
            let store = FileStore::open(&path).await.unwrap();
            store.append("gachas", json!({ "id": 1 })).await.unwrap();
            store.append("gachas", json!({ "id": 2 })).await.unwrap();
            store.replace("users", vec![json!("u")]).await.unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.list("gachas").await.unwrap().len(), 2);
        assert_eq!(reopened.list("users").await.unwrap(), vec![json!("u")]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let path = temp_path("blocked");
        let store = FileStore::open(&path).await.unwrap();
        // A directory where the temporary snapshot file goes
        let tmp = path.with_extension("json.tmp");
        std::fs::create_dir_all(&tmp).unwrap();

        let err = store.append("gachas", json!({ "id": 1 })).await.unwrap_err();
        assert!(matches!(err, AppError::StoreError(_)));
        assert_eq!(err.code(), "STORE_ERROR");
        assert!(store.list("gachas").await.unwrap().is_empty());

        let _ = std::fs::remove_dir(&tmp);
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let store = FileStore::open(temp_path("missing")).await.unwrap();
        assert!(store.list("anything").await.unwrap().is_empty());
    }
}
