use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::KeyValueStore;
use crate::error::AppResult;

/// Process-local store. Contents vanish on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_contents(lists: HashMap<String, Vec<Value>>) -> Self {
        Self {
            lists: RwLock::new(lists),
        }
    }

    pub(crate) async fn snapshot(&self) -> HashMap<String, Vec<Value>> {
        self.lists.read().await.clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn list<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Vec<Value>>> {
        Box::pin(async move {
            let lists = self.lists.read().await;
            Ok(lists.get(key).cloned().unwrap_or_default())
        })
    }

    fn append<'a>(&'a self, key: &'a str, record: Value) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            let mut lists = self.lists.write().await;
            lists.entry(key.to_string()).or_default().push(record);
            Ok(())
        })
    }

    fn replace<'a>(&'a self, key: &'a str, records: Vec<Value>) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            let mut lists = self.lists.write().await;
            lists.insert(key.to_string(), records);
            Ok(())
        })
    }
}
