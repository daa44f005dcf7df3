//! Key-value persistence collaborator.
//!
//! Records live as JSON values in lists addressed by string keys. Services go
//! through the typed helpers below; the prize selector never touches a store.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{AppError, AppResult};

pub trait KeyValueStore: Send + Sync {
    /// All records under `key`, oldest first. Unknown keys yield an empty list.
    fn list<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Vec<Value>>>;

    fn append<'a>(&'a self, key: &'a str, record: Value) -> BoxFuture<'a, AppResult<()>>;

    fn replace<'a>(&'a self, key: &'a str, records: Vec<Value>) -> BoxFuture<'a, AppResult<()>>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

pub async fn create_store(config: &StoreConfig) -> AppResult<SharedStore> {
    let store: SharedStore = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(&config.path).await?),
    };
    Ok(store)
}

pub async fn list_as<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> AppResult<Vec<T>> {
    store
        .list(key)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value::<T>(v).map_err(AppError::from))
        .collect()
}

pub async fn append_as<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    record: &T,
) -> AppResult<()> {
    store.append(key, serde_json::to_value(record)?).await
}

pub async fn replace_as<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    records: &[T],
) -> AppResult<()> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    store.replace(key, values).await
}

/// Keys used by the services.
pub mod keys {
    use uuid::Uuid;

    pub const USERS: &str = "users";
    pub const GACHAS: &str = "gachas";
    pub const RAFFLES: &str = "raffles";

    pub fn gacha_results(gacha_id: Uuid) -> String {
        format!("gacha_results:{gacha_id}")
    }

    pub fn user_gacha_results(gacha_id: Uuid, user_id: Uuid) -> String {
        format!("gacha_results:{gacha_id}:{user_id}")
    }

    pub fn raffle_purchases(raffle_id: Uuid) -> String {
        format!("raffle_purchases:{raffle_id}")
    }

    pub fn reward_redemptions(user_id: Uuid) -> String {
        format!("reward_redemptions:{user_id}")
    }
}

/// Store wrapper that rejects writes to keys matching a predicate.
#[cfg(test)]
pub(crate) struct FailingWrites {
    inner: MemoryStore,
    rejects: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

#[cfg(test)]
impl FailingWrites {
    pub(crate) fn new(rejects: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: MemoryStore::new(),
            rejects: Box::new(rejects),
        }
    }

    fn check(&self, key: &str) -> AppResult<()> {
        if (self.rejects)(key) {
            return Err(AppError::StoreError(format!("write to {key} rejected")));
        }
        Ok(())
    }
}

#[cfg(test)]
impl KeyValueStore for FailingWrites {
    fn list<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Vec<Value>>> {
        self.inner.list(key)
    }

    fn append<'a>(&'a self, key: &'a str, record: Value) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            self.check(key)?;
            self.inner.append(key, record).await
        })
    }

    fn replace<'a>(&'a self, key: &'a str, records: Vec<Value>) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            self.check(key)?;
            self.inner.replace(key, records).await
        })
    }
}
