//! In-process document store.
//!
//! Documents live in named [`Collection`]s. Every write goes through a [`Txn`]
//! handle which keeps an undo log: dropping the handle without calling
//! [`Txn::commit`] undoes every write the transaction made. Single document
//! mutations are atomic; there is no isolation between concurrent
//! transactions beyond that. Documents that concurrent transactions share are
//! written through a [`Delta`], whose undo reverts only its own change.
//!
//! The store is persisted as a compressed snapshot by the [`Persister`]
//! worker and hydrated from the latest snapshot on startup.

pub mod config;
mod collection;
mod error;
mod metrics_defs;
mod persister;
pub mod snapshot;
mod store;
mod txn;

pub use collection::{BulkResult, Collection, Delta, KeyFn};
pub use error::StoreError;
pub use metrics_defs::ALL_METRICS;
pub use persister::{PersistError, Persister};
pub use store::Store;
pub use txn::Txn;

use config::StoreConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use snapshot::SnapshotError;

/// A value stored in a collection. The id must never change once the document
/// has been inserted.
pub trait Document: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> &str;
}

/// Generates a new document id. Ids are time ordered.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Loads the latest snapshot for the configured provider and starts the
/// persister worker for it.
pub async fn open(config: &StoreConfig) -> Result<(Store, Persister), SnapshotError> {
    let provider = config.provider();

    let loader = provider.clone();
    let snapshot = tokio::task::spawn_blocking(move || loader.load())
        .await
        .map_err(|e| SnapshotError::Corrupt(e.to_string()))??;

    let store = match snapshot {
        Some(snapshot) => {
            tracing::info!(
                collections = snapshot.collections.len(),
                taken_at = snapshot.taken_at,
                "Loaded store snapshot"
            );
            Store::from_snapshot(snapshot)
        }
        None => {
            tracing::info!("No store snapshot found, starting empty");
            Store::new()
        }
    };

    let persister = Persister::spawn(store.clone(), provider, config.flush_interval());
    Ok((store, persister))
}
