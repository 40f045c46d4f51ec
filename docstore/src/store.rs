use crate::collection::{Collection, KeyFn};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::txn::Txn;
use crate::{Document, StoreError};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Type-erased view of a collection used when taking snapshots.
trait Persist: Send + Sync {
    fn export(&self) -> Result<Vec<u8>, SnapshotError>;
}

impl<T: Document> Persist for Collection<T> {
    fn export(&self) -> Result<Vec<u8>, SnapshotError> {
        Collection::export(self)
    }
}

struct StoreInner {
    open: Arc<AtomicBool>,
    // Snapshot data for collections which have not been registered yet
    pending: Mutex<BTreeMap<String, Vec<u8>>>,
    collections: RwLock<BTreeMap<String, Arc<dyn Persist>>>,
}

/// Registry of collections sharing one open/closed state and one snapshot.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Store {
            inner: Arc::new(StoreInner {
                open: Arc::new(AtomicBool::new(true)),
                pending: Mutex::new(snapshot.collections),
                collections: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Registers a collection, hydrating it from the loaded snapshot if the
    /// snapshot contains it. Each name can be registered once.
    pub fn collection<T: Document>(
        &self,
        name: &str,
        unique_key: Option<KeyFn<T>>,
    ) -> Result<Collection<T>, StoreError> {
        let mut collections = self.inner.collections.write();
        if collections.contains_key(name) {
            return Err(StoreError::DuplicateCollection(name.to_string()));
        }

        let collection = Collection::new(name, unique_key, self.inner.open.clone());
        if let Some(bytes) = self.inner.pending.lock().remove(name) {
            let count = collection.hydrate(&bytes)?;
            tracing::debug!(collection = name, documents = count, "Hydrated collection");
        }

        collections.insert(name.to_string(), Arc::new(collection.clone()));
        Ok(collection)
    }

    pub fn begin(&self) -> Result<Txn, StoreError> {
        if !self.is_open() {
            return Err(StoreError::Unavailable("store is closed".into()));
        }
        Ok(Txn::new())
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Rejects every subsequent write. Reads and rollbacks keep working.
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::Release);
    }

    /// Exports every registered collection. Collections are exported one at a
    /// time, so the snapshot is not a consistent cut across collections.
    /// Collections present in the loaded snapshot but never registered are
    /// carried over unchanged.
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let mut collections = self.inner.pending.lock().clone();
        let registered: Vec<(String, Arc<dyn Persist>)> = self
            .inner
            .collections
            .read()
            .iter()
            .map(|(name, c)| (name.clone(), c.clone()))
            .collect();

        for (name, collection) in registered {
            collections.insert(name, collection.export()?);
        }

        Ok(Snapshot {
            taken_at: shared::clock::now_secs(),
            collections,
        })
    }
}
