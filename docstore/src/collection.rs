use crate::snapshot::SnapshotError;
use crate::txn::Txn;
use crate::{Document, StoreError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Derives the unique index key of a document.
pub type KeyFn<T> = fn(&T) -> String;

/// Outcome of a batched upsert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkResult {
    pub inserted: usize,
    pub modified: usize,
}

/// A reversible change to one document.
///
/// Writes made through a delta are undone by applying [`Delta::revert`] to the
/// document as it is at rollback time rather than by restoring a before-image,
/// so changes other transactions made to the same document in between are
/// kept. A delta must not change the unique key of the document.
pub trait Delta<T>: Send + 'static {
    /// Applies the change. Returns false if the document already had it.
    fn apply(&self, doc: &mut T) -> bool;

    fn revert(&self, doc: &mut T);

    /// Whether a reverted document holds nothing worth keeping. Vacant
    /// documents are deleted.
    fn is_vacant(&self, _doc: &T) -> bool {
        false
    }

    /// Document to revert into when the original is gone at rollback time.
    fn recreate(&self) -> Option<T> {
        None
    }
}

enum Revert<T> {
    /// Before-image, put back only if the document still carries `written`.
    Image {
        id: String,
        prior: Option<(T, u64)>,
        written: Option<u64>,
    },
    Delta {
        id: String,
        key: Option<String>,
        delta: Box<dyn Delta<T>>,
    },
}

struct Entries<T> {
    docs: BTreeMap<String, T>,
    // unique key -> document id
    keys: HashMap<String, String>,
    // document id -> version of its last write
    versions: HashMap<String, u64>,
    clock: u64,
}

impl<T: Document> Entries<T> {
    fn put(&mut self, doc: T, unique_key: Option<KeyFn<T>>) -> u64 {
        let id = doc.id().to_string();
        if let Some(key_fn) = unique_key {
            if let Some(old) = self.docs.get(&id) {
                let old_key = key_fn(old);
                if self.keys.get(&old_key) == Some(&id) {
                    self.keys.remove(&old_key);
                }
            }
            self.keys.insert(key_fn(&doc), id.clone());
        }
        self.clock += 1;
        self.versions.insert(id.clone(), self.clock);
        self.docs.insert(id, doc);
        self.clock
    }

    fn take(&mut self, id: &str, unique_key: Option<KeyFn<T>>) -> Option<T> {
        let doc = self.docs.remove(id)?;
        self.versions.remove(id);
        if let Some(key_fn) = unique_key {
            let key = key_fn(&doc);
            if self.keys.get(&key).map(String::as_str) == Some(id) {
                self.keys.remove(&key);
            }
        }
        Some(doc)
    }

    fn version(&self, id: &str) -> Option<u64> {
        self.versions.get(id).copied()
    }

    fn by_key(&self, key: &str) -> Option<&T> {
        self.keys.get(key).and_then(|id| self.docs.get(id))
    }
}

/// Handle to a named set of documents with an optional unique index.
///
/// Handles are cheap to clone and all clones share the same documents.
///
/// Plain writes (`insert`, `update`, `delete`) roll back by restoring the
/// before-image, unless another write has touched the document since, in
/// which case the later write is kept. Writes made through a [`Delta`]
/// (`apply_delta`, `bulk_upsert`, `update_many`) roll back by reverting only
/// their own change.
pub struct Collection<T> {
    name: Arc<str>,
    unique_key: Option<KeyFn<T>>,
    entries: Arc<RwLock<Entries<T>>>,
    open: Arc<AtomicBool>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Collection {
            name: self.name.clone(),
            unique_key: self.unique_key,
            entries: self.entries.clone(),
            open: self.open.clone(),
        }
    }
}

impl<T: Document> Collection<T> {
    pub(crate) fn new(name: &str, unique_key: Option<KeyFn<T>>, open: Arc<AtomicBool>) -> Self {
        Collection {
            name: name.into(),
            unique_key,
            entries: Arc::new(RwLock::new(Entries {
                docs: BTreeMap::new(),
                keys: HashMap::new(),
                versions: HashMap::new(),
                clock: 0,
            })),
            open,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.entries.read().docs.get(id).cloned()
    }

    pub fn find_by_key(&self, key: &str) -> Option<T> {
        self.entries.read().by_key(key).cloned()
    }

    /// Looks up many unique keys under a single read lock. Missing keys are skipped.
    pub fn find_by_keys<'a, I>(&self, keys: I) -> Vec<T>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = self.entries.read();
        keys.into_iter()
            .filter_map(|key| entries.by_key(key))
            .cloned()
            .collect()
    }

    pub fn find_one<P>(&self, pred: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        self.entries.read().docs.values().find(|doc| pred(doc)).cloned()
    }

    pub fn find<P>(&self, pred: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        self.entries
            .read()
            .docs
            .values()
            .filter(|doc| pred(doc))
            .cloned()
            .collect()
    }

    pub fn count<P>(&self, pred: P) -> usize
    where
        P: Fn(&T) -> bool,
    {
        self.entries.read().docs.values().filter(|doc| pred(doc)).count()
    }

    pub fn len(&self) -> usize {
        self.entries.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, txn: &mut Txn, doc: T) -> Result<(), StoreError> {
        self.ensure_open()?;
        let id = doc.id().to_string();
        let written = {
            let mut entries = self.entries.write();
            if entries.docs.contains_key(&id) {
                return Err(self.conflict(id));
            }
            self.check_key(&entries, &doc)?;
            entries.put(doc, self.unique_key)
        };
        self.record(
            txn,
            Revert::Image {
                id,
                prior: None,
                written: Some(written),
            },
        );
        Ok(())
    }

    /// Applies `apply` to the document atomically. Returns the updated document,
    /// or `None` if no document has this id.
    pub fn update<F>(&self, txn: &mut Txn, id: &str, apply: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut T),
    {
        self.ensure_open()?;
        let (prior, next, written) = {
            let mut entries = self.entries.write();
            let Some(prior) = entries.docs.get(id).cloned() else {
                return Ok(None);
            };
            let version = entries.version(id).unwrap_or_default();
            let mut next = prior.clone();
            apply(&mut next);
            self.check_key(&entries, &next)?;
            let written = entries.put(next.clone(), self.unique_key);
            ((prior, version), next, written)
        };
        self.record(
            txn,
            Revert::Image {
                id: id.to_string(),
                prior: Some(prior),
                written: Some(written),
            },
        );
        Ok(Some(next))
    }

    /// Applies `delta` to the document atomically. Returns the document, or
    /// `None` if no document has this id.
    pub fn apply_delta<D>(&self, txn: &mut Txn, id: &str, delta: D) -> Result<Option<T>, StoreError>
    where
        D: Delta<T>,
    {
        self.ensure_open()?;
        let (next, key) = {
            let mut entries = self.entries.write();
            let Some(mut next) = entries.docs.get(id).cloned() else {
                return Ok(None);
            };
            if !delta.apply(&mut next) {
                return Ok(Some(next));
            }
            self.check_key(&entries, &next)?;
            entries.put(next.clone(), self.unique_key);
            let key = self.unique_key.map(|key_fn| key_fn(&next));
            (next, key)
        };
        self.record(
            txn,
            Revert::Delta {
                id: id.to_string(),
                key,
                delta: Box::new(delta),
            },
        );
        Ok(Some(next))
    }

    /// Applies the delta of every item to the document holding its key,
    /// inserting the document produced by `create` first where no document
    /// holds the key. Everything happens under a single write lock. Each
    /// upsert is atomic on its own; if one fails, the ones before it stay
    /// applied and the error is returned.
    pub fn bulk_upsert<I, K, C, D, F>(
        &self,
        txn: &mut Txn,
        items: &[I],
        key_of: K,
        create: C,
        delta_of: F,
    ) -> Result<BulkResult, StoreError>
    where
        K: Fn(&I) -> String,
        C: Fn(&I) -> T,
        D: Delta<T>,
        F: Fn(&I) -> D,
    {
        self.ensure_open()?;
        let mut result = BulkResult::default();
        let mut applied = Vec::with_capacity(items.len());
        let mut failure = None;
        {
            let mut entries = self.entries.write();
            for item in items {
                let key = key_of(item);
                let delta = delta_of(item);
                match self.upsert_locked(&mut entries, &key, || create(item), &delta) {
                    Ok(upserted) => {
                        if upserted.inserted {
                            result.inserted += 1;
                        } else {
                            result.modified += 1;
                        }
                        if upserted.changed {
                            applied.push((upserted.id, key, delta));
                        }
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        for (id, key, delta) in applied {
            self.record(
                txn,
                Revert::Delta {
                    id,
                    key: Some(key),
                    delta: Box::new(delta),
                },
            );
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    /// Applies a delta to every document matching `pred`. Returns the number
    /// of documents the deltas changed.
    pub fn update_many<P, D, F>(
        &self,
        txn: &mut Txn,
        pred: P,
        delta_of: F,
    ) -> Result<usize, StoreError>
    where
        P: Fn(&T) -> bool,
        D: Delta<T>,
        F: Fn(&T) -> D,
    {
        self.ensure_open()?;
        let mut applied = Vec::new();
        let mut failure = None;
        {
            let mut entries = self.entries.write();
            let matching: Vec<T> = entries
                .docs
                .values()
                .filter(|doc| pred(doc))
                .cloned()
                .collect();

            for mut next in matching {
                let delta = delta_of(&next);
                if !delta.apply(&mut next) {
                    continue;
                }
                if let Err(err) = self.check_key(&entries, &next) {
                    failure = Some(err);
                    break;
                }
                let id = next.id().to_string();
                let key = self.unique_key.map(|key_fn| key_fn(&next));
                entries.put(next, self.unique_key);
                applied.push((id, key, delta));
            }
        }

        let count = applied.len();
        for (id, key, delta) in applied {
            self.record(
                txn,
                Revert::Delta {
                    id,
                    key,
                    delta: Box::new(delta),
                },
            );
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }

    pub fn delete(&self, txn: &mut Txn, id: &str) -> Result<Option<T>, StoreError> {
        self.ensure_open()?;
        let removed = {
            let mut entries = self.entries.write();
            let version = entries.version(id).unwrap_or_default();
            entries
                .take(id, self.unique_key)
                .map(|doc| (doc, version))
        };
        if let Some(prior) = &removed {
            self.record(
                txn,
                Revert::Image {
                    id: id.to_string(),
                    prior: Some(prior.clone()),
                    written: None,
                },
            );
        }
        Ok(removed.map(|(doc, _)| doc))
    }

    /// Deletes every document matching `pred`, judged on its latest state under
    /// the write lock.
    ///
    /// Pruning leaves no undo entry: it is meant for documents that hold
    /// nothing, whose content comes back through the revert of the delta that
    /// emptied them.
    pub fn prune<P>(&self, pred: P) -> Result<usize, StoreError>
    where
        P: Fn(&T) -> bool,
    {
        self.ensure_open()?;
        let mut entries = self.entries.write();
        let ids: Vec<String> = entries
            .docs
            .values()
            .filter(|doc| pred(doc))
            .map(|doc| doc.id().to_string())
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| entries.take(id, self.unique_key))
            .count())
    }

    pub(crate) fn export(&self) -> Result<Vec<u8>, SnapshotError> {
        let docs: Vec<T> = self.entries.read().docs.values().cloned().collect();
        Ok(bincode::serde::encode_to_vec(
            &docs,
            bincode::config::standard(),
        )?)
    }

    pub(crate) fn hydrate(&self, bytes: &[u8]) -> Result<usize, SnapshotError> {
        let (docs, _): (Vec<T>, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;

        let mut entries = self.entries.write();
        for doc in docs {
            if entries.docs.contains_key(doc.id()) {
                return Err(SnapshotError::Corrupt(format!(
                    "duplicate id {} in collection {}",
                    doc.id(),
                    self.name
                )));
            }
            if let Some(key_fn) = self.unique_key
                && entries.keys.contains_key(&key_fn(&doc))
            {
                return Err(SnapshotError::Corrupt(format!(
                    "duplicate key {:?} in collection {}",
                    key_fn(&doc),
                    self.name
                )));
            }
            entries.put(doc, self.unique_key);
        }
        Ok(entries.docs.len())
    }

    fn upsert_locked<C>(
        &self,
        entries: &mut Entries<T>,
        key: &str,
        create: C,
        delta: &dyn Delta<T>,
    ) -> Result<Upserted, StoreError>
    where
        C: FnOnce() -> T,
    {
        debug_assert!(self.unique_key.is_some(), "upsert requires a unique index");

        let existing = entries.by_key(key).cloned();
        match existing {
            Some(mut next) => {
                let changed = delta.apply(&mut next);
                if changed {
                    self.check_key(entries, &next)?;
                    entries.put(next.clone(), self.unique_key);
                }
                Ok(Upserted {
                    id: next.id().to_string(),
                    inserted: false,
                    changed,
                })
            }
            None => {
                let mut doc = create();
                delta.apply(&mut doc);
                if entries.docs.contains_key(doc.id()) {
                    return Err(self.conflict(doc.id().to_string()));
                }
                self.check_key(entries, &doc)?;
                let id = doc.id().to_string();
                entries.put(doc, self.unique_key);
                Ok(Upserted {
                    id,
                    inserted: true,
                    changed: true,
                })
            }
        }
    }

    fn check_key(&self, entries: &Entries<T>, doc: &T) -> Result<(), StoreError> {
        if let Some(key_fn) = self.unique_key {
            let key = key_fn(doc);
            if let Some(owner) = entries.keys.get(&key)
                && owner != doc.id()
            {
                return Err(self.conflict(key));
            }
        }
        Ok(())
    }

    fn record(&self, txn: &mut Txn, revert: Revert<T>) {
        let collection = self.clone();
        txn.record(Box::new(move || collection.revert(revert)));
    }

    // Rollback path: bypasses the open check so a closing store can still unwind.
    fn revert(&self, revert: Revert<T>) {
        let mut entries = self.entries.write();
        match revert {
            Revert::Image { id, prior, written } => {
                if entries.version(&id) != written {
                    tracing::warn!(
                        collection = %self.name,
                        id = %id,
                        "Document written again before rollback, keeping the later write"
                    );
                    return;
                }
                if let Some((doc, _)) = &prior
                    && self.check_key(&entries, doc).is_err()
                {
                    tracing::warn!(
                        collection = %self.name,
                        id = %id,
                        "Unique key taken before rollback, keeping the current document"
                    );
                    return;
                }
                entries.take(&id, self.unique_key);
                if let Some((doc, version)) = prior {
                    entries.put(doc, self.unique_key);
                    entries.versions.insert(id, version);
                }
            }
            Revert::Delta { id, key, delta } => {
                let current = match &key {
                    Some(key) => entries.by_key(key),
                    None => entries.docs.get(&id),
                };
                let Some(mut doc) = current.cloned().or_else(|| delta.recreate()) else {
                    return;
                };
                delta.revert(&mut doc);
                if delta.is_vacant(&doc) {
                    let id = doc.id().to_string();
                    entries.take(&id, self.unique_key);
                } else {
                    entries.put(doc, self.unique_key);
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "collection {} is closed for writes",
                self.name
            )))
        }
    }

    fn conflict(&self, key: String) -> StoreError {
        StoreError::Conflict {
            collection: self.name.to_string(),
            key,
        }
    }
}

struct Upserted {
    id: String,
    inserted: bool,
    changed: bool,
}
