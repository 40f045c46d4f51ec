use crate::pair_key::{canonical_pair, pair_key};
use crate::types::{ActivityId, ActivityKind, ConnectionRecord, UserId};
use async_trait::async_trait;
use docstore::{BulkResult, Collection, Delta, Store, StoreError, Txn};
use shared::clock::now_secs;
use shared::pagination::{Page, PageRequest};

pub const COLLECTION: &str = "user_connections";

/// One pair targeted by a batched upsert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairLink {
    pub pair_key: String,
    pub members: [UserId; 2],
}

impl PairLink {
    pub fn new(a: &str, b: &str) -> Self {
        PairLink {
            pair_key: pair_key(a, b),
            members: canonical_pair(a, b),
        }
    }
}

/// Storage primitives used by the ledger.
///
/// Every write takes the caller's transaction. Each primitive is atomic per
/// record but not across records. Rolling a transaction back undoes only the
/// references it added or removed, never references other transactions wrote
/// to the same records.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Adds `activity` to the `kind` references of every pair, creating the
    /// records that do not exist yet. Issued as one batched write.
    async fn upsert_links(
        &self,
        txn: &mut Txn,
        kind: ActivityKind,
        activity: &str,
        links: &[PairLink],
    ) -> Result<BulkResult, StoreError>;

    /// Removes `activity` from the `kind` references of every record
    /// containing `member`. Returns the number of records changed.
    async fn pull_refs(
        &self,
        txn: &mut Txn,
        member: &str,
        kind: ActivityKind,
        activity: &str,
    ) -> Result<usize, StoreError>;

    /// Deletes the records containing `member` which hold no references.
    /// Emptiness is checked at delete time. A rollback recreates a pruned
    /// record only if it brings a reference back.
    async fn prune_empty(&self, txn: &mut Txn, member: &str) -> Result<usize, StoreError>;

    async fn find_by_pair_key(&self, pair_key: &str)
    -> Result<Option<ConnectionRecord>, StoreError>;

    /// Batched lookup. Unknown keys are skipped.
    async fn find_by_pair_keys(
        &self,
        pair_keys: &[String],
    ) -> Result<Vec<ConnectionRecord>, StoreError>;

    /// Records containing `member`, newest first.
    async fn list_for_member(
        &self,
        member: &str,
        page: PageRequest,
    ) -> Result<Page<ConnectionRecord>, StoreError>;
}

fn pair_key_of(record: &ConnectionRecord) -> String {
    record.pair_key.clone()
}

/// Adds one activity to the references of a record.
struct AddRef {
    kind: ActivityKind,
    activity: ActivityId,
    now: u64,
}

impl Delta<ConnectionRecord> for AddRef {
    fn apply(&self, record: &mut ConnectionRecord) -> bool {
        let added = record.refs_mut(self.kind).insert(self.activity.clone());
        if added {
            record.updated_at = self.now;
        }
        added
    }

    fn revert(&self, record: &mut ConnectionRecord) {
        record.refs_mut(self.kind).remove(&self.activity);
    }

    fn is_vacant(&self, record: &ConnectionRecord) -> bool {
        record.is_empty()
    }
}

/// Removes one activity from the references of a record.
struct PullRef {
    kind: ActivityKind,
    activity: ActivityId,
    now: u64,
    pair_key: String,
    members: [UserId; 2],
    created_at: u64,
}

impl Delta<ConnectionRecord> for PullRef {
    fn apply(&self, record: &mut ConnectionRecord) -> bool {
        let removed = record.refs_mut(self.kind).remove(&self.activity);
        if removed {
            record.updated_at = self.now;
        }
        removed
    }

    fn revert(&self, record: &mut ConnectionRecord) {
        record.refs_mut(self.kind).insert(self.activity.clone());
    }

    // The record may have been pruned once the reference was gone.
    fn recreate(&self) -> Option<ConnectionRecord> {
        Some(ConnectionRecord {
            id: docstore::new_id(),
            pair_key: self.pair_key.clone(),
            members: self.members.clone(),
            dinner_refs: Default::default(),
            event_refs: Default::default(),
            created_at: self.created_at,
            updated_at: self.now,
        })
    }
}

/// Connection store backed by the `user_connections` document collection,
/// uniquely indexed on the pair key.
#[derive(Clone)]
pub struct DocConnectionStore {
    records: Collection<ConnectionRecord>,
}

impl DocConnectionStore {
    pub fn new(store: &Store) -> Result<Self, StoreError> {
        Ok(DocConnectionStore {
            records: store.collection(COLLECTION, Some(pair_key_of))?,
        })
    }
}

#[async_trait]
impl ConnectionStore for DocConnectionStore {
    async fn upsert_links(
        &self,
        txn: &mut Txn,
        kind: ActivityKind,
        activity: &str,
        links: &[PairLink],
    ) -> Result<BulkResult, StoreError> {
        let now = now_secs();
        self.records.bulk_upsert(
            txn,
            links,
            |link| link.pair_key.clone(),
            |link| ConnectionRecord {
                id: docstore::new_id(),
                pair_key: link.pair_key.clone(),
                members: link.members.clone(),
                dinner_refs: Default::default(),
                event_refs: Default::default(),
                created_at: now,
                updated_at: now,
            },
            |_| AddRef {
                kind,
                activity: activity.to_string(),
                now,
            },
        )
    }

    async fn pull_refs(
        &self,
        txn: &mut Txn,
        member: &str,
        kind: ActivityKind,
        activity: &str,
    ) -> Result<usize, StoreError> {
        let now = now_secs();
        self.records.update_many(
            txn,
            |record| record.contains(member) && record.refs(kind).contains(activity),
            |record| PullRef {
                kind,
                activity: activity.to_string(),
                now,
                pair_key: record.pair_key.clone(),
                members: record.members.clone(),
                created_at: record.created_at,
            },
        )
    }

    // Nothing to undo: the pull that emptied a record recreates it on rollback.
    async fn prune_empty(&self, _txn: &mut Txn, member: &str) -> Result<usize, StoreError> {
        self.records
            .prune(|record| record.contains(member) && record.is_empty())
    }

    async fn find_by_pair_key(
        &self,
        pair_key: &str,
    ) -> Result<Option<ConnectionRecord>, StoreError> {
        Ok(self.records.find_by_key(pair_key))
    }

    async fn find_by_pair_keys(
        &self,
        pair_keys: &[String],
    ) -> Result<Vec<ConnectionRecord>, StoreError> {
        Ok(self.records.find_by_keys(pair_keys.iter().map(String::as_str)))
    }

    async fn list_for_member(
        &self,
        member: &str,
        page: PageRequest,
    ) -> Result<Page<ConnectionRecord>, StoreError> {
        let mut records = self.records.find(|record| record.contains(member));
        // Ids are time ordered and break ties between equal timestamps
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(Page::from_sorted(records, page))
    }
}
