use crate::activities::ActivityDirectory;
use crate::error::LedgerError;
use crate::store::{ConnectionStore, PairLink};
use crate::types::{ActivityId, ActivityKind, ActivitySummary, ConnectionRecord};
use async_trait::async_trait;
use docstore::{BulkResult, StoreError, Txn};
use shared::pagination::{Page, PageRequest};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fails the first `failures` batched upserts with a pair key conflict.
pub struct FlakyStore {
    inner: Arc<dyn ConnectionStore>,
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn ConnectionStore>, failures: usize) -> Self {
        FlakyStore {
            inner,
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionStore for FlakyStore {
    async fn upsert_links(
        &self,
        txn: &mut Txn,
        kind: ActivityKind,
        activity: &str,
        links: &[PairLink],
    ) -> Result<BulkResult, StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StoreError::Conflict {
                collection: "user_connections".into(),
                key: links[0].pair_key.clone(),
            });
        }
        self.inner.upsert_links(txn, kind, activity, links).await
    }

    async fn pull_refs(
        &self,
        txn: &mut Txn,
        member: &str,
        kind: ActivityKind,
        activity: &str,
    ) -> Result<usize, StoreError> {
        self.inner.pull_refs(txn, member, kind, activity).await
    }

    async fn prune_empty(&self, txn: &mut Txn, member: &str) -> Result<usize, StoreError> {
        self.inner.prune_empty(txn, member).await
    }

    async fn find_by_pair_key(
        &self,
        pair_key: &str,
    ) -> Result<Option<ConnectionRecord>, StoreError> {
        self.inner.find_by_pair_key(pair_key).await
    }

    async fn find_by_pair_keys(
        &self,
        pair_keys: &[String],
    ) -> Result<Vec<ConnectionRecord>, StoreError> {
        self.inner.find_by_pair_keys(pair_keys).await
    }

    async fn list_for_member(
        &self,
        member: &str,
        page: PageRequest,
    ) -> Result<Page<ConnectionRecord>, StoreError> {
        self.inner.list_for_member(member, page).await
    }
}

/// Fixed set of activities.
pub struct StaticDirectory {
    activities: Vec<ActivitySummary>,
}

impl StaticDirectory {
    pub fn new(activities: &[(&str, ActivityKind, &str)]) -> Self {
        StaticDirectory {
            activities: activities
                .iter()
                .map(|(id, kind, title)| ActivitySummary {
                    id: id.to_string(),
                    kind: *kind,
                    title: title.to_string(),
                    starts_at: None,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ActivityDirectory for StaticDirectory {
    async fn summaries(
        &self,
        kind: ActivityKind,
        ids: &[ActivityId],
    ) -> Result<Vec<ActivitySummary>, LedgerError> {
        Ok(self
            .activities
            .iter()
            .filter(|a| a.kind == kind && ids.contains(&a.id))
            .cloned()
            .collect())
    }
}
