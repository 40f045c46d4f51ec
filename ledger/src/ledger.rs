use crate::activities::ActivityDirectory;
use crate::error::LedgerError;
use crate::metrics_defs::{
    CONFLICT_RETRY, LINKS_PULLED, LINKS_UPSERTED, RECORDS_PRUNED, STATUS_LOOKUP_SIZE,
};
use crate::pair_key::pair_key;
use crate::store::{ConnectionStore, PairLink};
use crate::types::{ActivityKind, ConnectionRecord, DetailedConnection, UserId};
use docstore::{BulkResult, StoreError, Txn};
use indexmap::{IndexMap, IndexSet};
use shared::pagination::{Page, PageRequest};
use shared::{counter, histogram};
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Outcome of [`Ledger::remove_links`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unlinked {
    /// Records the reference was removed from.
    pub pulled: usize,
    /// Records deleted because nothing links the pair anymore.
    pub pruned: usize,
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn ConnectionStore>,
    max_attempts: u32,
}

impl Ledger {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Ledger {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Number of times a batched upsert is attempted when it hits a pair key
    /// conflict. At least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Links `subject` to every user in `other_users` through `activity_id`.
    ///
    /// `subject` itself and duplicates are ignored; with nobody left this is
    /// a no-op. The upserts are issued as one batch and are each idempotent,
    /// so a call that fails half way can be repeated.
    pub async fn add_links(
        &self,
        txn: &mut Txn,
        subject: &str,
        kind: ActivityKind,
        activity_id: &str,
        other_users: &[UserId],
    ) -> Result<BulkResult, LedgerError> {
        let others: IndexSet<&str> = other_users
            .iter()
            .map(String::as_str)
            .filter(|other| *other != subject)
            .collect();

        if subject.is_empty() || others.is_empty() {
            tracing::debug!(subject, activity_id, "Nothing to link");
            return Ok(BulkResult::default());
        }

        let links: Vec<PairLink> = others
            .iter()
            .map(|other| PairLink::new(subject, other))
            .collect();

        let mut attempt = 1;
        let result = loop {
            match self
                .store
                .upsert_links(txn, kind, activity_id, &links)
                .await
            {
                Ok(result) => break result,
                // A concurrent first insert of the same pair won; the next
                // attempt finds the record and updates it.
                Err(StoreError::Conflict { key, .. }) if attempt < self.max_attempts => {
                    tracing::warn!(
                        pair_key = %key,
                        attempt,
                        activity_id,
                        "Pair key conflict, retrying"
                    );
                    counter!(CONFLICT_RETRY).increment(1);
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(err) => return Err(err.into()),
            }
        };

        counter!(LINKS_UPSERTED, "kind" => kind.as_str())
            .increment((result.inserted + result.modified) as u64);
        tracing::debug!(
            subject,
            %kind,
            activity_id,
            inserted = result.inserted,
            modified = result.modified,
            "Added links"
        );
        Ok(result)
    }

    /// Removes `activity_id` from every record of `subject`, then deletes the
    /// records of `subject` that no activity links anymore. Idempotent.
    ///
    /// The delete re-checks emptiness, so a reference added to a pair by a
    /// concurrent `add_links` between the two steps keeps the record alive.
    pub async fn remove_links(
        &self,
        txn: &mut Txn,
        subject: &str,
        kind: ActivityKind,
        activity_id: &str,
    ) -> Result<Unlinked, LedgerError> {
        if subject.is_empty() {
            return Ok(Unlinked::default());
        }

        let pulled = self
            .store
            .pull_refs(txn, subject, kind, activity_id)
            .await?;
        let pruned = self.store.prune_empty(txn, subject).await?;

        counter!(LINKS_PULLED).increment(pulled as u64);
        counter!(RECORDS_PRUNED).increment(pruned as u64);
        tracing::info!(
            subject,
            %kind,
            activity_id,
            pulled,
            pruned,
            "Removed links"
        );
        Ok(Unlinked { pulled, pruned })
    }

    pub async fn get_connection(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ConnectionRecord>, LedgerError> {
        if a == b {
            return Ok(None);
        }
        Ok(self.store.find_by_pair_key(&pair_key(a, b)).await?)
    }

    /// Like [`Ledger::get_connection`] with the activity references resolved.
    /// References the directory does not know are left out.
    pub async fn get_detailed_connection(
        &self,
        a: &str,
        b: &str,
        directory: &dyn ActivityDirectory,
    ) -> Result<Option<DetailedConnection>, LedgerError> {
        let Some(record) = self.get_connection(a, b).await? else {
            return Ok(None);
        };

        let dinner_ids: Vec<String> = record.dinner_refs.iter().cloned().collect();
        let event_ids: Vec<String> = record.event_refs.iter().cloned().collect();
        let dinners = directory.summaries(ActivityKind::Dinner, &dinner_ids).await?;
        let events = directory.summaries(ActivityKind::Event, &event_ids).await?;

        Ok(Some(DetailedConnection {
            id: record.id,
            pair_key: record.pair_key,
            members: record.members,
            dinners,
            events,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }))
    }

    /// Reports for every user in `other_users`, in input order, whether it is
    /// connected to `subject`. `subject` itself maps to false.
    pub async fn get_connection_statuses(
        &self,
        subject: &str,
        other_users: &[UserId],
    ) -> Result<IndexMap<UserId, bool>, LedgerError> {
        histogram!(STATUS_LOOKUP_SIZE).record(other_users.len() as f64);

        let pair_keys: Vec<String> = other_users
            .iter()
            .filter(|other| other.as_str() != subject)
            .map(|other| pair_key(subject, other))
            .collect();

        let connected: HashSet<String> = if pair_keys.is_empty() {
            HashSet::new()
        } else {
            self.store
                .find_by_pair_keys(&pair_keys)
                .await?
                .iter()
                .filter_map(|record| record.other_member(subject))
                .map(str::to_string)
                .collect()
        };

        Ok(other_users
            .iter()
            .map(|other| {
                let status = other != subject && connected.contains(other);
                (other.clone(), status)
            })
            .collect())
    }

    /// Records of `subject`, newest first.
    pub async fn list_connections(
        &self,
        subject: &str,
        page: PageRequest,
    ) -> Result<Page<ConnectionRecord>, LedgerError> {
        Ok(self.store.list_for_member(subject, page).await?)
    }
}
