use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::types::{ActivityId, ActivityKind, ActivitySummary, UserId};
use async_trait::async_trait;
use docstore::{Collection, Delta, Store, StoreError, Txn};
use serde::{Deserialize, Serialize};
use shared::clock::now_secs;

pub const COLLECTION: &str = "activities";

/// A dinner or event and the users taking part in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub kind: ActivityKind,
    pub title: String,
    pub starts_at: Option<u64>,
    /// In join order, without duplicates.
    pub participants: Vec<UserId>,
    pub created_by: UserId,
    pub created_at: u64,
    pub updated_at: u64,
}

impl docstore::Document for Activity {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Activity {
    pub fn summary(&self) -> ActivitySummary {
        ActivitySummary {
            id: self.id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            starts_at: self.starts_at,
        }
    }

    pub fn has_participant(&self, user: &str) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    fn others(&self, user: &str) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| p.as_str() != user)
            .cloned()
            .collect()
    }
}

/// Roster change for one user. Rolling it back touches only that user, so
/// concurrent joins and leaves of others survive.
enum RosterChange {
    Join { user: UserId, now: u64 },
    Leave { user: UserId, now: u64 },
}

impl RosterChange {
    fn join(activity: &mut Activity, user: &str) -> bool {
        if activity.has_participant(user) {
            return false;
        }
        activity.participants.push(user.to_string());
        true
    }

    fn leave(activity: &mut Activity, user: &str) -> bool {
        let before = activity.participants.len();
        activity.participants.retain(|p| p != user);
        activity.participants.len() != before
    }
}

impl Delta<Activity> for RosterChange {
    fn apply(&self, activity: &mut Activity) -> bool {
        let (changed, now) = match self {
            RosterChange::Join { user, now } => (Self::join(activity, user), *now),
            RosterChange::Leave { user, now } => (Self::leave(activity, user), *now),
        };
        if changed {
            activity.updated_at = now;
        }
        changed
    }

    fn revert(&self, activity: &mut Activity) {
        match self {
            RosterChange::Join { user, .. } => Self::leave(activity, user),
            RosterChange::Leave { user, .. } => Self::join(activity, user),
        };
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub title: String,
    pub starts_at: Option<u64>,
}

/// Resolves activity ids to summaries.
#[async_trait]
pub trait ActivityDirectory: Send + Sync {
    /// Summaries of the activities of `kind` among `ids`. Unknown ids are skipped.
    async fn summaries(
        &self,
        kind: ActivityKind,
        ids: &[ActivityId],
    ) -> Result<Vec<ActivitySummary>, LedgerError>;
}

/// Activity rosters. Every roster change is fanned out to the ledger within
/// the caller's transaction, so a failed fan-out rolls back the roster too.
#[derive(Clone)]
pub struct Participation {
    activities: Collection<Activity>,
    ledger: Ledger,
}

impl Participation {
    pub fn new(store: &Store, ledger: Ledger) -> Result<Self, StoreError> {
        Ok(Participation {
            activities: store.collection(COLLECTION, None)?,
            ledger,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn get(&self, id: &str) -> Option<Activity> {
        self.activities.get(id)
    }

    /// Creates an activity with `creator` as its only participant.
    pub async fn create(
        &self,
        txn: &mut Txn,
        new: NewActivity,
        creator: &str,
    ) -> Result<Activity, LedgerError> {
        let now = now_secs();
        let activity = Activity {
            id: docstore::new_id(),
            kind: new.kind,
            title: new.title,
            starts_at: new.starts_at,
            participants: vec![creator.to_string()],
            created_by: creator.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.activities.insert(txn, activity.clone())?;
        tracing::info!(activity_id = %activity.id, kind = %activity.kind, "Created activity");
        Ok(activity)
    }

    /// Adds `user` to the roster and links it to everybody already there.
    /// Joining twice is a no-op for the roster.
    pub async fn join(
        &self,
        txn: &mut Txn,
        id: &str,
        user: &str,
    ) -> Result<Activity, LedgerError> {
        let activity = self
            .activities
            .apply_delta(
                txn,
                id,
                RosterChange::Join {
                    user: user.to_string(),
                    now: now_secs(),
                },
            )?
            .ok_or_else(|| LedgerError::ActivityNotFound(id.to_string()))?;

        self.ledger
            .add_links(txn, user, activity.kind, &activity.id, &activity.others(user))
            .await?;
        Ok(activity)
    }

    pub async fn leave(
        &self,
        txn: &mut Txn,
        id: &str,
        user: &str,
    ) -> Result<Activity, LedgerError> {
        let activity = self
            .activities
            .apply_delta(
                txn,
                id,
                RosterChange::Leave {
                    user: user.to_string(),
                    now: now_secs(),
                },
            )?
            .ok_or_else(|| LedgerError::ActivityNotFound(id.to_string()))?;

        self.ledger
            .remove_links(txn, user, activity.kind, &activity.id)
            .await?;
        Ok(activity)
    }

    /// Deletes the activity and unlinks every former participant.
    pub async fn delete(&self, txn: &mut Txn, id: &str) -> Result<Activity, LedgerError> {
        let activity = self
            .activities
            .delete(txn, id)?
            .ok_or_else(|| LedgerError::ActivityNotFound(id.to_string()))?;

        for participant in &activity.participants {
            self.ledger
                .remove_links(txn, participant, activity.kind, &activity.id)
                .await?;
        }
        tracing::info!(
            activity_id = %activity.id,
            participants = activity.participants.len(),
            "Deleted activity"
        );
        Ok(activity)
    }
}

#[async_trait]
impl ActivityDirectory for Participation {
    async fn summaries(
        &self,
        kind: ActivityKind,
        ids: &[ActivityId],
    ) -> Result<Vec<ActivitySummary>, LedgerError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.activities.get(id))
            .filter(|activity| activity.kind == kind)
            .map(|activity| activity.summary())
            .collect())
    }
}
