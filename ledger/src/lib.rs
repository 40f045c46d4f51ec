//! Pairwise connection ledger.
//!
//! Keeps one [`ConnectionRecord`] per unordered pair of users who share at
//! least one activity, together with the ids of the dinners and events that
//! link them. [`Participation`] owns the activity rosters and fans roster
//! changes out to the ledger.

mod activities;
mod error;
mod ledger;
mod metrics_defs;
mod pair_key;
mod store;
mod types;

#[cfg(test)]
mod testutils;

pub use activities::{Activity, ActivityDirectory, NewActivity, Participation};
pub use error::LedgerError;
pub use ledger::{Ledger, Unlinked};
pub use metrics_defs::ALL_METRICS;
pub use pair_key::{canonical_pair, pair_key};
pub use store::{ConnectionStore, DocConnectionStore, PairLink};
pub use types::{
    ActivityId, ActivityKind, ActivitySummary, ConnectionRecord, DetailedConnection, UserId,
};
