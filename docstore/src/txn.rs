use crate::metrics_defs::{TXN_COMMITTED, TXN_ROLLED_BACK};
use shared::counter;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

type Undo = Box<dyn FnOnce() + Send>;

/// Scoped transaction handle.
///
/// Writes are applied to the collections immediately and an undo entry is
/// recorded for every write that changed a document. `commit` discards the undo log,
/// anything else (an explicit `rollback`, an early return through `?`, a
/// panic) replays it in reverse order.
pub struct Txn {
    id: u64,
    undo: Vec<Undo>,
    finished: bool,
}

impl Txn {
    pub(crate) fn new() -> Self {
        Txn {
            id: NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed),
            undo: Vec::new(),
            finished: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of document writes recorded so far.
    pub fn writes(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn record(&mut self, undo: Undo) {
        self.undo.push(undo);
    }

    pub fn commit(mut self) {
        tracing::debug!(txn = self.id, writes = self.undo.len(), "Committing transaction");
        self.undo.clear();
        self.finished = true;
        counter!(TXN_COMMITTED).increment(1);
    }

    pub fn rollback(mut self) {
        self.unwind();
    }

    fn unwind(&mut self) {
        let writes = self.undo.len();
        while let Some(undo) = self.undo.pop() {
            undo();
        }
        self.finished = true;
        if writes > 0 {
            tracing::debug!(txn = self.id, writes, "Rolled back transaction");
            counter!(TXN_ROLLED_BACK).increment(1);
        }
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        if !self.finished {
            if !self.undo.is_empty() {
                tracing::warn!(
                    txn = self.id,
                    writes = self.undo.len(),
                    "Transaction dropped without commit, rolling back"
                );
            }
            self.unwind();
        }
    }
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Txn")
            .field("id", &self.id)
            .field("writes", &self.undo.len())
            .field("finished", &self.finished)
            .finish()
    }
}
