use docstore::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// The store rejected the write but may accept it later. Operations are
    /// idempotent and safe to repeat.
    #[error("storage unavailable: {0}")]
    StorageTransient(String),

    #[error("conflicting write on key {0}")]
    StorageConflict(String),

    #[error("activity not found: {0}")]
    ActivityNotFound(String),

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => LedgerError::StorageTransient(reason),
            StoreError::Conflict { key, .. } => LedgerError::StorageConflict(key),
            other => LedgerError::Storage(other),
        }
    }
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::StorageTransient(_))
    }
}
