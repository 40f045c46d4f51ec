use crate::snapshot::SnapshotError;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("duplicate key {key:?} in collection {collection}")]
    Conflict { collection: String, key: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("collection {0} is already registered")]
    DuplicateCollection(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl StoreError {
    /// Errors which may succeed if the same operation is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
