use crate::email::EmailError;
use docstore::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum AccountError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("account is blocked")]
    Blocked,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("password does not meet the requirements: {0}")]
    WeakPassword(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("image is not approved")]
    ImageNotApproved,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("email delivery failed: {0}")]
    Email(#[from] EmailError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
