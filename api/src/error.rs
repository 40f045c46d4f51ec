use accounts::AccountError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docstore::StoreError;
use ledger::LedgerError;
use serde::Serialize;
use shared::pagination::PaginationError;

/// Errors returned by handlers. Each variant maps to one `error_code`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::InvalidCredentials | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::UserNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::UserNotFound => "USER_NOT_FOUND",
            ApiError::NotFound(_) => "RESOURCE_NOT_FOUND",
            ApiError::AlreadyExists(_) => "RESOURCE_ALREADY_EXISTS",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    code: u16,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(ErrorBody {
            success: false,
            // Internal details stay in the logs
            message: match &self {
                ApiError::Internal(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            code: status.as_u16(),
            error_code: self.error_code(),
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => ApiError::Unavailable(reason),
            StoreError::Conflict { collection, .. } => ApiError::AlreadyExists(collection),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials => ApiError::InvalidCredentials,
            AccountError::InvalidToken => ApiError::InvalidToken,
            AccountError::Blocked => ApiError::Forbidden(err.to_string()),
            AccountError::NotFound("user") => ApiError::UserNotFound,
            AccountError::NotFound(what) => ApiError::NotFound(capitalize(what)),
            AccountError::AlreadyExists(what) => ApiError::AlreadyExists(capitalize(what)),
            AccountError::WeakPassword(_) => ApiError::Validation(err.to_string()),
            AccountError::InvalidInput(_) | AccountError::ImageNotApproved => {
                ApiError::InvalidInput(err.to_string())
            }
            AccountError::Store(err) => err.into(),
            AccountError::Email(_) => ApiError::Unavailable(err.to_string()),
            AccountError::Hash(_) | AccountError::Task(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::StorageTransient(reason) => ApiError::Unavailable(reason),
            LedgerError::StorageConflict(_) => ApiError::Unavailable(err.to_string()),
            LedgerError::ActivityNotFound(_) => ApiError::NotFound("Activity".into()),
            LedgerError::Storage(err) => err.into(),
        }
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_error_mapping() {
        let cases = [
            (AccountError::InvalidCredentials, StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            (AccountError::Blocked, StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AccountError::NotFound("user"), StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            (AccountError::NotFound("image"), StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            (AccountError::AlreadyExists("user"), StatusCode::CONFLICT, "RESOURCE_ALREADY_EXISTS"),
            (AccountError::WeakPassword("too short"), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (AccountError::ImageNotApproved, StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        ];
        for (err, status, code) in cases {
            let err = ApiError::from(err);
            assert_eq!(err.status(), status);
            assert_eq!(err.error_code(), code);
        }

        let err = ApiError::from(AccountError::NotFound("image"));
        assert_eq!(err.to_string(), "Image not found");
    }

    #[test]
    fn test_ledger_error_mapping() {
        let err = ApiError::from(LedgerError::StorageTransient("store is closed".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::from(LedgerError::ActivityNotFound("a1".into()));
        assert_eq!(err.error_code(), "RESOURCE_NOT_FOUND");
    }
}
