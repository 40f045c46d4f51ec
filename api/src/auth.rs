use crate::error::ApiError;
use crate::state::AppState;
use accounts::Role;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The user behind a valid user access token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub device_id: String,
}

/// The admin behind a valid admin access token.
#[derive(Clone, Debug)]
pub struct AuthAdmin {
    pub admin_id: String,
    pub device_id: String,
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts)?;
        let session = state.sessions.authenticate(Role::User, token)?;
        let user = state.users.get(&session.principal_id)?;
        if user.is_blocked {
            return Err(ApiError::Forbidden("Account is blocked".into()));
        }
        Ok(AuthUser {
            user_id: session.principal_id,
            device_id: session.device_id,
        })
    }
}

impl FromRequestParts<AppState> for AuthAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts)?;
        let session = state.sessions.authenticate(Role::Admin, token)?;
        Ok(AuthAdmin {
            admin_id: session.principal_id,
            device_id: session.device_id,
        })
    }
}
