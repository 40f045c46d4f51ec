//! User authentication and device management.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::response::ApiResponse;
use crate::state::AppState;
use accounts::{IssuedTokens, NewDevice, Role, UserProfile};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, post, put};
use serde::{Deserialize, Serialize};

const DEVICE_ID_HEADER: &str = "x-device-id";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/request-reset", post(request_reset))
        .route("/reset-password", post(reset_password))
        .route("/logout", post(logout))
        .route("/devices", post(register_device))
        .route("/devices/{device_id}/token", put(update_device_token))
        .route("/devices/{device_id}", delete(remove_device))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
    device_info: NewDevice,
}

#[derive(Serialize)]
struct LoginResponse {
    #[serde(flatten)]
    tokens: IssuedTokens,
    user: UserProfile,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let user = state
        .users
        .authenticate(&request.email, &request.password)
        .await?;
    let tokens = state.sessions.open(Role::User, &user.id, request.device_info)?;
    tracing::info!(user_id = %user.id, device_id = %tokens.device_id, "User logged in");

    Ok(ApiResponse::ok(LoginResponse {
        tokens,
        user: UserProfile::from(&user),
    })
    .with_message("Logged in successfully"))
}

#[derive(Deserialize)]
pub(super) struct RefreshRequest {
    pub refresh_token: String,
}

pub(super) fn device_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Device ID is required".into()))
}

async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<ApiResponse<IssuedTokens>, ApiError> {
    let device_id = device_id(&headers)?;
    let tokens = state
        .sessions
        .refresh(Role::User, device_id, &request.refresh_token)?;
    Ok(ApiResponse::ok(tokens))
}

#[derive(Deserialize)]
struct ResetRequest {
    email: String,
}

async fn request_reset(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    state.users.request_password_reset(&request.email).await?;
    Ok(ApiResponse::message(
        "If your email is registered, you will receive a password reset link",
    ))
}

#[derive(Deserialize)]
struct ResetPassword {
    token: String,
    password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPassword>,
) -> Result<ApiResponse<()>, ApiError> {
    state
        .users
        .reset_password(&request.token, &request.password)
        .await?;
    Ok(ApiResponse::message("Password has been reset successfully"))
}

async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ApiResponse<()>, ApiError> {
    state.sessions.deactivate(&user.user_id, &user.device_id)?;
    Ok(ApiResponse::message("Logged out successfully"))
}

async fn register_device(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(device): ApiJson<NewDevice>,
) -> Result<ApiResponse<IssuedTokens>, ApiError> {
    let tokens = state.sessions.open(Role::User, &user.user_id, device)?;
    Ok(ApiResponse::created(tokens).with_message("Device registered successfully"))
}

#[derive(Deserialize)]
struct DeviceTokenUpdate {
    device_token: String,
}

async fn update_device_token(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    ApiJson(update): ApiJson<DeviceTokenUpdate>,
) -> Result<ApiResponse<()>, ApiError> {
    state
        .sessions
        .update_device_token(&user.user_id, &device_id, &update.device_token)?;
    Ok(ApiResponse::message("Device token updated successfully"))
}

async fn remove_device(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    state.sessions.deactivate(&user.user_id, &device_id)?;
    Ok(ApiResponse::message("Device removed successfully"))
}
