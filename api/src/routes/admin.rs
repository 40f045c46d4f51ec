//! Admin console: admin accounts and sessions, and user management.

use super::auth::{RefreshRequest, device_id};
use crate::auth::AuthAdmin;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::response::ApiResponse;
use crate::state::AppState;
use accounts::{
    AdminProfile, AdminSort, AdminSortBy, IssuedTokens, NewAdmin, NewDevice, ProcessedImage, Role,
    SortBy, UserDetailsUpdate, UserFilter, UserProfile, UserSort, UserStatus,
};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post, put};
use serde::{Deserialize, Serialize};
use shared::pagination::{Order, PageRequest};

pub fn router() -> Router<AppState> {
    let auth = Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/password", put(change_password));

    let users = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user))
        .route("/{id}/details", put(update_details))
        .route("/{id}/password", put(set_password))
        .route("/{id}/block", put(block))
        .route("/{id}/unblock", put(unblock))
        .route("/{id}/images", post(add_images))
        .route("/{id}/images/{image_id}", delete(delete_image))
        .route("/{id}/images/{image_id}/status", put(set_image_status))
        .route("/{id}/images/{image_id}/default", put(make_profile_image));

    Router::new()
        .route("/", get(list_admins).post(create_admin))
        .nest("/auth", auth)
        .nest("/users", users)
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
    admin: AdminProfile,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let admin = state
        .admins
        .authenticate(&request.email, &request.password)
        .await?;
    let tokens = state
        .sessions
        .open(Role::Admin, &admin.id, request.device_info)?;
    tracing::info!(admin_id = %admin.id, "Admin logged in");

    Ok(ApiResponse::ok(LoginResponse {
        tokens,
        admin: AdminProfile::from(&admin),
    })
    .with_message("Logged in successfully"))
}

async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<ApiResponse<IssuedTokens>, ApiError> {
    let device_id = device_id(&headers)?;
    let tokens = state
        .sessions
        .refresh(Role::Admin, device_id, &request.refresh_token)?;
    Ok(ApiResponse::ok(tokens))
}

async fn logout(
    State(state): State<AppState>,
    admin: AuthAdmin,
) -> Result<ApiResponse<()>, ApiError> {
    state.sessions.deactivate(&admin.admin_id, &admin.device_id)?;
    Ok(ApiResponse::message("Logged out successfully"))
}

#[derive(Deserialize)]
struct PasswordChange {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    admin: AuthAdmin,
    ApiJson(change): ApiJson<PasswordChange>,
) -> Result<ApiResponse<()>, ApiError> {
    state
        .admins
        .change_password(&admin.admin_id, &change.current_password, &change.new_password)
        .await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

#[derive(Debug, Deserialize)]
struct AdminListQuery {
    page: Option<u64>,
    limit: Option<u64>,
    #[serde(default)]
    order: Order,
    #[serde(default)]
    sort_by: AdminSortBy,
    search: Option<String>,
}

async fn list_admins(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    ApiQuery(query): ApiQuery<AdminListQuery>,
) -> Result<ApiResponse<Vec<AdminProfile>>, ApiError> {
    let sort = AdminSort {
        sort_by: query.sort_by,
        order: query.order,
    };
    let page = state
        .admins
        .list(
            query.search.as_deref(),
            sort,
            PageRequest::new(query.page, query.limit)?,
        )
        .map(|admin| AdminProfile::from(&admin));
    Ok(ApiResponse::page(page))
}

async fn create_admin(
    State(state): State<AppState>,
    admin: AuthAdmin,
    ApiJson(new): ApiJson<NewAdmin>,
) -> Result<ApiResponse<AdminProfile>, ApiError> {
    let created = state.admins.create(new).await?;
    tracing::info!(admin_id = %created.id, created_by = %admin.admin_id, "Admin created by admin");
    Ok(ApiResponse::created(AdminProfile::from(&created)).with_message("Admin created successfully"))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u64>,
    limit: Option<u64>,
    #[serde(default)]
    order: Order,
    #[serde(default)]
    sort_by: SortBy,
    status: Option<UserStatus>,
    is_blocked: Option<bool>,
}

async fn list_users(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<ApiResponse<Vec<UserProfile>>, ApiError> {
    let filter = UserFilter {
        status: query.status,
        is_blocked: query.is_blocked,
    };
    let sort = UserSort {
        sort_by: query.sort_by,
        order: query.order,
    };
    let page = state
        .users
        .list(&filter, sort, PageRequest::new(query.page, query.limit)?)
        .map(|user| UserProfile::from(&user));
    Ok(ApiResponse::page(page))
}

#[derive(Deserialize)]
struct NewUser {
    email: String,
    password: String,
    status: Option<UserStatus>,
}

async fn create_user(
    State(state): State<AppState>,
    admin: AuthAdmin,
    ApiJson(new): ApiJson<NewUser>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state
        .users
        .create(&new.email, &new.password, new.status)
        .await?;
    tracing::info!(user_id = %user.id, admin_id = %admin.admin_id, "User created by admin");
    Ok(ApiResponse::created(UserProfile::from(&user)).with_message("User created successfully"))
}

async fn get_user(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.get(&id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)))
}

async fn update_details(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<UserDetailsUpdate>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.update_details(&id, update)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Details updated successfully"))
}

#[derive(Deserialize)]
struct NewPassword {
    password: String,
}

async fn set_password(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
    ApiJson(new): ApiJson<NewPassword>,
) -> Result<ApiResponse<()>, ApiError> {
    state.users.set_password(&id, &new.password).await?;
    Ok(ApiResponse::message("Password updated successfully"))
}

#[derive(Deserialize)]
struct BlockRequest {
    reason: String,
}

async fn block(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<BlockRequest>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::Validation("reason must not be empty".into()));
    }
    let user = state.users.block(&id, reason, &admin.admin_id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("User blocked successfully"))
}

async fn unblock(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.unblock(&id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("User unblocked successfully"))
}

#[derive(Deserialize)]
struct NewImages {
    images: Vec<ProcessedImage>,
}

async fn add_images(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
    ApiJson(new): ApiJson<NewImages>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.add_images(&id, new.images)?;
    Ok(ApiResponse::created(UserProfile::from(&user)).with_message("Images added successfully"))
}

async fn delete_image(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.delete_image(&id, &image_id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Image deleted successfully"))
}

#[derive(Deserialize)]
struct ImageStatus {
    is_approved: bool,
}

async fn set_image_status(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path((id, image_id)): Path<(String, String)>,
    ApiJson(status): ApiJson<ImageStatus>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state
        .users
        .set_image_approval(&id, &image_id, status.is_approved)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Image status updated"))
}

async fn make_profile_image(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let user = state.users.make_profile_image(&id, &image_id)?;
    Ok(ApiResponse::ok(UserProfile::from(&user)).with_message("Profile image updated"))
}
