//! Activity rosters. Roster changes update the connection ledger in the same
//! transaction.

use crate::auth::{AuthAdmin, AuthUser};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use docstore::Txn;
use ledger::{Activity, LedgerError, NewActivity};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(show).delete(remove))
        .route("/{id}/join", post(join))
        .route("/{id}/leave", post(leave))
}

fn settle<T>(txn: Txn, result: Result<T, LedgerError>) -> Result<T, ApiError> {
    match result {
        Ok(value) => {
            txn.commit();
            Ok(value)
        }
        Err(err) => {
            txn.rollback();
            Err(err.into())
        }
    }
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(new): ApiJson<NewActivity>,
) -> Result<ApiResponse<Activity>, ApiError> {
    if new.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    let mut txn = state.store.begin()?;
    let result = state
        .participation
        .create(&mut txn, new, &user.user_id)
        .await;
    let activity = settle(txn, result)?;
    Ok(ApiResponse::created(activity).with_message("Activity created successfully"))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Activity>, ApiError> {
    let activity = state
        .participation
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("Activity".into()))?;
    Ok(ApiResponse::ok(activity))
}

async fn join(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Activity>, ApiError> {
    let mut txn = state.store.begin()?;
    let result = state.participation.join(&mut txn, &id, &user.user_id).await;
    let activity = settle(txn, result)?;
    Ok(ApiResponse::ok(activity).with_message("Joined activity"))
}

async fn leave(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Activity>, ApiError> {
    let mut txn = state.store.begin()?;
    let result = state.participation.leave(&mut txn, &id, &user.user_id).await;
    let activity = settle(txn, result)?;
    Ok(ApiResponse::ok(activity).with_message("Left activity"))
}

async fn remove(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let mut txn = state.store.begin()?;
    let result = state.participation.delete(&mut txn, &id).await;
    settle(txn, result)?;
    tracing::info!(activity_id = %id, admin_id = %admin.admin_id, "Activity removed by admin");
    Ok(ApiResponse::message("Activity deleted successfully"))
}
