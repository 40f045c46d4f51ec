use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::Router;
use axum::extract::State;
use axum::routing::get;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
}

async fn health() -> ApiResponse<()> {
    ApiResponse::message("OK")
}

async fn ready(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    if state.is_ready() {
        Ok(ApiResponse::message("Ready"))
    } else {
        Err(ApiError::Unavailable("store is closed".into()))
    }
}
