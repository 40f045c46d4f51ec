use crate::middleware::track_metrics;
use crate::state::AppState;
use axum::Router;
use serde::Deserialize;
use shared::pagination::{PageRequest, PaginationError};

mod activities;
mod admin;
mod auth;
mod health;
mod users;

#[cfg(test)]
mod testutils;

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/activities", activities::router())
        .nest("/admin", admin::router());

    Router::new()
        .nest("/v1", v1)
        .merge(health::router())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state)
}

/// `?page&limit` query parameters.
#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u64>,
    limit: Option<u64>,
}

impl PageQuery {
    fn to_request(&self) -> Result<PageRequest, PaginationError> {
        PageRequest::new(self.page, self.limit)
    }
}
