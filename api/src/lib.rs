//! HTTP API of the tablemate backend.

mod auth;
pub mod config;
mod error;
mod extract;
mod metrics_defs;
mod middleware;
mod response;
mod routes;
mod state;

pub use config::{Config, Listener, ValidationError};
pub use error::ApiError;
pub use metrics_defs::ALL_METRICS;
pub use routes::router;
pub use state::AppState;

use std::future::Future;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves the API until `shutdown` resolves. In-flight requests are allowed
/// to finish.
pub async fn serve<F>(listener: &Listener, state: AppState, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let addr = format!("{}:{}", listener.host, listener.port);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
