mod error;
mod extractors;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use error::{AppError, AppResult};
pub use state::AppState;

use crate::Config;
use anyhow::Result;
use axum::http::StatusCode;
use axum::middleware;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

/// The full application router. Exposed separately from [`serve`] so it can
/// be driven in-process.
pub fn router(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .merge(routes::public_routes())
        .merge(routes::form_routes())
        .fallback(handlers::public::not_found)
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config)?);

    let maintenance = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            maintenance.rate_limiter.cleanup();
            let purged = maintenance.api.cache().purge_expired();
            if purged > 0 {
                tracing::debug!(
                    "Purged {} expired API cache entries, {} remain",
                    purged,
                    maintenance.api.cache().len()
                );
            }
        }
    });

    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;

    Ok(())
}
