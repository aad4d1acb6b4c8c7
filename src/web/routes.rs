use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Comment and contact forms are small; cap bodies well below axum's default.
const FORM_BODY_LIMIT: usize = 64 * 1024;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::public::index))
        .route("/blog", get(handlers::public::blog))
        .route("/blog/:slug", get(handlers::public::post))
        .route("/categories", get(handlers::public::categories))
        .route("/categories/:slug", get(handlers::public::category))
        .route("/contact", get(handlers::forms::contact))
        .route("/static/site.css", get(handlers::public::stylesheet))
        .route("/health", get(handlers::public::health))
}

pub fn form_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/blog/:slug/comments",
            post(handlers::forms::submit_comment),
        )
        .route("/contact", post(handlers::forms::submit_contact))
        .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT))
}
