pub mod forms;
pub mod public;

use crate::models::{Category, Post, PostCard};
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;
use chrono::Datelike;
use tera::Context;

/// Excerpt length for compact list cards.
const COMPACT_EXCERPT: usize = 120;

fn make_context(state: &AppState, nav_categories: &[Category]) -> Context {
    let mut ctx = Context::new();
    ctx.insert("site", &state.config.site);
    ctx.insert("nav_categories", nav_categories);
    ctx.insert("current_year", &chrono::Utc::now().year());
    ctx
}

/// Header/sidebar categories. The page still renders when they fail.
async fn nav_categories(state: &AppState) -> Vec<Category> {
    match state.api.list_categories().await {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!("Categories unavailable: {}", e);
            Vec::new()
        }
    }
}

fn cards<'a>(
    state: &AppState,
    posts: impl IntoIterator<Item = &'a Post>,
    excerpt_len: usize,
) -> Vec<PostCard> {
    let default_image = state.config.listing.default_image.as_deref();
    posts
        .into_iter()
        .map(|post| PostCard::new(post, excerpt_len, default_image))
        .collect()
}

fn render_not_found(state: &AppState, nav_categories: &[Category]) -> AppResult<Response> {
    let ctx = make_context(state, nav_categories);
    let html = state.templates.render("public/404.html", &ctx)?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}

/// Reuses the caller's CSRF cookie or issues a fresh one.
fn csrf_token(state: &AppState, cookie: Option<String>, jar: CookieJar) -> (CookieJar, String) {
    match cookie {
        Some(token) => (jar, token),
        None => {
            let token = state.csrf.generate();
            (jar.add(state.csrf.cookie(token.clone())), token)
        }
    }
}
