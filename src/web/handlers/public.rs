use super::{cards, csrf_token, make_context, nav_categories, render_not_found, COMPACT_EXCERPT};
use crate::models::{Category, CategoryRef, Post, PostCard};
use crate::services::api::{ApiClient, BlogFilter, Section, RELATED_FETCH_LIMIT};
use crate::services::query::{self, ListPage, ListQuery};
use crate::services::slug::{encode_segment, humanize_slug};
use crate::web::error::AppResult;
use crate::web::extractors::CsrfCookie;
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

const STYLESHEET: &str = include_str!("../../../templates/css/site.css");
const MAX_SLUG_LEN: usize = 200;

#[derive(Deserialize)]
pub struct ListParams {
    q: Option<String>,
    page: Option<String>,
}

impl ListParams {
    fn to_query(&self, per_page: usize) -> ListQuery {
        ListQuery::from_params(self.q.as_deref(), self.page.as_deref(), per_page)
    }
}

fn plausible_slug(slug: &str) -> bool {
    !slug.trim().is_empty() && slug.len() <= MAX_SLUG_LEN
}

async fn section(api: &ApiClient, section: Section) -> Vec<Post> {
    match api.list_blogs(&BlogFilter::section(section)).await {
        Ok(posts) => posts,
        Err(e) => {
            tracing::warn!("Section {} unavailable: {}", section, e);
            Vec::new()
        }
    }
}

pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let api = &state.api;
    let (banner, top_new, latest, highlights, editors_pick, popular, categories) = tokio::join!(
        section(api, Section::Banner),
        section(api, Section::TopNew),
        section(api, Section::LatestPosts),
        section(api, Section::Highlights),
        section(api, Section::EditorsPick),
        section(api, Section::MostPopular),
        nav_categories(&state),
    );

    // Without curated latest posts, show the newest from the full collection.
    let latest = if latest.is_empty() {
        match api.all_blogs().await {
            Ok(all) => {
                query::apply(&all, &ListQuery::new(Section::LatestPosts.default_limit())).items
            }
            Err(e) => {
                tracing::warn!("Blog list unavailable: {}", e);
                Vec::new()
            }
        }
    } else {
        latest
    };

    let excerpt_len = state.config.listing.excerpt_length;
    let mut ctx = make_context(&state, &categories);
    ctx.insert("banner", &cards(&state, &banner, excerpt_len));
    ctx.insert("top_new", &cards(&state, &top_new, COMPACT_EXCERPT));
    ctx.insert("latest", &cards(&state, &latest, excerpt_len));
    ctx.insert("highlights", &cards(&state, &highlights, COMPACT_EXCERPT));
    ctx.insert("editors_pick", &cards(&state, &editors_pick, excerpt_len));
    ctx.insert("popular", &cards(&state, &popular, COMPACT_EXCERPT));

    let html = state.templates.render("public/index.html", &ctx)?;
    Ok(Html(html))
}

struct Listing<'a> {
    heading: String,
    description: String,
    base_path: String,
    active_category: Option<&'a CategoryRef>,
}

fn render_listing(
    state: &AppState,
    categories: &[Category],
    all_posts: &[Post],
    listing: Listing<'_>,
    list_query: &ListQuery,
    results: ListPage<Post>,
) -> AppResult<Html<String>> {
    let excerpt_len = state.config.listing.excerpt_length;
    let default_image = state.config.listing.default_image.as_deref();
    let results = results.map(|post| PostCard::new(&post, excerpt_len, default_image));
    let sidebar = query::with_post_counts(categories.to_vec(), all_posts);

    let mut ctx = make_context(state, categories);
    ctx.insert("heading", &listing.heading);
    ctx.insert("description", &listing.description);
    ctx.insert("base_path", &listing.base_path);
    ctx.insert("active_category", &listing.active_category);
    ctx.insert("query", list_query);
    ctx.insert("results", &results);
    ctx.insert("sidebar_categories", &sidebar);

    let html = state.templates.render("public/list.html", &ctx)?;
    Ok(Html(html))
}

pub async fn blog(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let (posts, categories) = tokio::join!(state.api.all_blogs(), nav_categories(&state));
    let posts = posts?;

    let list_query = params.to_query(state.config.listing.posts_per_page);
    let results = query::apply(&posts, &list_query);

    let listing = Listing {
        heading: "Blog".to_string(),
        description: state.config.site.description.clone(),
        base_path: "/blog".to_string(),
        active_category: None,
    };
    render_listing(&state, &categories, &posts, listing, &list_query, results)
}

pub async fn categories(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let (posts, categories) = tokio::join!(state.api.all_blogs(), nav_categories(&state));
    let posts = posts.unwrap_or_else(|e| {
        tracing::warn!("Blog list unavailable, category counts will be zero: {}", e);
        Vec::new()
    });

    let mut ctx = make_context(&state, &categories);
    ctx.insert("categories", &query::with_post_counts(categories.clone(), &posts));

    let html = state.templates.render("public/categories.html", &ctx)?;
    Ok(Html(html))
}

pub async fn category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Response> {
    if !plausible_slug(&slug) {
        let categories = nav_categories(&state).await;
        return render_not_found(&state, &categories);
    }
    let (posts, categories) = tokio::join!(state.api.all_blogs(), nav_categories(&state));
    let posts = posts?;

    // Unknown slugs still render, titled from the slug itself.
    let active = categories
        .iter()
        .find(|c| c.slug == slug)
        .map(|c| CategoryRef {
            name: c.name.clone(),
            slug: c.slug.clone(),
        })
        .unwrap_or_else(|| CategoryRef {
            name: humanize_slug(&slug),
            slug: slug.clone(),
        });
    let description = categories
        .iter()
        .find(|c| c.slug == slug)
        .and_then(|c| c.meta_description.clone())
        .unwrap_or_else(|| format!("Latest posts in {}.", active.name));

    let list_query = params
        .to_query(state.config.listing.posts_per_page)
        .category(slug.clone());
    let results = query::apply(&posts, &list_query);

    let listing = Listing {
        heading: active.name.clone(),
        description,
        base_path: format!("/categories/{}", encode_segment(&active.slug)),
        active_category: Some(&active),
    };
    Ok(render_listing(&state, &categories, &posts, listing, &list_query, results)?.into_response())
}

#[derive(Deserialize)]
pub struct PostParams {
    comment: Option<String>,
}

fn comment_flash(status: Option<&str>) -> Option<(&'static str, &'static str)> {
    match status? {
        "sent" => Some(("success", "Thanks! Your comment has been posted.")),
        "invalid" => Some((
            "error",
            "Please fill in your name, a valid email address and a message.",
        )),
        "limited" => Some((
            "error",
            "You have posted several comments recently. Please try again later.",
        )),
        "failed" => Some(("error", "Your comment could not be posted. Please try again.")),
        _ => None,
    }
}

/// Re-serializes schema markup so only valid JSON reaches the page, with
/// `</` escaped to keep it inside its script element.
fn json_ld(markup: Option<&str>) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(markup?).ok()?;
    let json = serde_json::to_string(&value).ok()?;
    Some(json.replace("</", "<\\/"))
}

pub async fn post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<PostParams>,
    CsrfCookie(cookie): CsrfCookie,
    jar: CookieJar,
) -> AppResult<Response> {
    if !plausible_slug(&slug) {
        let categories = nav_categories(&state).await;
        return render_not_found(&state, &categories);
    }

    let (post, categories) = tokio::join!(state.api.get_blog(&slug), nav_categories(&state));
    let Some(post) = post? else {
        return render_not_found(&state, &categories);
    };

    let comments_fut = async {
        if post.id.is_empty() {
            return Ok(Vec::new());
        }
        state.api.list_comments(&post.id).await
    };
    let related_filter = BlogFilter::limit(RELATED_FETCH_LIMIT);
    let (pool, comments) = tokio::join!(
        state.api.list_blogs(&related_filter),
        comments_fut,
    );
    let pool = pool.unwrap_or_else(|e| {
        tracing::warn!("Related posts unavailable: {}", e);
        Vec::new()
    });
    let comments = comments.unwrap_or_else(|e| {
        tracing::warn!("Comments unavailable for {}: {}", post.slug, e);
        Vec::new()
    });
    let related = query::related(&pool, &post, state.config.listing.related_limit);

    let body = post
        .body_html
        .as_deref()
        .map(|html| state.sanitizer.clean(html))
        .unwrap_or_default();

    let (jar, token) = csrf_token(&state, cookie, jar);

    let mut ctx = make_context(&state, &categories);
    ctx.insert("post", &post);
    ctx.insert("post_href", &post.href());
    ctx.insert("body", &body);
    ctx.insert(
        "reading_time",
        &crate::services::html::reading_time(&post.plain_text),
    );
    ctx.insert("json_ld", &json_ld(post.schema_markup.as_deref()));
    ctx.insert(
        "related",
        &cards(&state, related, state.config.listing.excerpt_length),
    );
    ctx.insert("comments", &comments);
    ctx.insert("csrf_token", &token);
    if let Some((kind, message)) = comment_flash(params.comment.as_deref()) {
        ctx.insert("flash_kind", kind);
        ctx.insert("flash", message);
    }

    let html = state.templates.render("public/post.html", &ctx)?;
    Ok((jar, Html(html)).into_response())
}

pub async fn not_found(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let categories = nav_categories(&state).await;
    render_not_found(&state, &categories)
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn stylesheet() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        STYLESHEET,
    )
}
