use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use blogfront::services::api::ApiClient;
use blogfront::web::AppState;
use blogfront::Config;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Requests the fake API received on its POST endpoints.
#[derive(Default)]
struct Upstream {
    comments: Mutex<Vec<Value>>,
    contacts: Mutex<Vec<Value>>,
}

fn stub_posts() -> Vec<Value> {
    let mut posts: Vec<Value> = (1..=7)
        .map(|n| {
            // Odd posts use the bare-name category form.
            let category = if n % 2 == 0 {
                json!({ "name": "Food", "slug": "food" })
            } else {
                json!("Life Style")
            };
            json!({
                "_id": format!("post-{}", n),
                "slug": format!("post-{}", n),
                "title": format!("Story number {}", n),
                "postedBy": "Editor",
                "category": category,
                "contentHtml": format!("<p>Body of story {}</p>", n),
                "createdAt": format!("2024-01-0{}T08:00:00Z", n),
            })
        })
        .collect();
    posts.push(json!({
        "_id": "post-rust",
        "slug": "learning-rust",
        "title": "Learning Rust",
        "author": "Ferris",
        "category": { "slug": "life-style" },
        "content": "<p>The borrow checker</p><script>alert('x')</script>",
        "schemaMarkup": "{\"@type\": \"Article\"}",
    }));
    posts
}

async fn blogs(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    // Curated sections are empty so the home page falls back to the full list.
    if params.contains_key("section") {
        return Json(json!([]));
    }
    Json(Value::Array(stub_posts()))
}

async fn blog(Path(slug): Path<String>) -> Response {
    if slug == "slow-post" {
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    }
    match stub_posts().into_iter().find(|p| p["slug"] == slug.as_str()) {
        Some(post) => Json(json!({ "data": post })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response(),
    }
}

async fn categories() -> Json<Value> {
    Json(json!({
        "data": [
            { "_id": "c1", "name": "Food", "slug": "food" },
            { "_id": "c2", "name": "Life Style", "slug": "life-style" },
            { "_id": "c3", "name": "Travel", "slug": "travel" },
            { "_id": "c4" }
        ]
    }))
}

async fn comments(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("eventId").map(String::as_str) == Some("post-rust") {
        return Json(json!([
            { "_id": "m1", "name": "Ana", "email": "ana@example.com", "message": "Loved it" }
        ]));
    }
    Json(json!([]))
}

async fn create_comment(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> StatusCode {
    upstream.comments.lock().unwrap().push(body);
    StatusCode::CREATED
}

async fn create_contact(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> StatusCode {
    upstream.contacts.lock().unwrap().push(body);
    StatusCode::OK
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/api/blogs", get(blogs))
        .route("/api/blogs/:slug", get(blog))
        .route("/api/categories", get(categories))
        .route("/api/comments", get(comments).post(create_comment))
        .route("/api/contact", axum::routing::post(create_contact))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), upstream)
}

fn test_config(base_url: &str) -> Config {
    test_config_with_server(base_url, "")
}

/// Test config with extra `[server]` keys.
fn test_config_with_server(base_url: &str, server: &str) -> Config {
    let config = Config::parse(&format!(
        r#"
[server]
{}

[site]
title = "Test Blog"
description = "A blog under test"
url = "http://localhost:3000"

[api]
base_url = "{}"
timeout_secs = 5
cache_ttl_secs = 0

[contact]
address = ["1 Main Street", "Springfield"]
info = ["hello@example.com"]
"#,
        server, base_url
    ))
    .expect("Failed to parse test config");
    config.validate().expect("Test config should be valid");
    config
}

async fn test_app() -> (Router, Arc<Upstream>) {
    test_app_with_server("").await
}

async fn test_app_with_server(server: &str) -> (Router, Arc<Upstream>) {
    let (base_url, upstream) = spawn_upstream().await;
    let config = test_config_with_server(&base_url, server);
    let state = AppState::new(config).expect("Failed to build app state");
    (blogfront::web::router(Arc::new(state)), upstream)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_page(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn form_post(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("csrf_token={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Token from the `Set-Cookie` header a GET handler issued.
fn issued_token(headers: &axum::http::HeaderMap) -> String {
    let cookie = headers
        .get(header::SET_COOKIE)
        .expect("CSRF cookie should be set")
        .to_str()
        .unwrap();
    let pair = cookie.split(';').next().unwrap();
    pair.strip_prefix("csrf_token=").unwrap().to_string()
}

mod page_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let (app, _) = test_app().await;
        let (_, headers, _) = get_page(&app, "/health").await;
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert!(headers.contains_key("content-security-policy"));
    }

    #[tokio::test]
    async fn test_stylesheet() {
        let (app, _) = test_app().await;
        let (status, headers, body) = get_page(&app, "/static/site.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/css; charset=utf-8");
        assert!(body.contains(".post-card"));
    }

    #[tokio::test]
    async fn test_home_falls_back_to_newest_posts() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Story number 7"));
        assert!(body.contains("Story number 2"));
        assert!(!body.contains("Story number 1<"));
        assert!(body.contains("Travel"));
    }

    #[tokio::test]
    async fn test_blog_first_page() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/blog").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("8 articles"));
        for n in [7, 6, 5, 4] {
            assert!(body.contains(&format!("Story number {}", n)), "missing story {}", n);
        }
        assert!(!body.contains("Story number 3"));
        assert!(!body.contains("Learning Rust"));
    }

    #[tokio::test]
    async fn test_blog_last_page_has_undated_post() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/blog?page=2").await;
        assert_eq!(status, StatusCode::OK);
        for n in [3, 2, 1] {
            assert!(body.contains(&format!("Story number {}", n)));
        }
        assert!(body.contains("Learning Rust"));
        assert!(!body.contains("Story number 4"));
    }

    #[tokio::test]
    async fn test_blog_page_out_of_range_is_clamped() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/blog?page=99").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Learning Rust"));

        let (status, _, body) = get_page(&app, "/blog?page=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Story number 7"));
    }

    #[tokio::test]
    async fn test_blog_search_matches_body_text() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/blog?q=BORROW").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("1 article"));
        assert!(body.contains("Learning Rust"));
        assert!(!body.contains("Story number"));
    }

    #[tokio::test]
    async fn test_blog_search_without_matches() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/blog?q=zeppelin").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No articles found."));
    }

    #[tokio::test]
    async fn test_category_listing() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/categories/food").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("3 articles"));
        assert!(body.contains("Story number 6"));
        assert!(!body.contains("Story number 5"));
    }

    #[tokio::test]
    async fn test_empty_category() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/categories/travel?page=4").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No articles found."));
        assert!(body.contains("Travel"));
    }

    #[tokio::test]
    async fn test_unknown_category_uses_humanized_slug() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/categories/deep-sea").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Deep Sea"));
        assert!(body.contains("No articles found."));
    }

    #[tokio::test]
    async fn test_categories_index_counts_posts() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/categories").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Food"));
        assert!(body.contains("5 articles"));
        assert!(body.contains("0 articles"));
    }

    #[tokio::test]
    async fn test_post_page() {
        let (app, _) = test_app().await;
        let (status, headers, body) = get_page(&app, "/blog/learning-rust").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Learning Rust"));
        assert!(body.contains("The borrow checker"));
        assert!(!body.contains("alert('x')"));
        assert!(body.contains("application/ld+json"));
        assert!(body.contains("Loved it"));
        assert!(!body.contains("ana@example.com"));
        assert!(!issued_token(&headers).is_empty());
    }

    #[tokio::test]
    async fn test_post_page_lists_related_posts() {
        let (app, _) = test_app().await;
        let (_, _, body) = get_page(&app, "/blog/post-4").await;
        assert!(body.contains("Related Posts"));
        assert!(body.contains("Story number 2"));
        assert!(body.contains("Story number 6"));
    }

    #[tokio::test]
    async fn test_unknown_post_is_404() {
        let (app, _) = test_app().await;
        let (status, _, body) = get_page(&app, "/blog/no-such-post").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("404"));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let (app, _) = test_app_with_server("request_timeout_secs = 1").await;
        let (status, _, _) = get_page(&app, "/blog/slow-post").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _) = test_app().await;
        let (status, _, _) = get_page(&app, "/wp-admin").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upstream_down_is_bad_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let state = AppState::new(test_config(&format!("http://{}", addr))).unwrap();
        let app = blogfront::web::router(Arc::new(state));
        let (status, _, _) = get_page(&app, "/blog").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _, _) = get_page(&app, "/contact").await;
        assert_eq!(status, StatusCode::OK);
    }
}

mod form_integration_tests {
    use super::*;

    async fn csrf_for(app: &Router, uri: &str) -> String {
        let (_, headers, _) = get_page(app, uri).await;
        issued_token(&headers)
    }

    #[tokio::test]
    async fn test_comment_without_token_is_forbidden() {
        let (app, upstream) = test_app().await;
        let request = form_post(
            "/blog/learning-rust/comments",
            None,
            "name=Ana&email=ana%40example.com&message=Hi&csrf_token=forged",
        );
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(upstream.comments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_is_forwarded() {
        let (app, upstream) = test_app().await;
        let token = csrf_for(&app, "/blog/learning-rust").await;
        let request = form_post(
            "/blog/learning-rust/comments",
            Some(&token),
            &format!(
                "name=+Ana+&email=ana%40example.com&message=Great+post&csrf_token={}",
                token
            ),
        );
        let (status, headers, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "/blog/learning-rust?comment=sent#comments"
        );

        let sent = upstream.comments.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["eventId"], "post-rust");
        assert_eq!(sent[0]["name"], "Ana");
        assert_eq!(sent[0]["message"], "Great post");
    }

    #[tokio::test]
    async fn test_invalid_comment_redirects_back() {
        let (app, upstream) = test_app().await;
        let token = csrf_for(&app, "/blog/learning-rust").await;
        let request = form_post(
            "/blog/learning-rust/comments",
            Some(&token),
            &format!("name=Ana&email=nope&message=Hi&csrf_token={}", token),
        );
        let (status, headers, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "/blog/learning-rust?comment=invalid#comments"
        );
        assert!(upstream.comments.lock().unwrap().is_empty());

        let (_, _, body) = get_page(&app, "/blog/learning-rust?comment=invalid").await;
        assert!(body.contains("valid email address"));
    }

    #[tokio::test]
    async fn test_comment_on_unknown_post_is_404() {
        let (app, _) = test_app().await;
        let token = csrf_for(&app, "/contact").await;
        let request = form_post(
            "/blog/missing/comments",
            Some(&token),
            &format!("name=Ana&email=ana%40example.com&message=Hi&csrf_token={}", token),
        );
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_comments_are_rate_limited() {
        let (app, upstream) = test_app().await;
        let token = csrf_for(&app, "/blog/learning-rust").await;
        let body = format!(
            "name=Ana&email=ana%40example.com&message=Again&csrf_token={}",
            token
        );
        let mut last_location = String::new();
        for _ in 0..6 {
            let request = form_post("/blog/learning-rust/comments", Some(&token), &body);
            let (_, headers, _) = send(&app, request).await;
            last_location = headers
                .get(header::LOCATION)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string();
        }
        assert_eq!(last_location, "/blog/learning-rust?comment=limited#comments");
        assert_eq!(upstream.comments.lock().unwrap().len(), 5);
    }

    async fn post_comments_from_rotating_addresses(app: &Router) -> String {
        let token = csrf_for(app, "/blog/learning-rust").await;
        let body = format!(
            "name=Ana&email=ana%40example.com&message=Again&csrf_token={}",
            token
        );
        let mut last_location = String::new();
        for i in 0..6 {
            let mut request = form_post("/blog/learning-rust/comments", Some(&token), &body);
            request.headers_mut().insert(
                "x-forwarded-for",
                format!("203.0.113.{}", i).parse().unwrap(),
            );
            let (_, headers, _) = send(app, request).await;
            last_location = headers
                .get(header::LOCATION)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string();
        }
        last_location
    }

    #[tokio::test]
    async fn test_forwarded_for_does_not_bypass_rate_limit() {
        let (app, upstream) = test_app().await;
        let last_location = post_comments_from_rotating_addresses(&app).await;
        assert_eq!(last_location, "/blog/learning-rust?comment=limited#comments");
        assert_eq!(upstream.comments.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_forwarded_for_used_when_trusted() {
        let (app, upstream) = test_app_with_server("trust_forwarded_for = true").await;
        let last_location = post_comments_from_rotating_addresses(&app).await;
        assert_eq!(last_location, "/blog/learning-rust?comment=sent#comments");
        assert_eq!(upstream.comments.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_contact_page() {
        let (app, _) = test_app().await;
        let (status, headers, body) = get_page(&app, "/contact").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("1 Main Street"));
        assert!(body.contains("hello@example.com"));
        assert!(body.contains(&issued_token(&headers)));
    }

    #[tokio::test]
    async fn test_contact_is_forwarded() {
        let (app, upstream) = test_app().await;
        let token = csrf_for(&app, "/contact").await;
        let request = form_post(
            "/contact",
            Some(&token),
            &format!(
                "name=Ana&email=ana%40example.com&subject=&message=Hello+there&csrf_token={}",
                token
            ),
        );
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Thanks for reaching out"));

        let sent = upstream.contacts.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["email"], "ana@example.com");
        assert!(sent[0].get("subject").is_none());
    }

    #[tokio::test]
    async fn test_invalid_contact_keeps_input() {
        let (app, upstream) = test_app().await;
        let token = csrf_for(&app, "/contact").await;
        let request = form_post(
            "/contact",
            Some(&token),
            &format!("name=Ana&email=ana%40example.com&message=&csrf_token={}", token),
        );
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("message is required"));
        assert!(body.contains("value=\"Ana\""));
        assert!(upstream.contacts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contact_with_mismatched_token_is_forbidden() {
        let (app, _) = test_app().await;
        let token = csrf_for(&app, "/contact").await;
        let request = form_post(
            "/contact",
            Some(&token),
            "name=Ana&email=ana%40example.com&message=Hi&csrf_token=other",
        );
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

mod api_client_integration_tests {
    use super::*;
    use blogfront::services::api::{BlogFilter, Section};

    async fn client() -> ApiClient {
        let (base_url, _) = spawn_upstream().await;
        ApiClient::new(&test_config(&base_url).api).expect("Failed to build client")
    }

    #[tokio::test]
    async fn test_list_categories_skips_unnamed() {
        let api = client().await;
        let categories = api.list_categories().await.unwrap();
        let slugs: Vec<&str> = categories.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["food", "life-style", "travel"]);
    }

    #[tokio::test]
    async fn test_all_blogs_normalizes_records() {
        let api = client().await;
        let posts = api.all_blogs().await.unwrap();
        assert_eq!(posts.len(), 8);
        let odd = posts.iter().find(|p| p.slug == "post-1").unwrap();
        assert_eq!(odd.category_slug(), Some("life-style"));
        let rust = posts.iter().find(|p| p.slug == "learning-rust").unwrap();
        assert_eq!(rust.author.as_deref(), Some("Ferris"));
        assert!(rust.created_at.is_none());
    }

    #[tokio::test]
    async fn test_section_filter() {
        let api = client().await;
        let banner = api.list_blogs(&BlogFilter::section(Section::Banner)).await.unwrap();
        assert!(banner.is_empty());
    }

    #[tokio::test]
    async fn test_get_blog() {
        let api = client().await;
        let post = api.get_blog("post-3").await.unwrap().unwrap();
        assert_eq!(post.title, "Story number 3");
        assert_eq!(post.id, "post-3");
        assert!(api.get_blog("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_comments() {
        let api = client().await;
        let comments = api.list_comments("post-rust").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].name, "Ana");
        assert!(api.list_comments("post-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping() {
        let api = client().await;
        assert!(api.ping().await.is_ok());
    }
}
