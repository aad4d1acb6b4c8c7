use super::{csrf_token, make_context, nav_categories, render_not_found};
use crate::models::Category;
use crate::services::forms::{CommentForm, ContactForm};
use crate::web::error::AppResult;
use crate::web::extractors::{ClientKey, CsrfCookie};
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::CookieJar;
use std::sync::Arc;

fn invalid_token() -> Response {
    (StatusCode::FORBIDDEN, "Invalid or missing form token").into_response()
}

fn back_to_comments(href: &str, status: &str) -> Response {
    Redirect::to(&format!("{}?comment={}#comments", href, status)).into_response()
}

pub async fn submit_comment(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    ClientKey(client): ClientKey,
    CsrfCookie(cookie): CsrfCookie,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    if !state
        .csrf
        .validate(&form.csrf_token, cookie.as_deref().unwrap_or_default())
    {
        return Ok(invalid_token());
    }

    let Some(post) = state.api.get_blog(&slug).await? else {
        let categories = nav_categories(&state).await;
        return render_not_found(&state, &categories);
    };
    let href = post.href();

    if !state.rate_limiter.check(&client) {
        tracing::warn!("Comment rate limit hit for {}", client);
        return Ok(back_to_comments(&href, "limited"));
    }

    let comment = match form.validate(&post.id) {
        Ok(comment) => comment,
        Err(e) => {
            tracing::debug!("Rejected comment on {}: {}", post.slug, e);
            return Ok(back_to_comments(&href, "invalid"));
        }
    };
    if comment.post_id.is_empty() {
        tracing::warn!("Post {} has no id; cannot attach comment", post.slug);
        return Ok(back_to_comments(&href, "failed"));
    }

    state.rate_limiter.record_attempt(&client);
    match state.api.create_comment(&comment).await {
        Ok(()) => {
            tracing::info!("Comment posted on {}", post.slug);
            Ok(back_to_comments(&href, "sent"))
        }
        Err(e) => {
            tracing::error!("Comment submission failed for {}: {}", post.slug, e);
            Ok(back_to_comments(&href, "failed"))
        }
    }
}

fn render_contact(
    state: &AppState,
    categories: &[Category],
    token: &str,
    form: &ContactForm,
    flash: Option<(&str, String)>,
) -> AppResult<String> {
    let mut ctx = make_context(state, categories);
    ctx.insert("contact", &state.config.contact);
    ctx.insert("form", form);
    ctx.insert("csrf_token", token);
    if let Some((kind, message)) = flash {
        ctx.insert("flash_kind", kind);
        ctx.insert("flash", &message);
    }
    Ok(state.templates.render("public/contact.html", &ctx)?)
}

pub async fn contact(
    State(state): State<Arc<AppState>>,
    CsrfCookie(cookie): CsrfCookie,
    jar: CookieJar,
) -> AppResult<Response> {
    let categories = nav_categories(&state).await;
    let (jar, token) = csrf_token(&state, cookie, jar);
    let html = render_contact(&state, &categories, &token, &ContactForm::default(), None)?;
    Ok((jar, Html(html)).into_response())
}

pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    CsrfCookie(cookie): CsrfCookie,
    Form(form): Form<ContactForm>,
) -> AppResult<Response> {
    let Some(token) = cookie.filter(|c| state.csrf.validate(&form.csrf_token, c)) else {
        return Ok(invalid_token());
    };
    let categories = nav_categories(&state).await;

    if !state.rate_limiter.check(&client) {
        tracing::warn!("Contact rate limit hit for {}", client);
        let flash = (
            "error",
            "You have sent several messages recently. Please try again later.".to_string(),
        );
        let html = render_contact(&state, &categories, &token, &form, Some(flash))?;
        return Ok((StatusCode::TOO_MANY_REQUESTS, Html(html)).into_response());
    }

    let message = match form.validate() {
        Ok(message) => message,
        Err(e) => {
            let flash = ("error", format!("Please check the form: {}.", e));
            let html = render_contact(&state, &categories, &token, &form, Some(flash))?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response());
        }
    };

    state.rate_limiter.record_attempt(&client);
    match state.api.send_contact(&message).await {
        Ok(()) => {
            tracing::info!("Contact message forwarded");
            let flash = (
                "success",
                "Thanks for reaching out! We will get back to you soon.".to_string(),
            );
            let html =
                render_contact(&state, &categories, &token, &ContactForm::default(), Some(flash))?;
            Ok(Html(html).into_response())
        }
        Err(e) => {
            tracing::error!("Contact submission failed: {}", e);
            let flash = (
                "error",
                "Your message could not be sent. Please try again later.".to_string(),
            );
            let html = render_contact(&state, &categories, &token, &form, Some(flash))?;
            Ok((StatusCode::BAD_GATEWAY, Html(html)).into_response())
        }
    }
}
