use crate::services::api::ApiClient;
use crate::services::html::HtmlSanitizer;
use crate::web::security::{CsrfManager, RateLimiter};
use crate::Config;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tera::{Tera, Value};

/// Comment and contact submissions allowed per client per window.
const FORM_MAX_SUBMISSIONS: usize = 5;
const FORM_WINDOW: Duration = Duration::from_secs(600);

pub struct AppState {
    pub config: Config,
    pub api: ApiClient,
    pub templates: Tera,
    pub sanitizer: HtmlSanitizer,
    pub csrf: Arc<CsrfManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(&config.api)?;

        let mut templates = Tera::default();

        templates.register_filter("format_date", format_date_filter);
        templates.register_filter("truncate_str", truncate_str_filter);
        templates.add_raw_templates(vec![
            ("base.html", include_str!("../../templates/base.html")),
            ("partials/card.html", include_str!("../../templates/partials/card.html")),
            ("partials/pagination.html", include_str!("../../templates/partials/pagination.html")),
            ("partials/sidebar.html", include_str!("../../templates/partials/sidebar.html")),
            ("public/index.html", include_str!("../../templates/public/index.html")),
            ("public/list.html", include_str!("../../templates/public/list.html")),
            ("public/post.html", include_str!("../../templates/public/post.html")),
            ("public/categories.html", include_str!("../../templates/public/categories.html")),
            ("public/contact.html", include_str!("../../templates/public/contact.html")),
            ("public/404.html", include_str!("../../templates/public/404.html")),
        ])?;

        Ok(Self {
            config,
            api,
            templates,
            sanitizer: HtmlSanitizer::new(),
            csrf: Arc::new(CsrfManager::default()),
            rate_limiter: Arc::new(RateLimiter::new(FORM_MAX_SUBMISSIONS, FORM_WINDOW)),
        })
    }
}

fn format_date_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    // Posts without a timestamp render no date.
    if value.is_null() {
        return Ok(Value::String(String::new()));
    }

    let date_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format_date requires a string"))?;

    let format = args
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("%d %b %Y");

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date_str) {
        return Ok(Value::String(dt.format(format).to_string()));
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Value::String(dt.format(format).to_string()));
    }

    Ok(Value::String(date_str.to_string()))
}

fn truncate_str_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("truncate_str requires a string"))?;
    let len = args.get("len").and_then(|v| v.as_u64()).unwrap_or(16) as usize;
    Ok(Value::String(crate::services::html::truncate_chars(s, len)))
}
