//! Client for the external blog REST API. This is the only place raw
//! response shapes are seen; everything it returns is normalized.

use crate::config::ApiConfig;
use crate::models::{
    Category, Comment, ContactMessage, NewComment, Post, RawCategory, RawComment, RawPost,
};
use crate::services::cache::TtlCache;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

const USER_AGENT: &str = concat!("blogfront/", env!("CARGO_PKG_VERSION"));
/// Upper bound the single-post page uses when looking for related posts.
pub const RELATED_FETCH_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("API {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Curated home page sections the API can filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Banner,
    TopNew,
    LatestPosts,
    Highlights,
    EditorsPick,
    MostPopular,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::TopNew => "top_new",
            Self::LatestPosts => "latest_posts",
            Self::Highlights => "highlights",
            Self::EditorsPick => "editors_pick",
            Self::MostPopular => "most_popular",
        }
    }

    pub fn default_limit(&self) -> usize {
        match self {
            Self::Banner => 6,
            Self::TopNew => 12,
            Self::LatestPosts => 6,
            Self::Highlights => 18,
            Self::EditorsPick => 4,
            Self::MostPopular => 10,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogFilter {
    pub section: Option<Section>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl BlogFilter {
    pub fn section(section: Section) -> Self {
        Self {
            section: Some(section),
            category: None,
            limit: Some(section.default_limit()),
        }
    }

    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(section) = self.section {
            pairs.push(("section", section.as_str().to_string()));
        }
        if let Some(ref category) = self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: TtlCache<Value>,
    comment_id_param: String,
    contact_path: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| ApiError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
            comment_id_param: config.comment_id_param.clone(),
            contact_path: config.contact_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn blog_url(&self, slug: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("/api/blogs", &[])?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(slug);
        Ok(url)
    }

    async fn fetch(&self, url: &Url) -> Result<Option<Value>, ApiError> {
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await.map_err(|source| ApiError::Http {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let value = serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// GET with the response cache in front. 404 is `Ok(None)`.
    async fn get_cached(&self, url: &Url) -> Result<Option<Value>, ApiError> {
        if let Some(hit) = self.cache.get(url.as_str()) {
            return Ok(Some(hit));
        }
        let value = self.fetch(url).await?;
        if let Some(ref v) = value {
            self.cache.insert(url.as_str(), v.clone());
        }
        Ok(value)
    }

    async fn get_list(&self, url: &Url) -> Result<Vec<Value>, ApiError> {
        match self.get_cached(url).await? {
            Some(value) => Ok(into_records(value)),
            None => Err(ApiError::Status {
                url: url.to_string(),
                status: 404,
                body: String::new(),
            }),
        }
    }

    pub async fn list_blogs(&self, filter: &BlogFilter) -> Result<Vec<Post>, ApiError> {
        let url = self.endpoint("/api/blogs", &filter.query_pairs())?;
        let records = self.get_list(&url).await?;
        Ok(decode_each::<RawPost>(records)
            .map(RawPost::normalize)
            .collect())
    }

    /// The whole collection, as the listing pages need it.
    pub async fn all_blogs(&self) -> Result<Vec<Post>, ApiError> {
        self.list_blogs(&BlogFilter::default()).await
    }

    pub async fn get_blog(&self, slug: &str) -> Result<Option<Post>, ApiError> {
        let url = self.blog_url(slug)?;
        let Some(value) = self.get_cached(&url).await? else {
            return Ok(None);
        };
        // Some backends wrap single records the same way as lists.
        let value = match value {
            Value::Object(mut map) if map.contains_key("data") && !map.contains_key("slug") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        if !value.is_object() {
            return Ok(None);
        }
        let raw: RawPost = serde_json::from_value(value).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(Some(raw.normalize()))
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = self.endpoint("/api/categories", &[])?;
        let records = self.get_list(&url).await?;
        Ok(decode_each::<RawCategory>(records)
            .filter_map(RawCategory::normalize)
            .collect())
    }

    /// Comments are never cached so a fresh submission shows up at once.
    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        let url = self.endpoint(
            "/api/comments",
            &[(self.comment_id_param.as_str(), post_id.to_string())],
        )?;
        let records = match self.fetch(&url).await? {
            Some(value) => into_records(value),
            None => Vec::new(),
        };
        Ok(decode_each::<RawComment>(records)
            .map(RawComment::normalize)
            .collect())
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<(), ApiError> {
        let url = self.endpoint("/api/comments", &[])?;
        let mut body = serde_json::Map::new();
        body.insert(
            self.comment_id_param.clone(),
            Value::String(comment.post_id.clone()),
        );
        body.insert("name".into(), Value::String(comment.name.clone()));
        body.insert("email".into(), Value::String(comment.email.clone()));
        body.insert("message".into(), Value::String(comment.message.clone()));
        self.post_json(&url, &Value::Object(body)).await
    }

    pub async fn send_contact(&self, message: &ContactMessage) -> Result<(), ApiError> {
        let url = self.endpoint(&self.contact_path, &[])?;
        let body = serde_json::to_value(message).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;
        self.post_json(&url, &body).await
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<(), ApiError> {
        tracing::debug!("POST {}", url);
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// Round-trip time of an uncached categories request.
    pub async fn ping(&self) -> Result<Duration, ApiError> {
        let url = self.endpoint("/api/categories", &[])?;
        let start = Instant::now();
        self.fetch(&url).await?;
        Ok(start.elapsed())
    }
}

/// Accepts a bare array or an envelope (`data`, `items`, `results`).
fn into_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["data", "items", "results"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            tracing::warn!("API response object has no record array");
            Vec::new()
        }
        _ => {
            tracing::warn!("API response is not a list");
            Vec::new()
        }
    }
}

/// Decodes records one at a time so a single malformed record is skipped
/// instead of failing the whole list.
fn decode_each<T: DeserializeOwned>(records: Vec<Value>) -> impl Iterator<Item = T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<T>(record) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!("Skipping malformed API record: {}", e);
                None
            }
        })
}
