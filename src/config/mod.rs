use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overrides `api.base_url` when set.
pub const API_BASE_ENV: &str = "BLOGFRONT_API_BASE";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub contact: ContactConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Key form rate limits on `X-Forwarded-For`. Only enable behind a
    /// reverse proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_forwarded_for: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds a GET response stays cached (0 disables the cache)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Query/body key the comments endpoint uses for the post id
    #[serde(default = "default_comment_id_param")]
    pub comment_id_param: String,
    #[serde(default = "default_contact_path")]
    pub contact_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
    #[serde(default = "default_excerpt_length")]
    pub excerpt_length: usize,
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
    #[serde(default)]
    pub default_image: Option<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
            excerpt_length: default_excerpt_length(),
            related_limit: default_related_limit(),
            default_image: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContactConfig {
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub info: Vec<String>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_comment_id_param() -> String {
    "eventId".to_string()
}

fn default_contact_path() -> String {
    "/api/contact".to_string()
}

fn default_posts_per_page() -> usize {
    4
}

fn default_excerpt_length() -> usize {
    220
}

fn default_related_limit() -> usize {
    4
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Pass --config or create blogfront.toml",
                path.display(),
                e
            )
        })?;
        let mut config = Self::parse(&content)?;
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                tracing::debug!("Using {} = {}", API_BASE_ENV, base);
                config.api.base_url = base.trim().to_string();
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listing.posts_per_page == 0 {
            anyhow::bail!("listing.posts_per_page must be greater than 0");
        }
        if self.listing.posts_per_page > 100 {
            anyhow::bail!("listing.posts_per_page must be 100 or less");
        }
        if self.listing.excerpt_length == 0 {
            anyhow::bail!("listing.excerpt_length must be greater than 0");
        }
        if self.listing.excerpt_length > 10000 {
            anyhow::bail!("listing.excerpt_length must be 10000 or less");
        }
        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be greater than 0");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }
        if !self.api.contact_path.starts_with('/') {
            anyhow::bail!("api.contact_path must start with '/'");
        }
        let base = url::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("api.base_url '{}' is invalid: {}", self.api.base_url, e))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("api.base_url must be an http or https URL");
        }
        Ok(())
    }
}
