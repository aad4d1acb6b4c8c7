use super::{lenient_id, parse_timestamp, CategoryRef, RawCategoryRef};
use crate::services::html;
use crate::services::slug::encode_segment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical post record. Every listing, card and page renders from this
/// shape; alias handling lives only in [`RawPost::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub category: Option<CategoryRef>,
    pub body_html: Option<String>,
    /// Body with tags stripped and whitespace collapsed, used for search.
    #[serde(skip)]
    pub plain_text: String,
    pub image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub schema_markup: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Milliseconds since the epoch; missing timestamps count as zero.
    pub fn timestamp(&self) -> i64 {
        self.created_at
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }

    pub fn category_slug(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.slug.as_str())
    }

    pub fn href(&self) -> String {
        if self.slug.is_empty() {
            "#".to_string()
        } else {
            format!("/blog/{}", encode_segment(&self.slug))
        }
    }
}

/// View model handed to card templates.
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub slug: String,
    pub href: String,
    pub title: String,
    pub author: Option<String>,
    pub category: Option<CategoryRef>,
    pub image: Option<String>,
    pub excerpt: String,
    pub reading_time: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl PostCard {
    pub fn new(post: &Post, excerpt_len: usize, default_image: Option<&str>) -> Self {
        Self {
            slug: post.slug.clone(),
            href: post.href(),
            title: post.title.clone(),
            author: post.author.clone(),
            category: post.category.clone(),
            image: post
                .image
                .clone()
                .or_else(|| default_image.map(str::to_string)),
            excerpt: html::truncate_chars(&post.plain_text, excerpt_len),
            reading_time: html::reading_time(&post.plain_text),
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawImage {
    Url(String),
    Object {
        #[serde(default)]
        url: Option<String>,
    },
}

impl RawImage {
    fn into_url(self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url),
            Self::Object { url } => url,
        }
    }
}

/// Post record as the API (and older demo data) sends it. Aliases are
/// separate fields rather than serde aliases so a record carrying both
/// spellings still decodes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPost {
    #[serde(rename = "_id", default)]
    pub mongo_id: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub posted_by: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub main_image: Option<RawImage>,
    #[serde(default)]
    pub img_src: Option<String>,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub category: Option<RawCategoryRef>,
    #[serde(default)]
    pub content_html: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub schema_markup: Option<String>,
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub date: Option<serde_json::Value>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawPost {
    pub fn normalize(self) -> Post {
        let body_html = non_blank(self.content_html).or_else(|| non_blank(self.content));
        let plain_text = body_html.as_deref().map(html::strip_html).unwrap_or_default();
        let image = self
            .main_image
            .and_then(RawImage::into_url)
            .filter(|u| !u.trim().is_empty())
            .or_else(|| non_blank(self.img_src))
            .or_else(|| {
                self.image
                    .and_then(RawImage::into_url)
                    .filter(|u| !u.trim().is_empty())
            });
        let created_at = self
            .created_at
            .as_ref()
            .and_then(parse_timestamp)
            .or_else(|| self.date.as_ref().and_then(parse_timestamp));
        let id = lenient_id(self.mongo_id.as_ref().or(self.id.as_ref()));
        let slug = self.slug.map(|s| s.trim().to_string()).unwrap_or_default();

        Post {
            id,
            slug,
            title: self.title.unwrap_or_default(),
            author: non_blank(self.posted_by).or_else(|| non_blank(self.author)),
            category: self.category.and_then(RawCategoryRef::normalize),
            body_html,
            plain_text,
            image,
            meta_title: non_blank(self.meta_title),
            meta_description: non_blank(self.meta_description),
            schema_markup: non_blank(self.schema_markup),
            created_at,
        }
    }
}
