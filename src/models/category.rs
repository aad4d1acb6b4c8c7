use super::lenient_id;
use crate::services::slug::{generate_slug, humanize_slug};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub post_count: Option<u64>,
}

/// Category as embedded in a post record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub name: String,
    pub slug: String,
}

impl CategoryRef {
    /// Fills whichever of name/slug is missing from the other.
    /// Returns `None` when both are blank.
    pub fn from_parts(name: Option<String>, slug: Option<String>) -> Option<Self> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let slug = slug.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (name, slug) {
            (Some(name), Some(slug)) => Some(Self { name, slug }),
            (Some(name), None) => Some(Self {
                slug: generate_slug(&name),
                name,
            }),
            (None, Some(slug)) => Some(Self {
                name: humanize_slug(&slug),
                slug,
            }),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategory {
    #[serde(rename = "_id", default)]
    pub mongo_id: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub post_count: Option<u64>,
}

impl RawCategory {
    pub fn normalize(self) -> Option<Category> {
        let id = lenient_id(self.mongo_id.as_ref().or(self.id.as_ref()));
        let parts = CategoryRef::from_parts(self.name, self.slug)?;
        Some(Category {
            id,
            name: parts.name,
            slug: parts.slug,
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            post_count: self.post_count,
        })
    }
}

/// Post records carry their category either as a bare name or as an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawCategoryRef {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        slug: Option<String>,
    },
}

impl RawCategoryRef {
    pub fn normalize(self) -> Option<CategoryRef> {
        match self {
            Self::Name(name) => CategoryRef::from_parts(Some(name), None),
            Self::Object { name, slug } => CategoryRef::from_parts(name, slug),
        }
    }
}
