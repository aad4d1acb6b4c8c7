//! Filtering, ordering and pagination over a post collection fetched
//! wholesale from the API. Every listing page goes through [`apply`].

use crate::models::{Category, Post};
use serde::Serialize;
use std::collections::HashMap;

/// Pages shown either side of the current one in the pagination widget.
const PAGE_WINDOW: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub term: String,
    pub category: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

impl ListQuery {
    pub fn new(per_page: usize) -> Self {
        Self {
            term: String::new(),
            category: None,
            page: 1,
            per_page,
        }
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn category(mut self, slug: impl Into<String>) -> Self {
        self.category = Some(slug.into());
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Builds a query from raw request parameters. A missing or non-numeric
    /// page is page 1.
    pub fn from_params(term: Option<&str>, page: Option<&str>, per_page: usize) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1);
        Self::new(per_page).term(term.unwrap_or_default()).page(page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
    /// Page numbers to link in the pagination widget.
    pub pages: Vec<usize>,
}

impl<T> ListPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListPage<U> {
        ListPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            has_prev: self.has_prev,
            has_next: self.has_next,
            prev_page: self.prev_page,
            next_page: self.next_page,
            pages: self.pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Slices `items` to the requested page, clamping the page into
/// `[1, total_pages]`. An empty input yields one empty page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> ListPage<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;

    let items: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    ListPage {
        items,
        total,
        page,
        per_page,
        total_pages,
        has_prev: page > 1,
        has_next: page < total_pages,
        prev_page: (page > 1).then(|| page - 1),
        next_page: (page < total_pages).then(|| page + 1),
        pages: page_window(page, total_pages),
    }
}

fn page_window(page: usize, total_pages: usize) -> Vec<usize> {
    let span = PAGE_WINDOW * 2 + 1;
    if total_pages <= span {
        return (1..=total_pages).collect();
    }
    let start = page.saturating_sub(PAGE_WINDOW).max(1);
    let start = start.min(total_pages + 1 - span);
    (start..start + span).collect()
}

fn matches_category(post: &Post, category: Option<&str>) -> bool {
    match category {
        None => true,
        Some(slug) => post.category_slug() == Some(slug),
    }
}

fn matches_term(post: &Post, term: &str) -> bool {
    term.is_empty()
        || post.title.to_lowercase().contains(term)
        || post.plain_text.to_lowercase().contains(term)
}

/// Filters by category and search term, orders newest first, then
/// paginates. Never fails: posts without a timestamp sort as the epoch.
pub fn apply(all_posts: &[Post], query: &ListQuery) -> ListPage<Post> {
    let term = query.term.to_lowercase();
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let mut matched: Vec<&Post> = all_posts
        .iter()
        .filter(|post| matches_category(post, category))
        .filter(|post| matches_term(post, &term))
        .collect();

    // Stable, so equal timestamps keep API order.
    matched.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));

    paginate(matched, query.page, query.per_page).map(Post::clone)
}

/// Posts sharing the current post's category (by slug or by name), in API
/// order, excluding the current post.
pub fn related<'a>(all_posts: &'a [Post], current: &Post, limit: usize) -> Vec<&'a Post> {
    let Some(category) = current.category.as_ref() else {
        return Vec::new();
    };

    all_posts
        .iter()
        .filter(|post| post.slug != current.slug)
        .filter(|post| {
            post.category
                .as_ref()
                .is_some_and(|c| c.slug == category.slug || c.name == category.name)
        })
        .take(limit)
        .collect()
}

pub fn count_by_category(all_posts: &[Post]) -> HashMap<&str, u64> {
    let mut counts = HashMap::new();
    for slug in all_posts.iter().filter_map(Post::category_slug) {
        *counts.entry(slug).or_insert(0) += 1;
    }
    counts
}

/// Fills in `post_count` where the API did not provide one.
pub fn with_post_counts(categories: Vec<Category>, all_posts: &[Post]) -> Vec<Category> {
    let counts = count_by_category(all_posts);
    categories
        .into_iter()
        .map(|mut category| {
            if category.post_count.is_none() {
                category.post_count =
                    Some(counts.get(category.slug.as_str()).copied().unwrap_or(0));
            }
            category
        })
        .collect()
}
