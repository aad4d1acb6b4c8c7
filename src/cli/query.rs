use crate::services::api::ApiClient;
use crate::services::query::{self, ListQuery};
use crate::Config;
use anyhow::Result;
use std::path::Path;

pub struct QueryArgs {
    pub term: String,
    pub category: Option<String>,
    pub page: usize,
    pub per_page: Option<usize>,
    pub json: bool,
}

pub async fn run(config_path: &Path, args: QueryArgs) -> Result<()> {
    let config = Config::load(config_path)?;
    let api = ApiClient::new(&config.api)?;
    let posts = api.all_blogs().await?;

    let per_page = args.per_page.unwrap_or(config.listing.posts_per_page);
    let mut list_query = ListQuery::new(per_page).term(args.term).page(args.page);
    if let Some(category) = args.category {
        list_query = list_query.category(category);
    }

    let result = query::apply(&posts, &list_query);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "\n  {} matching post(s), page {} of {}\n",
        result.total, result.page, result.total_pages
    );
    let slug_width = result
        .items
        .iter()
        .map(|p| p.slug.len())
        .max()
        .unwrap_or(0)
        .max(4);
    for post in &result.items {
        let date = post
            .created_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!(
            "  {}  {:width$}  {}",
            date,
            post.slug,
            post.title,
            width = slug_width
        );
    }
    if result.is_empty() {
        println!("  No articles found.");
    }
    println!();

    Ok(())
}
