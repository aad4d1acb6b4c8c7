use crate::services::api::ApiClient;
use crate::services::slug::validate_slug;
use crate::Config;
use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug)]
enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "\x1b[32m✓ OK\x1b[0m"),
            CheckStatus::Warn => write!(f, "\x1b[33m⚠ WARN\x1b[0m"),
            CheckStatus::Fail => write!(f, "\x1b[31m✗ FAIL\x1b[0m"),
        }
    }
}

struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

pub async fn run(config_path: &Path) -> Result<()> {
    println!("\n  blogfront check\n");

    let mut results: Vec<CheckResult> = Vec::new();

    let config = match Config::load(config_path) {
        Ok(c) => {
            results.push(CheckResult::new(
                "Configuration",
                CheckStatus::Ok,
                format!("Loaded from {}", config_path.display()),
            ));
            c
        }
        Err(e) => {
            results.push(CheckResult::new(
                "Configuration",
                CheckStatus::Fail,
                format!("Failed to load: {}", e),
            ));
            return finish(&results);
        }
    };

    let api = match ApiClient::new(&config.api) {
        Ok(api) => api,
        Err(e) => {
            results.push(CheckResult::new("API client", CheckStatus::Fail, e.to_string()));
            return finish(&results);
        }
    };

    match api.ping().await {
        Ok(elapsed) => results.push(CheckResult::new(
            "API reachability",
            CheckStatus::Ok,
            format!("{} answered in {} ms", api.base_url(), elapsed.as_millis()),
        )),
        Err(e) => {
            results.push(CheckResult::new(
                "API reachability",
                CheckStatus::Fail,
                e.to_string(),
            ));
            return finish(&results);
        }
    }

    match api.list_categories().await {
        Ok(categories) if categories.is_empty() => results.push(CheckResult::new(
            "Categories",
            CheckStatus::Warn,
            "API returned no categories",
        )),
        Ok(categories) => results.push(CheckResult::new(
            "Categories",
            CheckStatus::Ok,
            format!("{} categories", categories.len()),
        )),
        Err(e) => results.push(CheckResult::new("Categories", CheckStatus::Fail, e.to_string())),
    }

    match api.all_blogs().await {
        Ok(posts) => {
            results.push(CheckResult::new(
                "Posts",
                if posts.is_empty() {
                    CheckStatus::Warn
                } else {
                    CheckStatus::Ok
                },
                format!("{} posts", posts.len()),
            ));

            let mut seen = HashSet::new();
            let duplicates = posts
                .iter()
                .filter(|p| !p.slug.is_empty() && !seen.insert(p.slug.as_str()))
                .count();
            let unsafe_slugs = posts.iter().filter(|p| !validate_slug(&p.slug)).count();
            let undated = posts.iter().filter(|p| p.created_at.is_none()).count();

            results.push(if duplicates == 0 && unsafe_slugs == 0 {
                CheckResult::new("Post slugs", CheckStatus::Ok, "unique and URL-safe")
            } else {
                CheckResult::new(
                    "Post slugs",
                    CheckStatus::Warn,
                    format!("{} duplicate, {} not URL-safe", duplicates, unsafe_slugs),
                )
            });
            if undated > 0 {
                results.push(CheckResult::new(
                    "Post dates",
                    CheckStatus::Warn,
                    format!("{} post(s) without a valid createdAt sort last", undated),
                ));
            }
        }
        Err(e) => results.push(CheckResult::new("Posts", CheckStatus::Fail, e.to_string())),
    }

    finish(&results)
}

fn finish(results: &[CheckResult]) -> Result<()> {
    print_results(results);
    if results.iter().any(|r| matches!(r.status, CheckStatus::Fail)) {
        println!("\n  \x1b[31mSome checks failed. Fix the issues above before serving.\x1b[0m\n");
        anyhow::bail!("check failed");
    }
    println!("\n  \x1b[32mAll checks passed.\x1b[0m\n");
    Ok(())
}

fn print_results(results: &[CheckResult]) {
    let max_name = results.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for r in results {
        println!(
            "  {:width$}  {}  {}",
            r.name,
            r.status,
            r.detail,
            width = max_name
        );
    }
}
