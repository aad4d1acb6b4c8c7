use ammonia::Builder;
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex pattern"));
static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex pattern"));

const WORDS_PER_MINUTE: f64 = 200.0;

/// Replaces every tag with a space and collapses whitespace runs.
/// Not a sanitizer: entities and script bodies are left as text.
pub fn strip_html(html: &str) -> String {
    let text = TAG_REGEX.replace_all(html, " ");
    WHITESPACE_REGEX.replace_all(&text, " ").trim().to_string()
}

/// Cuts `text` to at most `max_chars` characters, appending `…` when it
/// was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}…", truncated.trim_end())
}

/// Estimated reading time in minutes, minimum 1.
pub fn reading_time(text: &str) -> u32 {
    let word_count = text.split_whitespace().count();
    ((word_count as f64 / WORDS_PER_MINUTE).ceil() as u32).max(1)
}

pub struct HtmlSanitizer {
    sanitizer: Builder<'static>,
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let mut tags = Builder::default().clone_tags();
        tags.insert("figure");
        tags.insert("figcaption");
        tags.insert("picture");
        tags.insert("source");
        tags.insert("video");
        tags.insert("iframe");

        let mut attrs = Builder::default().clone_tag_attributes();
        attrs.insert(
            "img",
            ["src", "alt", "title", "width", "height", "loading"]
                .iter()
                .cloned()
                .collect(),
        );
        attrs.insert(
            "source",
            ["src", "srcset", "type", "media"].iter().cloned().collect(),
        );
        attrs.insert(
            "video",
            ["src", "controls", "poster", "width", "height"]
                .iter()
                .cloned()
                .collect(),
        );
        attrs.insert(
            "iframe",
            ["src", "width", "height", "title", "allowfullscreen"]
                .iter()
                .cloned()
                .collect(),
        );

        let mut sanitizer = Builder::default();
        sanitizer
            .tags(tags)
            .tag_attributes(attrs)
            .link_rel(Some("noopener noreferrer"));

        Self { sanitizer }
    }

    pub fn clean(&self, html: &str) -> String {
        self.sanitizer.clean(html).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_collapses_whitespace() {
        let html = "<p>Hello\n\n  <strong>world</strong></p><p>again</p>";
        assert_eq!(strip_html(html), "Hello world again");
    }

    #[test]
    fn test_truncate_chars_counts_chars() {
        let text = strip_html("<p>ééééé ééééé</p>");
        assert_eq!(truncate_chars(&text, 5), "ééééé…");
        assert_eq!(truncate_chars(&text, 50), "ééééé ééééé");
    }

    #[test]
    fn test_reading_time_minimum() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(401)), 3);
    }

    #[test]
    fn test_sanitizer_drops_scripts() {
        let sanitizer = HtmlSanitizer::new();
        let clean = sanitizer.clean("<p>ok</p><script>alert(1)</script>");
        assert!(clean.contains("<p>ok</p>"));
        assert!(!clean.contains("script"));
    }
}
