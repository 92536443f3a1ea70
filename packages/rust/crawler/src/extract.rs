//! Title and contact-address extraction from company pages.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// Generic address pattern, matched against the raw page source.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email regex")
});

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

/// Asset names like `logo@2x.png` match the address pattern but are not mail.
const ASSET_SUFFIXES: [&str; 6] = [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"];

/// Extract the trimmed `<title>` text. Empty titles count as missing.
pub fn extract_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SEL)
        .next()
        .map(|el| {
            el.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
}

/// Find every address in `text`, lower-cased, deduplicated and sorted.
pub fn extract_emails(text: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|email| !ASSET_SUFFIXES.iter().any(|ext| email.ends_with(ext)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_collapsed() {
        let doc = Html::parse_document(
            "<html><head><title>\n  Acme  |\n Automation </title></head></html>",
        );
        assert_eq!(extract_title(&doc).as_deref(), Some("Acme | Automation"));
    }

    #[test]
    fn missing_or_blank_title() {
        let doc = Html::parse_document("<html><body><h1>No title</h1></body></html>");
        assert_eq!(extract_title(&doc), None);

        let doc = Html::parse_document("<html><head><title>   </title></head></html>");
        assert_eq!(extract_title(&doc), None);
    }

    #[test]
    fn emails_are_normalized() {
        let text = r#"
            Contact Sales@Acme.io or support@acme.io.
            <a href="mailto:sales@acme.io">mail</a>
            <img src="/img/logo@2x.png">
            hello@sub.acme.co.uk
        "#;
        assert_eq!(
            extract_emails(text),
            vec!["hello@sub.acme.co.uk", "sales@acme.io", "support@acme.io"]
        );
    }

    #[test]
    fn no_emails() {
        assert!(extract_emails("call us at 555-0100, or write to @acme").is_empty());
    }
}
