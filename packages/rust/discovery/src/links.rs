//! Outbound link harvesting from directory pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Absolute http(s) URLs embedded anywhere in page source (scripts, JSON, attributes).
static SOURCE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(?:/[^\s"'<>]*)?"#).expect("source URL regex")
});

// ---------------------------------------------------------------------------
// DomainFilter
// ---------------------------------------------------------------------------

/// Decides whether an outbound URL can be a company site.
#[derive(Debug, Clone)]
pub struct DomainFilter {
    directory_host: String,
    skip: Vec<String>,
}

impl DomainFilter {
    pub fn new(directory_host: &str, skip: &[String]) -> Self {
        Self {
            directory_host: normalize_host(directory_host),
            skip: skip.iter().map(|d| normalize_host(d)).collect(),
        }
    }

    /// A copy of this filter that also skips `extra`.
    pub fn with_extra(&self, extra: &[String]) -> Self {
        let mut filter = self.clone();
        filter.skip.extend(extra.iter().map(|d| normalize_host(d)));
        filter
    }

    /// http(s), has a dotted host, and is neither the directory itself nor
    /// a skip-listed domain (or any subdomain of one).
    pub fn accepts(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        let Some(host) = url.host_str().map(normalize_host) else {
            return false;
        };
        if !host.contains('.') {
            return false;
        }
        if host_matches(&host, &self.directory_host) {
            return false;
        }
        !self.skip.iter().any(|domain| host_matches(&host, domain))
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_start_matches("www.").to_lowercase()
}

/// `host` is `domain` or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

// ---------------------------------------------------------------------------
// UrlSet
// ---------------------------------------------------------------------------

/// Insertion-ordered, deduplicated, capped URL collection.
#[derive(Debug)]
pub struct UrlSet {
    seen: HashSet<String>,
    urls: Vec<String>,
    cap: usize,
}

impl UrlSet {
    pub fn new(cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            urls: Vec::new(),
            cap,
        }
    }

    /// Add `url`; returns `false` when it was a duplicate or the set is full.
    pub fn insert(&mut self, url: String) -> bool {
        if self.is_full() || self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.urls.push(url);
        true
    }

    pub fn is_full(&self) -> bool {
        self.urls.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Count `<a>` elements in an HTML page.
pub fn count_anchors(html: &str) -> usize {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a").expect("anchor selector");
    doc.select(&sel).count()
}

/// Every accepted `a[href]` target, resolved against `base`, in document order.
pub fn anchor_urls(html: &str, base: &Url, filter: &DomainFilter) -> Vec<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").expect("anchor selector");

    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            !href.is_empty()
                && !href.starts_with('#')
                && !href.starts_with("javascript:")
                && !href.starts_with("mailto:")
        })
        .filter_map(|href| base.join(href).ok())
        .filter(|url| filter.accepts(url))
        .map(String::from)
        .collect()
}

/// Absolute URLs found by scanning the raw page source.
pub fn scan_source_urls(html: &str, filter: &DomainFilter) -> Vec<String> {
    SOURCE_URL_RE
        .find_iter(html)
        .filter_map(|m| Url::parse(m.as_str()).ok())
        .filter(|url| filter.accepts(url))
        .map(String::from)
        .collect()
}

/// Strip query string and fragment, keeping scheme, host, port and path.
pub fn clean_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> DomainFilter {
        DomainFilter::new(
            "theresanaiforthat.com",
            &["github.com".to_string(), "google.com".to_string()],
        )
    }

    #[test]
    fn filter_rejects_directory_and_skip_domains() {
        let f = filter();
        let accepts = |u: &str| f.accepts(&Url::parse(u).unwrap());

        assert!(accepts("https://acme.io/"));
        assert!(accepts("https://notgoogle.com/"));
        assert!(!accepts("https://theresanaiforthat.com/ai/acme/"));
        assert!(!accepts("https://www.theresanaiforthat.com/"));
        assert!(!accepts("https://cdn.theresanaiforthat.com/logo.png"));
        assert!(!accepts("https://github.com/acme"));
        assert!(!accepts("https://play.google.com/store"));
        assert!(!accepts("ftp://acme.io/"));
    }

    #[test]
    fn extra_skip_domains_apply_only_to_the_copy() {
        let base = filter();
        let strict = base.with_extra(&["w3.org".to_string()]);
        let w3 = Url::parse("http://www.w3.org/2000/svg").unwrap();
        assert!(base.accepts(&w3));
        assert!(!strict.accepts(&w3));
    }

    #[test]
    fn anchors_are_resolved_and_filtered() {
        let html = r##"<html><body>
            <a href="/ai/acme/">internal</a>
            <a href="https://acme.io/?ref=taaft">Acme</a>
            <a href="https://github.com/acme">GitHub</a>
            <a href="#top">top</a>
            <a href="mailto:hi@acme.io">mail</a>
            <a href="https://globex.com/pricing">Globex</a>
        </body></html>"##;
        let base = Url::parse("https://theresanaiforthat.com/s/automation/").unwrap();

        let urls = anchor_urls(html, &base, &filter());
        assert_eq!(
            urls,
            vec!["https://acme.io/?ref=taaft", "https://globex.com/pricing"]
        );
    }

    #[test]
    fn source_scan_finds_embedded_urls() {
        let html = r#"<script>window.__DATA__ = {"tools":[
            {"url":"https://hidden-tool.ai/app?utm=1"},
            {"url":"https://theresanaiforthat.com/ai/x/"},
            {"url":"https://github.com/x/y"}
        ]}</script>"#;
        let urls = scan_source_urls(html, &filter());
        assert_eq!(urls, vec!["https://hidden-tool.ai/app?utm=1"]);
    }

    #[test]
    fn url_set_dedupes_and_caps() {
        let mut set = UrlSet::new(2);
        assert!(set.insert("https://a.io/".into()));
        assert!(!set.insert("https://a.io/".into()));
        assert!(set.insert("https://b.io/".into()));
        assert!(set.is_full());
        assert!(!set.insert("https://c.io/".into()));
        assert_eq!(set.into_vec(), vec!["https://a.io/", "https://b.io/"]);
    }

    #[test]
    fn clean_url_drops_query_and_fragment() {
        assert_eq!(
            clean_url("https://acme.io/pricing?ref=taaft#plans").as_deref(),
            Some("https://acme.io/pricing")
        );
        assert_eq!(clean_url("https://acme.io").as_deref(), Some("https://acme.io/"));
        assert_eq!(clean_url("not a url"), None);
    }

    #[test]
    fn anchors_are_counted() {
        assert_eq!(count_anchors("<a>1</a><a href='/'>2</a><p>x</p>"), 2);
    }
}
