//! Page analysis module
//!
//! A `PageReport` is the structured result of fetching and analyzing one URL.
//! This module contains:
//! - the report types (`PageReport`, `Link`, `Hreflang`, `Image`)
//! - the analyzer that builds a report from an HTTP response
//! - HTML content helpers (heading order, word count)
//! - HTTP header helpers (`Link` and `X-Robots-Tag` headers)

mod analyzer;
mod content;
mod headers;

pub use analyzer::{media_type, new_page_report};
pub use content::{count_words, headings_in_order};
pub use headers::{parse_link_header, robots_directives, LinkHeader};

use crate::url::url_hash;
use url::Url;

/// Media type of HTML documents
pub const HTML_MEDIA_TYPE: &str = "text/html";

/// An outbound anchor found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Absolute URL the anchor points to
    pub url: String,

    /// Raw `rel` attribute
    pub rel: String,

    /// Anchor text with whitespace collapsed
    pub text: String,

    pub nofollow: bool,
    pub sponsored: bool,
    pub ugc: bool,
}

impl Link {
    /// Hash of the link target, the join key against `PageReport::url_hash`
    pub fn url_hash(&self) -> String {
        url_hash(&self.url)
    }
}

/// An alternate-language annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hreflang {
    pub url: String,
    pub lang: String,
}

/// An image candidate with the alt text of the element it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub alt: String,
}

/// Analysis result for one URL within a crawl
///
/// Created once per discovered URL and never mutated after it has been
/// persisted. `crawled` is false for URLs that were discovered but
/// deliberately not fetched (blocked by robots.txt) or excluded by the
/// noindex policy.
#[derive(Debug, Clone)]
pub struct PageReport {
    /// Storage id, 0 until persisted
    pub id: i64,

    pub url: String,
    pub parsed_url: Url,
    pub url_hash: String,

    pub status_code: u16,
    pub content_type: String,
    pub media_type: String,

    /// Redirect target from the `Location` header or a meta refresh
    pub redirect_url: String,
    pub redirect_hash: String,

    /// Raw meta refresh directive
    pub refresh: String,

    pub lang: String,
    pub title: String,
    pub description: String,
    pub robots: String,
    pub noindex: bool,
    pub nofollow: bool,
    pub canonical: String,
    pub h1: String,
    pub h2: String,
    pub words: usize,
    pub size: usize,
    pub valid_headings: bool,

    /// Internal anchors (same host as the page)
    pub links: Vec<Link>,
    pub external_links: Vec<Link>,
    pub hreflangs: Vec<Hreflang>,
    pub images: Vec<Image>,
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    pub iframes: Vec<String>,
    pub audios: Vec<String>,
    pub videos: Vec<String>,

    pub blocked_by_robotstxt: bool,
    pub crawled: bool,
    pub timeout: bool,
    pub depth: u32,
}

impl PageReport {
    /// Creates a report for `url` with no response data
    pub fn empty(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);

        Self {
            id: 0,
            url: url.to_string(),
            url_hash: url_hash(url.as_str()),
            parsed_url: url,
            status_code: 0,
            content_type: String::new(),
            media_type: String::new(),
            redirect_url: String::new(),
            redirect_hash: String::new(),
            refresh: String::new(),
            lang: String::new(),
            title: String::new(),
            description: String::new(),
            robots: String::new(),
            noindex: false,
            nofollow: false,
            canonical: String::new(),
            h1: String::new(),
            h2: String::new(),
            words: 0,
            size: 0,
            valid_headings: true,
            links: Vec::new(),
            external_links: Vec::new(),
            hreflangs: Vec::new(),
            images: Vec::new(),
            scripts: Vec::new(),
            styles: Vec::new(),
            iframes: Vec::new(),
            audios: Vec::new(),
            videos: Vec::new(),
            blocked_by_robotstxt: false,
            crawled: false,
            timeout: false,
            depth: 0,
        }
    }

    /// Stub report for a URL that robots.txt blocks; it is never fetched
    pub fn blocked(url: &Url, depth: u32) -> Self {
        let mut report = Self::empty(url);
        report.blocked_by_robotstxt = true;
        report.depth = depth;
        report
    }

    /// Report for a URL whose fetch failed at the network level
    pub fn failed(url: &Url, depth: u32, timeout: bool) -> Self {
        let mut report = Self::empty(url);
        report.timeout = timeout;
        report.depth = depth;
        report
    }

    /// Sets the redirect target and its hash
    pub fn set_redirect(&mut self, target: &Url) {
        self.redirect_url = target.to_string();
        self.redirect_hash = url_hash(target.as_str());
    }

    pub fn is_html(&self) -> bool {
        self.media_type == HTML_MEDIA_TYPE
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Crawled 2xx HTML page, the subject of most content reporters
    pub fn is_html_ok(&self) -> bool {
        self.crawled && self.is_html() && self.is_success()
    }

    /// True if the page has no canonical or declares itself canonical
    pub fn is_self_canonical(&self) -> bool {
        self.canonical.is_empty() || url_hash(&self.canonical) == self.url_hash
    }

    /// Every child URL a crawler could follow from this page
    ///
    /// Anchors marked nofollow are only included when `follow_nofollow` is
    /// set, and a page-level nofollow drops all anchors likewise.
    pub fn child_urls(&self, follow_nofollow: bool) -> Vec<String> {
        let mut urls = Vec::new();

        if follow_nofollow || !self.nofollow {
            urls.extend(
                self.links
                    .iter()
                    .chain(self.external_links.iter())
                    .filter(|l| follow_nofollow || !l.nofollow)
                    .map(|l| l.url.clone()),
            );
        }

        if !self.redirect_url.is_empty() {
            urls.push(self.redirect_url.clone());
        }

        if !self.canonical.is_empty() {
            urls.push(self.canonical.clone());
        }

        urls.extend(self.hreflangs.iter().map(|h| h.url.clone()));
        urls.extend(self.images.iter().map(|i| i.url.clone()));
        urls.extend(self.scripts.iter().cloned());
        urls.extend(self.styles.iter().cloned());
        urls.extend(self.iframes.iter().cloned());
        urls.extend(self.audios.iter().cloned());
        urls.extend(self.videos.iter().cloned());

        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, nofollow: bool) -> Link {
        Link {
            url: url.to_string(),
            rel: String::new(),
            text: String::new(),
            nofollow,
            sponsored: false,
            ugc: false,
        }
    }

    #[test]
    fn test_empty_report() {
        let url = Url::parse("https://example.com/page#top").unwrap();
        let report = PageReport::empty(&url);
        assert_eq!(report.url, "https://example.com/page");
        assert_eq!(report.url_hash, url_hash("https://example.com/page"));
        assert!(!report.crawled);
        assert!(report.valid_headings);
    }

    #[test]
    fn test_self_canonical() {
        let url = Url::parse("https://example.com/page").unwrap();
        let mut report = PageReport::empty(&url);
        assert!(report.is_self_canonical());

        report.canonical = "https://EXAMPLE.com/page".to_string();
        assert!(report.is_self_canonical());

        report.canonical = "https://example.com/other".to_string();
        assert!(!report.is_self_canonical());
    }

    #[test]
    fn test_child_urls_honor_nofollow() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut report = PageReport::empty(&url);
        report.links = vec![
            link("https://example.com/a", false),
            link("https://example.com/b", true),
        ];
        report.scripts = vec!["https://example.com/app.js".to_string()];

        let children = report.child_urls(false);
        assert!(children.contains(&"https://example.com/a".to_string()));
        assert!(!children.contains(&"https://example.com/b".to_string()));
        assert!(children.contains(&"https://example.com/app.js".to_string()));

        let children = report.child_urls(true);
        assert!(children.contains(&"https://example.com/b".to_string()));
    }

    #[test]
    fn test_child_urls_page_nofollow() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut report = PageReport::empty(&url);
        report.nofollow = true;
        report.links = vec![link("https://example.com/a", false)];
        report.canonical = "https://example.com/".to_string();

        let children = report.child_urls(false);
        assert_eq!(children, vec!["https://example.com/".to_string()]);
    }
}
