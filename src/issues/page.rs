//! Single-page issue reporters
//!
//! Each reporter is a stateless predicate over one page report, its parsed
//! document and its response headers.

use crate::issues::{is_valid_language, ErrorType};
use crate::pagereport::{parse_link_header, PageReport};
use crate::url::{absolutize, url_hash};
use reqwest::header::{HeaderMap, LINK, STRICT_TRANSPORT_SECURITY};
use scraper::{ElementRef, Html, Selector};

const TITLE_MIN: usize = 20;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 80;
const DESCRIPTION_MAX: usize = 160;
const LITTLE_CONTENT_WORDS: usize = 200;
const TOO_MANY_LINKS: usize = 100;
const MAX_DEPTH: u32 = 4;

type Check = dyn Fn(&PageReport, &Html, &HeaderMap) -> bool + Send + Sync;

/// A predicate that flags one error type on a single page
pub struct PageIssueReporter {
    pub error_type: ErrorType,
    callback: Box<Check>,
}

impl PageIssueReporter {
    pub fn new<F>(error_type: ErrorType, callback: F) -> Self
    where
        F: Fn(&PageReport, &Html, &HeaderMap) -> bool + Send + Sync + 'static,
    {
        Self {
            error_type,
            callback: Box::new(callback),
        }
    }

    /// Returns true if the page has this reporter's issue
    pub fn check(&self, report: &PageReport, document: &Html, headers: &HeaderMap) -> bool {
        (self.callback)(report, document, headers)
    }
}

impl std::fmt::Debug for PageIssueReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageIssueReporter")
            .field("error_type", &self.error_type)
            .finish()
    }
}

/// Every built-in page reporter
pub fn default_page_reporters() -> Vec<PageIssueReporter> {
    vec![
        status_30x_reporter(),
        status_40x_reporter(),
        status_50x_reporter(),
        empty_title_reporter(),
        short_title_reporter(),
        long_title_reporter(),
        empty_description_reporter(),
        short_description_reporter(),
        long_description_reporter(),
        little_content_reporter(),
        images_with_no_alt_reporter(),
        no_h1_reporter(),
        no_lang_reporter(),
        http_links_reporter(),
        too_many_links_reporter(),
        internal_nofollow_reporter(),
        external_without_nofollow_reporter(),
        not_valid_headings_reporter(),
        invalid_language_reporter(),
        http_scheme_reporter(),
        canonical_multiple_tags_reporter(),
        canonical_relative_url_reporter(),
        canonical_mismatch_reporter(),
        hreflang_missing_self_reference_reporter(),
        hreflang_missing_x_default_reporter(),
        hreflang_relative_url_reporter(),
        multiple_title_tags_reporter(),
        multiple_description_tags_reporter(),
        missing_hsts_reporter(),
        timeout_reporter(),
        depth_reporter(),
        blocked_reporter(),
    ]
}

fn status_in(report: &PageReport, range: std::ops::Range<u16>) -> bool {
    report.crawled && range.contains(&report.status_code)
}

/// Crawled HTML page of any status
fn is_crawled_html(report: &PageReport) -> bool {
    report.crawled && report.is_html()
}

fn count(document: &Html, selector: &str) -> usize {
    Selector::parse(selector)
        .map(|s| document.select(&s).count())
        .unwrap_or(0)
}

fn select_all<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .map(|s| document.select(&s).collect())
        .unwrap_or_default()
}

fn rel_contains(element: &ElementRef, rel: &str) -> bool {
    element
        .value()
        .attr("rel")
        .map(|v| v.split_whitespace().any(|t| t.eq_ignore_ascii_case(rel)))
        .unwrap_or(false)
}

fn is_absolute_http(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    href.starts_with("http://") || href.starts_with("https://")
}

pub fn status_30x_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::Error30x, |r, _, _| status_in(r, 300..400))
}

pub fn status_40x_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::Error40x, |r, _, _| status_in(r, 400..500))
}

pub fn status_50x_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::Error50x, |r, _, _| status_in(r, 500..600))
}

/// Crawled 2xx HTML page without a title
pub fn empty_title_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::EmptyTitle, |r, _, _| {
        r.is_html_ok() && r.title.is_empty()
    })
}

/// Title shorter than 20 characters, but not empty
pub fn short_title_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::ShortTitle, |r, _, _| {
        let len = r.title.chars().count();
        is_crawled_html(r) && len > 0 && len < TITLE_MIN
    })
}

pub fn long_title_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::LongTitle, |r, _, _| {
        is_crawled_html(r) && r.title.chars().count() > TITLE_MAX
    })
}

pub fn empty_description_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::EmptyDescription, |r, _, _| {
        r.is_html_ok() && r.description.is_empty()
    })
}

pub fn short_description_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::ShortDescription, |r, _, _| {
        let len = r.description.chars().count();
        is_crawled_html(r) && len > 0 && len < DESCRIPTION_MIN
    })
}

pub fn long_description_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::LongDescription, |r, _, _| {
        is_crawled_html(r) && r.description.chars().count() > DESCRIPTION_MAX
    })
}

pub fn little_content_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::LittleContent, |r, _, _| {
        r.is_html_ok() && r.words < LITTLE_CONTENT_WORDS
    })
}

pub fn images_with_no_alt_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::ImagesWithNoAlt, |r, _, _| {
        r.is_html_ok() && r.images.iter().any(|i| i.alt.is_empty())
    })
}

pub fn no_h1_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::NoH1, |r, _, _| r.is_html_ok() && r.h1.is_empty())
}

pub fn no_lang_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::NoLang, |r, _, _| r.is_html_ok() && r.lang.is_empty())
}

/// Links to plain http URLs
pub fn http_links_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::HttpLinks, |r, _, _| {
        is_crawled_html(r)
            && r.links
                .iter()
                .chain(r.external_links.iter())
                .any(|l| l.url.starts_with("http://"))
    })
}

pub fn too_many_links_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::TooManyLinks, |r, _, _| {
        is_crawled_html(r) && r.links.len() + r.external_links.len() > TOO_MANY_LINKS
    })
}

pub fn internal_nofollow_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::InternalNoFollow, |r, _, _| {
        is_crawled_html(r) && r.links.iter().any(|l| l.nofollow)
    })
}

pub fn external_without_nofollow_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::ExternalWithoutNoFollow, |r, _, _| {
        is_crawled_html(r) && r.external_links.iter().any(|l| !l.nofollow)
    })
}

pub fn not_valid_headings_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::NotValidHeadings, |r, _, _| {
        r.is_html_ok() && !r.valid_headings
    })
}

/// `lang` present but not a recognised language tag
pub fn invalid_language_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::InvalidLanguage, |r, _, _| {
        r.is_html_ok() && !r.lang.is_empty() && !is_valid_language(&r.lang, false)
    })
}

/// Page served over plain http
pub fn http_scheme_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::HttpScheme, |r, _, _| {
        r.crawled && r.parsed_url.scheme() == "http"
    })
}

pub fn canonical_multiple_tags_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::CanonicalMultipleTags, |r, doc, _| {
        is_crawled_html(r)
            && select_all(doc, "link[rel][href]")
                .iter()
                .filter(|el| rel_contains(el, "canonical"))
                .count()
                > 1
    })
}

pub fn canonical_relative_url_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::CanonicalRelativeUrl, |r, doc, _| {
        is_crawled_html(r)
            && select_all(doc, "link[rel][href]")
                .iter()
                .filter(|el| rel_contains(el, "canonical"))
                .filter_map(|el| el.value().attr("href"))
                .any(|href| !is_absolute_http(href))
    })
}

/// The canonical tag and the canonical `Link` header point to different URLs
pub fn canonical_mismatch_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::CanonicalMismatch, |r, doc, headers| {
        if !is_crawled_html(r) {
            return false;
        }

        let tag = select_all(doc, "link[rel][href]")
            .into_iter()
            .filter(|el| rel_contains(el, "canonical"))
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| absolutize(&r.parsed_url, href).ok());

        let header = headers
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_link_header)
            .filter(|l| l.has_rel("canonical"))
            .find_map(|l| absolutize(&r.parsed_url, &l.target).ok());

        match (tag, header) {
            (Some(tag), Some(header)) => url_hash(tag.as_str()) != url_hash(header.as_str()),
            _ => false,
        }
    })
}

pub fn hreflang_missing_self_reference_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::HreflangMissingSelfReference, |r, _, _| {
        is_crawled_html(r)
            && !r.hreflangs.is_empty()
            && !r.hreflangs.iter().any(|h| url_hash(&h.url) == r.url_hash)
    })
}

pub fn hreflang_missing_x_default_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::HreflangMissingXDefault, |r, _, _| {
        is_crawled_html(r)
            && !r.hreflangs.is_empty()
            && !r
                .hreflangs
                .iter()
                .any(|h| h.lang.eq_ignore_ascii_case("x-default"))
    })
}

pub fn hreflang_relative_url_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::HreflangRelativeUrl, |r, doc, _| {
        is_crawled_html(r)
            && select_all(doc, "link[hreflang][href]")
                .iter()
                .filter_map(|el| el.value().attr("href"))
                .any(|href| !is_absolute_http(href))
    })
}

pub fn multiple_title_tags_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::MultipleTitleTags, |r, doc, _| {
        is_crawled_html(r) && count(doc, "head title") > 1
    })
}

pub fn multiple_description_tags_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::MultipleDescriptionTags, |r, doc, _| {
        is_crawled_html(r)
            && select_all(doc, "meta[name]")
                .iter()
                .filter(|el| {
                    el.value()
                        .attr("name")
                        .map(|n| n.trim().eq_ignore_ascii_case("description"))
                        .unwrap_or(false)
                })
                .count()
                > 1
    })
}

/// https page without a `Strict-Transport-Security` header
pub fn missing_hsts_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::MissingHsts, |r, _, headers| {
        r.is_html_ok()
            && r.parsed_url.scheme() == "https"
            && !headers.contains_key(STRICT_TRANSPORT_SECURITY)
    })
}

pub fn timeout_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::Timeout, |r, _, _| r.timeout)
}

pub fn depth_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::Depth, |r, _, _| r.crawled && r.depth > MAX_DEPTH)
}

pub fn blocked_reporter() -> PageIssueReporter {
    PageIssueReporter::new(ErrorType::Blocked, |r, _, _| r.blocked_by_robotstxt)
}
