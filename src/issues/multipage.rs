//! Whole-crawl issue detectors
//!
//! A `CrawlSnapshot` holds the persisted rows of one crawl. Each detector is
//! a hash join or a group-by over those rows, keyed by URL hashes. Raw URL
//! strings are never compared.

use crate::issues::ErrorType;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A persisted page report, reduced to the columns the detectors read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRow {
    pub id: i64,
    pub url_hash: String,

    /// Empty when the page does not redirect
    pub redirect_hash: String,

    /// Hash of the canonical URL, empty when none is declared
    pub canonical_hash: String,

    pub status_code: u16,
    pub media_type: String,
    pub title: String,
    pub description: String,
    pub lang: String,
    pub noindex: bool,
    pub crawled: bool,
    pub depth: u32,
}

impl PageRow {
    fn is_html_ok(&self) -> bool {
        self.crawled
            && self.media_type == crate::pagereport::HTML_MEDIA_TYPE
            && (200..300).contains(&self.status_code)
    }

    fn is_canonical(&self) -> bool {
        self.canonical_hash.is_empty() || self.canonical_hash == self.url_hash
    }

    fn is_indexable(&self) -> bool {
        self.is_html_ok() && !self.noindex && self.is_canonical()
    }
}

/// An internal link between two pages of the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub page_report_id: i64,
    pub url_hash: String,
    pub nofollow: bool,
}

/// An hreflang annotation on a page of the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HreflangRow {
    pub page_report_id: i64,
    pub url_hash: String,
    pub lang: String,
}

/// Everything the multipage detectors scan for one crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlSnapshot {
    pub pages: Vec<PageRow>,
    pub links: Vec<LinkRow>,
    pub hreflangs: Vec<HreflangRow>,
}

impl CrawlSnapshot {
    fn by_hash(&self) -> HashMap<&str, &PageRow> {
        self.pages
            .iter()
            .map(|p| (p.url_hash.as_str(), p))
            .collect()
    }
}

/// A whole-crawl detector returning the ids of affected page reports
pub struct MultipageIssueReporter {
    pub error_type: ErrorType,
    scan: fn(&CrawlSnapshot) -> BTreeSet<i64>,
}

impl MultipageIssueReporter {
    pub fn new(error_type: ErrorType, scan: fn(&CrawlSnapshot) -> BTreeSet<i64>) -> Self {
        Self { error_type, scan }
    }

    /// Runs the detector, returning sorted, de-duplicated page report ids
    pub fn scan(&self, snapshot: &CrawlSnapshot) -> Vec<i64> {
        (self.scan)(snapshot).into_iter().collect()
    }
}

impl std::fmt::Debug for MultipageIssueReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipageIssueReporter")
            .field("error_type", &self.error_type)
            .finish()
    }
}

/// Every built-in multipage reporter
pub fn default_multipage_reporters() -> Vec<MultipageIssueReporter> {
    vec![
        MultipageIssueReporter::new(ErrorType::DuplicatedTitle, duplicated_title),
        MultipageIssueReporter::new(ErrorType::DuplicatedDescription, duplicated_description),
        MultipageIssueReporter::new(ErrorType::RedirectChain, redirect_chain),
        MultipageIssueReporter::new(ErrorType::RedirectLoop, redirect_loop),
        MultipageIssueReporter::new(
            ErrorType::CanonicalizedToNonCanonical,
            canonicalized_to_non_canonical,
        ),
        MultipageIssueReporter::new(ErrorType::Orphan, orphan),
        MultipageIssueReporter::new(ErrorType::HreflangsReturnLink, hreflang_return_link),
        MultipageIssueReporter::new(ErrorType::HreflangToNonCanonical, hreflang_to_non_canonical),
        MultipageIssueReporter::new(ErrorType::HreflangNoindexable, hreflang_noindexable),
        MultipageIssueReporter::new(
            ErrorType::InternalNoFollowIndexable,
            internal_nofollow_indexable,
        ),
        MultipageIssueReporter::new(ErrorType::IncomingFollowNofollow, incoming_follow_nofollow),
    ]
}

/// Groups eligible pages by `(value, lang)` and returns every member of a
/// group with more than one page
///
/// Eligible means crawled, 2xx, HTML, canonical (no canonical or
/// self-canonical) and a non-empty value. The filter applies to every member
/// of a group.
fn duplicated_by(snapshot: &CrawlSnapshot, value: fn(&PageRow) -> &str) -> BTreeSet<i64> {
    let mut groups: HashMap<(&str, &str), Vec<i64>> = HashMap::new();

    for page in &snapshot.pages {
        let v = value(page);
        if v.is_empty() || !page.is_html_ok() || !page.is_canonical() {
            continue;
        }
        groups.entry((v, page.lang.as_str())).or_default().push(page.id);
    }

    groups
        .into_values()
        .filter(|ids| ids.len() > 1)
        .flatten()
        .collect()
}

fn duplicated_title(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    duplicated_by(snapshot, |p| p.title.as_str())
}

fn duplicated_description(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    duplicated_by(snapshot, |p| p.description.as_str())
}

/// Pages redirecting to a page that redirects again
fn redirect_chain(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    snapshot
        .pages
        .iter()
        .filter(|a| !a.redirect_hash.is_empty())
        .filter(|a| {
            pages
                .get(a.redirect_hash.as_str())
                .map(|b| !b.redirect_hash.is_empty())
                .unwrap_or(false)
        })
        .map(|a| a.id)
        .collect()
}

/// Pages redirecting to themselves, directly or through one other page
fn redirect_loop(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    snapshot
        .pages
        .iter()
        .filter(|a| !a.redirect_hash.is_empty())
        .filter(|a| {
            a.redirect_hash == a.url_hash
                || pages
                    .get(a.redirect_hash.as_str())
                    .map(|b| b.redirect_hash == a.url_hash)
                    .unwrap_or(false)
        })
        .map(|a| a.id)
        .collect()
}

/// Pages canonicalized to a page whose own canonical points elsewhere
fn canonicalized_to_non_canonical(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    snapshot
        .pages
        .iter()
        .filter(|a| !a.is_canonical())
        .filter(|a| {
            pages
                .get(a.canonical_hash.as_str())
                .map(|b| !b.is_canonical())
                .unwrap_or(false)
        })
        .map(|a| a.id)
        .collect()
}

/// Crawled HTML pages that no other page links or redirects to
///
/// The start page is never an orphan.
fn orphan(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let by_id: HashMap<i64, &PageRow> = snapshot.pages.iter().map(|p| (p.id, p)).collect();
    let mut referenced: HashSet<&str> = HashSet::new();

    for link in &snapshot.links {
        let from_self = by_id
            .get(&link.page_report_id)
            .map(|p| p.url_hash == link.url_hash)
            .unwrap_or(false);
        if !from_self {
            referenced.insert(link.url_hash.as_str());
        }
    }

    for page in &snapshot.pages {
        if !page.redirect_hash.is_empty() && page.redirect_hash != page.url_hash {
            referenced.insert(page.redirect_hash.as_str());
        }
    }

    snapshot
        .pages
        .iter()
        .filter(|p| p.depth > 0 && p.is_html_ok())
        .filter(|p| !referenced.contains(p.url_hash.as_str()))
        .map(|p| p.id)
        .collect()
}

/// Yields `(source page, target page)` for hreflangs that point at another
/// page of the crawl
fn hreflang_targets<'a>(
    snapshot: &'a CrawlSnapshot,
    pages: &'a HashMap<&'a str, &'a PageRow>,
) -> impl Iterator<Item = (&'a PageRow, &'a PageRow)> + 'a {
    let by_id: HashMap<i64, &PageRow> = snapshot.pages.iter().map(|p| (p.id, p)).collect();

    snapshot.hreflangs.iter().filter_map(move |h| {
        let source = *by_id.get(&h.page_report_id)?;
        let target = *pages.get(h.url_hash.as_str())?;
        (source.id != target.id).then_some((source, target))
    })
}

/// Hreflang targets that do not annotate the source page back
fn hreflang_return_link(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    let declared: HashSet<(i64, &str)> = snapshot
        .hreflangs
        .iter()
        .map(|h| (h.page_report_id, h.url_hash.as_str()))
        .collect();

    hreflang_targets(snapshot, &pages)
        .filter(|(_, target)| target.is_html_ok())
        .filter(|(source, target)| !declared.contains(&(target.id, source.url_hash.as_str())))
        .map(|(source, _)| source.id)
        .collect()
}

fn hreflang_to_non_canonical(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    hreflang_targets(snapshot, &pages)
        .filter(|(_, target)| !target.is_canonical())
        .map(|(source, _)| source.id)
        .collect()
}

fn hreflang_noindexable(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    hreflang_targets(snapshot, &pages)
        .filter(|(_, target)| target.noindex)
        .map(|(source, _)| source.id)
        .collect()
}

/// Pages with a nofollow link to an indexable page of the same site
fn internal_nofollow_indexable(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();

    snapshot
        .links
        .iter()
        .filter(|l| l.nofollow)
        .filter(|l| {
            pages
                .get(l.url_hash.as_str())
                .map(|target| target.is_indexable())
                .unwrap_or(false)
        })
        .map(|l| l.page_report_id)
        .collect()
}

/// Pages receiving both follow and nofollow internal links
fn incoming_follow_nofollow(snapshot: &CrawlSnapshot) -> BTreeSet<i64> {
    let pages = snapshot.by_hash();
    let mut follow: HashSet<&str> = HashSet::new();
    let mut nofollow: HashSet<&str> = HashSet::new();

    for link in &snapshot.links {
        if link.nofollow {
            nofollow.insert(link.url_hash.as_str());
        } else {
            follow.insert(link.url_hash.as_str());
        }
    }

    follow
        .intersection(&nofollow)
        .filter_map(|hash| pages.get(hash).map(|p| p.id))
        .collect()
}
