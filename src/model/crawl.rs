use crate::pagereport::PageReport;
use chrono::{DateTime, Utc};

/// One execution of a project's crawl
///
/// Counters are accumulated while page reports stream in and persisted
/// when the crawl is finalized.
#[derive(Debug, Clone, Default)]
pub struct Crawl {
    pub id: i64,
    pub project_id: i64,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,

    pub total_urls: u64,
    pub blocked_by_robotstxt: u64,
    pub noindex: u64,

    pub internal_follow_links: u64,
    pub internal_nofollow_links: u64,
    pub external_follow_links: u64,
    pub external_nofollow_links: u64,
    pub sponsored_links: u64,
    pub ugc_links: u64,

    pub robotstxt_exists: bool,
    pub sitemap_exists: bool,

    pub issues_end: Option<DateTime<Utc>>,
    pub total_issues: u64,
}

impl Crawl {
    /// Creates an unsaved crawl for a project, started now
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            start: Utc::now(),
            ..Default::default()
        }
    }

    /// Adds one streamed page report to the aggregate counters
    pub fn record(&mut self, report: &PageReport) {
        self.total_urls += 1;

        if report.blocked_by_robotstxt {
            self.blocked_by_robotstxt += 1;
        }

        if report.noindex {
            self.noindex += 1;
        }

        for link in &report.links {
            if link.nofollow {
                self.internal_nofollow_links += 1;
            } else {
                self.internal_follow_links += 1;
            }
        }

        for link in &report.external_links {
            if link.nofollow {
                self.external_nofollow_links += 1;
            } else {
                self.external_follow_links += 1;
            }

            if link.sponsored {
                self.sponsored_links += 1;
            }

            if link.ugc {
                self.ugc_links += 1;
            }
        }
    }

    /// Returns true once the crawl has been finalized
    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagereport::Link;
    use url::Url;

    fn link(url: &str, nofollow: bool, sponsored: bool, ugc: bool) -> Link {
        Link {
            url: url.to_string(),
            rel: String::new(),
            text: String::new(),
            nofollow,
            sponsored,
            ugc,
        }
    }

    #[test]
    fn test_record_counts_links() {
        let mut report =
            PageReport::empty(&Url::parse("https://example.com/").unwrap());
        report.noindex = true;
        report.links = vec![
            link("https://example.com/a", false, false, false),
            link("https://example.com/b", true, false, false),
        ];
        report.external_links = vec![
            link("https://other.com/", true, true, false),
            link("https://forum.com/", false, false, true),
        ];

        let mut crawl = Crawl::new(1);
        crawl.record(&report);

        assert_eq!(crawl.total_urls, 1);
        assert_eq!(crawl.noindex, 1);
        assert_eq!(crawl.blocked_by_robotstxt, 0);
        assert_eq!(crawl.internal_follow_links, 1);
        assert_eq!(crawl.internal_nofollow_links, 1);
        assert_eq!(crawl.external_follow_links, 1);
        assert_eq!(crawl.external_nofollow_links, 1);
        assert_eq!(crawl.sponsored_links, 1);
        assert_eq!(crawl.ugc_links, 1);
    }

    #[test]
    fn test_record_blocked() {
        let url = Url::parse("https://example.com/private").unwrap();
        let report = PageReport::blocked(&url, 1);

        let mut crawl = Crawl::new(1);
        crawl.record(&report);

        assert_eq!(crawl.total_urls, 1);
        assert_eq!(crawl.blocked_by_robotstxt, 1);
        assert!(!crawl.is_finished());
    }
}
