//! Worker-pool crawler
//!
//! URLs move through `discovered -> (blocked | queued) -> fetched -> analyzed`.
//! Workers poll the shared queue, fetch and analyze one URL at a time, emit
//! the resulting `PageReport`, then push every new in-scope child URL back
//! onto the queue. The crawl ends when the queue closes.

use crate::config::Config;
use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::queue::{ProducerGuard, Queue};
use crate::crawler::url_storage::UrlStorage;
use crate::model::Project;
use crate::pagereport::{new_page_report, PageReport};
use crate::robots::RobotsChecker;
use crate::sitemap::{sitemap_seeds, SitemapChecker};
use crate::url::in_crawl_scope;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use url::Url;

/// A URL waiting in the frontier with its distance from the start URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueuedUrl {
    pub url: String,
    pub depth: u32,
}

/// Crawler tuning shared by every project
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Ceiling on crawled page reports; responses past it are emitted but
    /// their links are not followed
    pub max_page_reports: usize,

    /// Number of concurrent workers
    pub workers: usize,

    /// Product token matched against robots.txt groups
    pub user_agent: String,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_page_reports: 20_000,
            workers: 2,
            user_agent: "SumiAudit".to_string(),
        }
    }
}

impl CrawlerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_page_reports: config.crawler.max_page_reports,
            workers: config.crawler.workers,
            user_agent: config.user_agent.crawler_name.clone(),
        }
    }
}

/// One analyzed URL together with the raw response it came from
///
/// The body and headers travel with the report so per-page reporters can
/// inspect the DOM without fetching again.
#[derive(Debug)]
pub struct PageReportMessage {
    pub page_report: PageReport,
    pub body: String,
    pub headers: HeaderMap,
}

pub struct Crawler {
    start: Url,
    project: Project,
    options: CrawlerOptions,
    client: Client,
    queue: Queue<QueuedUrl>,
    url_storage: UrlStorage,
    robots: RobotsChecker,
    sitemaps: SitemapChecker,
    crawled: Mutex<usize>,
    robotstxt_exists: AtomicBool,
    sitemap_exists: AtomicBool,
}

impl Crawler {
    /// Creates a crawler for a project
    ///
    /// Must be called from within a tokio runtime; the queue task is spawned
    /// immediately.
    ///
    /// # Arguments
    ///
    /// * `start` - The validated start URL of the project
    /// * `project` - Crawl policy (robots, nofollow, noindex, sitemap, scope, auth)
    /// * `client` - HTTP client shared by the fetcher, robots and sitemap checks
    /// * `options` - Worker count, page ceiling and robots user agent
    pub fn new(start: Url, project: Project, client: Client, options: CrawlerOptions) -> Self {
        Self {
            robots: RobotsChecker::new(client.clone(), options.user_agent.clone()),
            sitemaps: SitemapChecker::new(client.clone()),
            start,
            project,
            options,
            client,
            queue: Queue::new(),
            url_storage: UrlStorage::new(),
            crawled: Mutex::new(0),
            robotstxt_exists: AtomicBool::new(false),
            sitemap_exists: AtomicBool::new(false),
        }
    }

    /// Runs the crawl, sending every page report to `tx`
    ///
    /// Returns once all workers have exited; `tx` is dropped at that point,
    /// which closes the receiving stream.
    pub async fn crawl(self: Arc<Self>, tx: mpsc::Sender<PageReportMessage>) {
        tracing::info!("Crawling {}", self.start);

        let robots_exists = self.robots.exists(&self.start).await;
        self.robotstxt_exists.store(robots_exists, Ordering::SeqCst);

        let robots_sitemaps = self.robots.get_sitemaps(&self.start).await;
        let seeds = sitemap_seeds(&self.start, &robots_sitemaps);
        let sitemap_exists = self.sitemaps.sitemap_exists(&seeds).await;
        self.sitemap_exists.store(sitemap_exists, Ordering::SeqCst);

        tracing::debug!(
            "robots.txt exists: {}, sitemap exists: {}",
            robots_exists,
            sitemap_exists
        );

        self.url_storage.add(self.start.as_str());
        self.queue.push(QueuedUrl {
            url: self.start.to_string(),
            depth: 0,
        });

        // The lease is taken before any worker can ack the start URL
        let seeder = if self.project.crawl_sitemap && sitemap_exists {
            let guard = self.queue.producer();
            let crawler = Arc::clone(&self);
            Some(tokio::spawn(async move {
                crawler
                    .sitemaps
                    .parse_sitemaps(&seeds, |url| crawler.seed_from_sitemap(&guard, &url))
                    .await;
                tracing::debug!("Sitemap seeding finished");
            }))
        } else {
            None
        };

        let mut handles = Vec::with_capacity(self.options.workers);
        for _ in 0..self.options.workers.max(1) {
            handles.push(tokio::spawn(Arc::clone(&self).worker(tx.clone())));
        }
        drop(tx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Crawler worker failed: {}", e);
            }
        }

        if let Some(seeder) = seeder {
            if let Err(e) = seeder.await {
                tracing::error!("Sitemap seeder failed: {}", e);
            }
        }

        tracing::info!(
            "Crawl of {} finished: {} URLs discovered, {} pages crawled",
            self.start,
            self.url_storage.len(),
            self.crawled_count()
        );
    }

    /// True if the start host serves a robots.txt
    pub fn robotstxt_exists(&self) -> bool {
        self.robotstxt_exists.load(Ordering::SeqCst)
    }

    /// True if a default or robots.txt-advertised sitemap answered with 2xx
    pub fn sitemap_exists(&self) -> bool {
        self.sitemap_exists.load(Ordering::SeqCst)
    }

    fn crawled_count(&self) -> usize {
        match self.crawled.lock() {
            Ok(crawled) => *crawled,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Polls the queue until it closes
    ///
    /// Each URL is processed on its own task so that a panic while analyzing
    /// one page is contained; the URL is acknowledged either way.
    async fn worker(self: Arc<Self>, tx: mpsc::Sender<PageReportMessage>) {
        while let Some(item) = self.queue.poll().await {
            let crawler = Arc::clone(&self);
            let task_item = item.clone();
            let task_tx = tx.clone();
            let outcome =
                tokio::spawn(async move { crawler.process(&task_item, &task_tx).await }).await;

            if let Err(e) = outcome {
                tracing::error!("Processing {} failed: {}", item.url, e);
            }

            self.queue.ack(item);
        }
    }

    async fn process(&self, item: &QueuedUrl, tx: &mpsc::Sender<PageReportMessage>) {
        let url = match Url::parse(&item.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping unparsable queued URL {}: {}", item.url, e);
                return;
            }
        };

        if !self.project.ignore_robots_txt && self.robots.is_blocked(&url).await {
            tracing::debug!("Blocked by robots.txt: {}", url);
            self.emit(
                tx,
                PageReport::blocked(&url, item.depth),
                String::new(),
                HeaderMap::new(),
            )
            .await;
            return;
        }

        let auth = self.project.basic_auth.as_ref();
        let (mut report, body, headers) = match fetch_url(&self.client, &url, auth).await {
            FetchResult::Response {
                status,
                headers,
                body,
            } => match new_page_report(&url, status, &headers, &body) {
                Ok(mut report) => {
                    report.depth = item.depth;
                    (report, body, headers)
                }
                Err(e) => {
                    tracing::warn!("Failed to analyze {}: {}", url, e);
                    return;
                }
            },
            FetchResult::Timeout => (
                PageReport::failed(&url, item.depth, true),
                String::new(),
                HeaderMap::new(),
            ),
            FetchResult::NetworkError(e) => {
                tracing::debug!("Fetch failed for {}: {}", url, e);
                (
                    PageReport::failed(&url, item.depth, false),
                    String::new(),
                    HeaderMap::new(),
                )
            }
        };

        let children = if self.claim(&mut report) {
            report.child_urls(self.project.follow_nofollow)
        } else {
            Vec::new()
        };

        self.emit(tx, report, body, headers).await;

        for child in children {
            self.discover(&child, item.depth + 1, tx).await;
        }
    }

    /// Counts the report against the page ceiling
    ///
    /// Returns false once the ceiling has been reached, in which case the
    /// report's links must not be followed.
    fn claim(&self, report: &mut PageReport) -> bool {
        let mut crawled = match self.crawled.lock() {
            Ok(crawled) => crawled,
            Err(poisoned) => poisoned.into_inner(),
        };

        if *crawled >= self.options.max_page_reports {
            return false;
        }

        if !report.noindex || self.project.include_noindex {
            *crawled += 1;
            report.crawled = true;
        }

        true
    }

    async fn discover(&self, raw: &str, depth: u32, tx: &mpsc::Sender<PageReportMessage>) {
        let Some(url) = self.scoped_unseen(raw) else {
            return;
        };

        if !self.project.ignore_robots_txt && self.robots.is_blocked(&url).await {
            self.emit(
                tx,
                PageReport::blocked(&url, depth),
                String::new(),
                HeaderMap::new(),
            )
            .await;
            return;
        }

        self.queue.push(QueuedUrl {
            url: url.to_string(),
            depth,
        });
    }

    fn seed_from_sitemap(&self, guard: &ProducerGuard<QueuedUrl>, raw: &str) {
        if let Some(url) = self.scoped_unseen(raw) {
            guard.push(QueuedUrl {
                url: url.to_string(),
                depth: 1,
            });
        }
    }

    /// Parses a discovered URL and claims it if it is in scope and new
    fn scoped_unseen(&self, raw: &str) -> Option<Url> {
        let mut url = Url::parse(raw).ok()?;
        url.set_fragment(None);

        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }

        if !in_crawl_scope(&self.start, &url, self.project.allow_subdomains) {
            return None;
        }

        self.url_storage.add(url.as_str()).then_some(url)
    }

    async fn emit(
        &self,
        tx: &mpsc::Sender<PageReportMessage>,
        page_report: PageReport,
        body: String,
        headers: HeaderMap,
    ) {
        let message = PageReportMessage {
            page_report,
            body,
            headers,
        };

        if tx.send(message).await.is_err() {
            tracing::warn!("Page report receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_html(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"),
            )
            .mount(server)
            .await;
    }

    async fn run(
        server: &MockServer,
        project: Project,
        options: CrawlerOptions,
    ) -> (Vec<PageReport>, Arc<Crawler>) {
        run_with_client(server, project, options, Client::new()).await
    }

    async fn run_with_client(
        server: &MockServer,
        project: Project,
        options: CrawlerOptions,
        client: Client,
    ) -> (Vec<PageReport>, Arc<Crawler>) {
        let start = Url::parse(&format!("{}/", server.uri())).unwrap();
        let crawler = Arc::new(Crawler::new(start, project, client, options));

        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(Arc::clone(&crawler).crawl(tx));

        let mut reports = Vec::new();
        while let Some(message) = rx.recv().await {
            reports.push(message.page_report);
        }
        task.await.unwrap();

        (reports, crawler)
    }

    fn project(server: &MockServer) -> Project {
        Project::new(format!("{}/", server.uri()))
    }

    #[tokio::test]
    async fn test_blocked_child_emits_stub() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
            )
            .mount(&server)
            .await;
        mount_html(&server, "/", r#"<a href="/private">P</a><a href="/public">Q</a>"#).await;
        mount_html(&server, "/public", "<p>ok</p>").await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (reports, crawler) = run(&server, project(&server), CrawlerOptions::default()).await;

        assert_eq!(reports.len(), 3);
        let private = reports.iter().find(|r| r.url.ends_with("/private")).unwrap();
        assert!(private.blocked_by_robotstxt);
        assert!(!private.crawled);
        assert_eq!(private.depth, 1);
        assert!(crawler.robotstxt_exists());
        assert!(!crawler.sitemap_exists());
    }

    #[tokio::test]
    async fn test_ceiling_stops_expansion() {
        let server = MockServer::start().await;
        mount_html(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
        mount_html(&server, "/a", r#"<a href="/c">C</a>"#).await;
        mount_html(&server, "/b", r#"<a href="/d">D</a>"#).await;

        let options = CrawlerOptions {
            max_page_reports: 1,
            workers: 1,
            ..CrawlerOptions::default()
        };
        let (reports, _) = run(&server, project(&server), options).await;

        // The start page is crawled; its children are emitted but not expanded
        assert_eq!(reports.len(), 3);
        assert_eq!(reports.iter().filter(|r| r.crawled).count(), 1);
        assert!(!reports.iter().any(|r| r.url.ends_with("/c") || r.url.ends_with("/d")));
    }

    #[tokio::test]
    async fn test_noindex_is_not_counted_as_crawled() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><head><meta name="robots" content="noindex"></head><body><a href="/next">n</a></body></html>"#,
        )
        .await;
        mount_html(&server, "/next", "<p>indexable</p>").await;

        let (reports, _) = run(&server, project(&server), CrawlerOptions::default()).await;

        assert_eq!(reports.len(), 2);
        let root = reports.iter().find(|r| r.depth == 0).unwrap();
        assert!(root.noindex);
        assert!(!root.crawled);
        let next = reports.iter().find(|r| r.depth == 1).unwrap();
        assert!(next.crawled);
    }

    #[tokio::test]
    async fn test_sitemap_urls_are_crawled() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount_html(&server, "/", "<p>no links</p>").await;
        mount_html(&server, "/orphan", "<p>only in the sitemap</p>").await;

        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>{base}/orphan</loc></url><url><loc>https://elsewhere.example/</loc></url></urlset>"#
        );
        Mock::given(method("HEAD"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sitemap))
            .mount(&server)
            .await;

        let mut project = project(&server);
        project.crawl_sitemap = true;
        let (reports, crawler) = run(&server, project, CrawlerOptions::default()).await;

        assert!(crawler.sitemap_exists());
        assert_eq!(reports.len(), 2);
        let orphan = reports.iter().find(|r| r.url.ends_with("/orphan")).unwrap();
        assert_eq!(orphan.depth, 1);
    }

    #[tokio::test]
    async fn test_multibyte_refresh_does_not_stall_crawl() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><head><meta http-equiv="refresh" content="0;aaé"></head></html>"#,
        )
        .await;

        let crawl = run(&server, project(&server), CrawlerOptions::default());
        let (reports, _) = tokio::time::timeout(Duration::from_secs(10), crawl)
            .await
            .expect("crawl did not terminate");

        let root = reports.iter().find(|r| r.depth == 0).unwrap();
        assert_eq!(root.refresh, "0;aaé");
        assert!(root.redirect_url.ends_with("/aa%C3%A9"));
        assert!(reports.iter().any(|r| r.url.ends_with("/aa%C3%A9")));
    }

    #[tokio::test]
    async fn test_timed_out_page_is_reported() {
        let server = MockServer::start().await;
        mount_html(&server, "/", r#"<a href="/slow">Slow</a><a href="/fast">Fast</a>"#).await;
        mount_html(&server, "/fast", "<p>quick</p>").await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let crawl = run_with_client(&server, project(&server), CrawlerOptions::default(), client);
        let (reports, _) = tokio::time::timeout(Duration::from_secs(10), crawl)
            .await
            .expect("crawl did not terminate");

        assert_eq!(reports.len(), 3);
        let slow = reports.iter().find(|r| r.url.ends_with("/slow")).unwrap();
        assert!(slow.timeout);
        assert_eq!(slow.status_code, 0);
        assert_eq!(slow.depth, 1);

        let fast = reports.iter().find(|r| r.url.ends_with("/fast")).unwrap();
        assert!(!fast.timeout);
        assert_eq!(fast.status_code, 200);
    }
}
