//! Crawl orchestration
//!
//! `CrawlerService` ties one crawl together: it creates the crawl row, runs
//! the `Crawler`, persists every streamed page report, drives issue
//! detection and finally removes the project's previous crawl.

use crate::crawler::crawler::{Crawler, CrawlerOptions, PageReportMessage};
use crate::issues::ReportManager;
use crate::model::{Crawl, Project};
use crate::pagereport::PageReport;
use crate::storage::{lock_storage, Storage, StorageResult};
use crate::url::parse_absolute;
use crate::AuditError;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacity of the page report stream between workers and the service
const REPORT_CHANNEL_CAPACITY: usize = 100;

/// Rows deleted per retention batch
const RETENTION_BATCH_SIZE: usize = 1000;

/// Sink for live crawl progress messages
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, message: &str);
}

/// Progress message published for every persisted page report
#[derive(Debug, Clone, Serialize)]
pub struct CrawlEvent<'a> {
    pub crawl_id: i64,
    pub url: &'a str,
    pub status_code: u16,
    pub crawled: bool,
    pub blocked_by_robotstxt: bool,
    pub total_urls: u64,
}

/// Topic that progress messages of a project are published on
pub fn crawl_topic(project_id: i64) -> String {
    format!("crawl-{}", project_id)
}

pub struct CrawlerService<S> {
    storage: Arc<Mutex<S>>,
    client: Client,
    options: CrawlerOptions,
    report_manager: ReportManager<S>,
    publisher: Option<Arc<dyn Publisher>>,
    cleanup: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: Storage + Send + 'static> CrawlerService<S> {
    /// Creates a service with every built-in reporter registered
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared storage backend
    /// * `client` - HTTP client used for every request of every crawl
    /// * `options` - Crawler tuning
    pub fn new(storage: Arc<Mutex<S>>, client: Client, options: CrawlerOptions) -> Self {
        Self {
            report_manager: ReportManager::new(storage.clone()),
            storage,
            client,
            options,
            publisher: None,
            cleanup: Mutex::new(Vec::new()),
        }
    }

    /// Publishes a `CrawlEvent` for every page report
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Crawls a project and detects its issues
    ///
    /// An invalid project URL fails before any network activity. Once the
    /// crawl row exists, per-page persistence failures are logged and the
    /// page is skipped.
    ///
    /// # Arguments
    ///
    /// * `project` - A saved project
    ///
    /// # Returns
    ///
    /// * `Ok(Crawl)` - The finalized crawl
    /// * `Err(AuditError)` - The URL is invalid or the crawl row could not be written
    pub async fn start_crawler(&self, project: &Project) -> Result<Crawl, AuditError> {
        let start = parse_absolute(&project.url)?;

        let mut crawl = lock_storage(&self.storage)?.save_crawl(project)?;
        tracing::info!("Starting crawl {} of project {}", crawl.id, project.id);

        let crawler = Arc::new(Crawler::new(
            start,
            project.clone(),
            self.client.clone(),
            self.options.clone(),
        ));

        let (tx, mut rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(Arc::clone(&crawler).crawl(tx));

        let stream = self.report_manager.issue_stream(crawl.id);
        let topic = crawl_topic(project.id);

        while let Some(message) = rx.recv().await {
            let PageReportMessage {
                page_report,
                body,
                headers,
            } = message;

            crawl.record(&page_report);

            let saved = match lock_storage(&self.storage)
                .and_then(|mut storage| storage.save_page_report(&page_report, crawl.id))
            {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::warn!("Failed to save page report {}: {}", page_report.url, e);
                    continue;
                }
            };

            self.report_manager
                .create_page_issues(&saved, &body, &headers, &stream);
            self.publish(&topic, &crawl, &saved);
        }

        if let Err(e) = handle.await {
            tracing::error!("Crawler task failed: {}", e);
        }

        crawl.robotstxt_exists = crawler.robotstxt_exists();
        crawl.sitemap_exists = crawler.sitemap_exists();
        crawl.end = Some(Utc::now());
        let mut crawl = lock_storage(&self.storage)?.save_end_crawl(&crawl)?;

        tracing::info!(
            "Crawl {} finished: {} URLs, {} blocked by robots.txt, {} noindex",
            crawl.id,
            crawl.total_urls,
            crawl.blocked_by_robotstxt,
            crawl.noindex
        );

        match self.report_manager.create_issues(&crawl, stream).await {
            Ok(total) => {
                crawl.total_issues = total;
                crawl.issues_end = Some(Utc::now());
            }
            Err(e) => tracing::error!("Issue detection for crawl {} failed: {}", crawl.id, e),
        }

        let storage = self.storage.clone();
        let finished = crawl.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = delete_previous_crawl(storage, &finished).await {
                tracing::warn!("Failed to delete crawl preceding {}: {}", finished.id, e);
            }
        });
        match self.cleanup.lock() {
            Ok(mut tasks) => tasks.push(task),
            Err(poisoned) => poisoned.into_inner().push(task),
        }

        Ok(crawl)
    }

    /// Waits for every pending previous-crawl deletion to finish
    pub async fn wait_for_cleanup(&self) {
        let tasks = match self.cleanup.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Cleanup task failed: {}", e);
            }
        }
    }

    fn publish(&self, topic: &str, crawl: &Crawl, report: &PageReport) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let event = CrawlEvent {
            crawl_id: crawl.id,
            url: &report.url,
            status_code: report.status_code,
            crawled: report.crawled,
            blocked_by_robotstxt: report.blocked_by_robotstxt,
            total_urls: crawl.total_urls,
        };

        match serde_json::to_string(&event) {
            Ok(message) => publisher.publish(topic, &message),
            Err(e) => tracing::warn!("Failed to serialize crawl event: {}", e),
        }
    }
}

/// Deletes the crawl that preceded `crawl` in the same project
///
/// Page-level rows are removed in bounded batches, children before their
/// page reports, then the crawl row itself.
///
/// # Returns
///
/// The id of the deleted crawl, or `None` if there was no previous crawl
pub async fn delete_previous_crawl<S: Storage>(
    storage: Arc<Mutex<S>>,
    crawl: &Crawl,
) -> StorageResult<Option<i64>> {
    let previous = lock_storage(&storage)?.get_previous_crawl(crawl)?;
    let Some(previous) = previous else {
        return Ok(None);
    };

    let mut deleted = 0;
    loop {
        let batch = lock_storage(&storage)?.delete_crawl_data(previous.id, RETENTION_BATCH_SIZE)?;
        if batch == 0 {
            break;
        }
        deleted += batch;
        tokio::task::yield_now().await;
    }

    lock_storage(&storage)?.delete_crawl(previous.id)?;
    tracing::info!("Deleted crawl {} ({} rows)", previous.id, deleted);

    Ok(Some(previous.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagereport::PageReport;
    use crate::storage::SqliteStorage;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingPublisher {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, topic: &str, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), message.to_string()));
        }
    }

    fn storage_with_project(url: &str) -> (Arc<Mutex<SqliteStorage>>, Project) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let project = storage.save_project(&Project::new(url)).unwrap();
        (Arc::new(Mutex::new(storage)), project)
    }

    #[tokio::test]
    async fn test_invalid_url_fails_fast() {
        let (storage, project) = storage_with_project("ftp://example.com/");
        let service =
            CrawlerService::new(storage.clone(), Client::new(), CrawlerOptions::default());

        let result = service.start_crawler(&project).await;
        assert!(matches!(result, Err(AuditError::Url(_))));
        assert!(storage.lock().unwrap().get_last_crawl(project.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_crawl_publishes_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><head><title>Home</title></head></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let (storage, project) = storage_with_project(&format!("{}/", server.uri()));
        let publisher = Arc::new(RecordingPublisher::default());
        let service = CrawlerService::new(storage.clone(), Client::new(), CrawlerOptions::default())
            .with_publisher(publisher.clone());

        let crawl = service.start_crawler(&project).await.unwrap();
        assert_eq!(crawl.total_urls, 1);
        assert!(crawl.is_finished());

        let messages = publisher.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, crawl_topic(project.id));

        let event: serde_json::Value = serde_json::from_str(&messages[0].1).unwrap();
        assert_eq!(event["status_code"], 200);
        assert_eq!(event["crawled"], true);
    }

    #[tokio::test]
    async fn test_delete_previous_crawl() {
        let (storage, project) = storage_with_project("https://example.com/");

        let (first, second) = {
            let mut storage = storage.lock().unwrap();
            let first = storage.save_crawl(&project).unwrap();
            let url = Url::parse("https://example.com/").unwrap();
            storage.save_page_report(&PageReport::empty(&url), first.id).unwrap();
            let second = storage.save_crawl(&project).unwrap();
            (first, second)
        };

        let deleted = delete_previous_crawl(storage.clone(), &second).await.unwrap();
        assert_eq!(deleted, Some(first.id));

        let storage_ref = storage.lock().unwrap();
        assert_eq!(storage_ref.count_page_reports(first.id).unwrap(), 0);
        assert!(storage_ref.find_crawl_by_id(first.id).is_err());
        assert!(storage_ref.find_crawl_by_id(second.id).is_ok());
        drop(storage_ref);

        assert_eq!(delete_previous_crawl(storage, &second).await.unwrap(), None);
    }
}
