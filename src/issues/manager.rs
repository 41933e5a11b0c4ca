//! Reporter registry and the single issue writer
//!
//! Page issues are emitted while reports stream in, multipage issues once the
//! crawl is persisted. Both go through the same `IssueStream`, which owns the
//! only task that inserts issues into storage.

use crate::issues::{
    default_multipage_reporters, default_page_reporters, Issue, MultipageIssueReporter,
    PageIssueReporter,
};
use crate::model::Crawl;
use crate::pagereport::PageReport;
use crate::storage::{lock_storage, Storage, StorageError, StorageResult};
use reqwest::header::HeaderMap;
use scraper::Html;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Maximum number of issues inserted per storage transaction
const ISSUE_BATCH_SIZE: usize = 500;

/// Sending side of a crawl's issue writer
pub struct IssueStream {
    crawl_id: i64,
    tx: mpsc::UnboundedSender<Issue>,
    writer: JoinHandle<u64>,
}

impl IssueStream {
    fn send(&self, issue: Issue) {
        if self.tx.send(issue).is_err() {
            tracing::warn!("Issue writer for crawl {} has stopped", self.crawl_id);
        }
    }

    /// Closes the stream and waits for the writer to drain it
    ///
    /// # Returns
    ///
    /// The number of issues persisted
    async fn finish(self) -> StorageResult<u64> {
        drop(self.tx);
        self.writer
            .await
            .map_err(|e| StorageError::Database(format!("issue writer failed: {}", e)))
    }
}

/// Runs every registered reporter and persists the resulting issues
pub struct ReportManager<S> {
    storage: Arc<Mutex<S>>,
    page_reporters: Vec<PageIssueReporter>,
    multipage_reporters: Vec<MultipageIssueReporter>,
}

impl<S: Storage + Send + 'static> ReportManager<S> {
    /// Creates a manager with every built-in reporter registered
    pub fn new(storage: Arc<Mutex<S>>) -> Self {
        Self::with_reporters(storage, default_page_reporters(), default_multipage_reporters())
    }

    pub fn with_reporters(
        storage: Arc<Mutex<S>>,
        page_reporters: Vec<PageIssueReporter>,
        multipage_reporters: Vec<MultipageIssueReporter>,
    ) -> Self {
        Self {
            storage,
            page_reporters,
            multipage_reporters,
        }
    }

    /// Spawns the issue writer for a crawl
    ///
    /// Must be called from within a tokio runtime.
    pub fn issue_stream(&self, crawl_id: i64) -> IssueStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_issues(self.storage.clone(), crawl_id, rx));

        IssueStream {
            crawl_id,
            tx,
            writer,
        }
    }

    /// Runs every page reporter against one persisted page report
    ///
    /// # Arguments
    ///
    /// * `report` - The page report, with its storage id assigned
    /// * `body` - Raw response body, empty when the page was not fetched
    /// * `headers` - Response headers
    /// * `stream` - The crawl's issue stream
    ///
    /// # Returns
    ///
    /// The number of issues emitted
    pub fn create_page_issues(
        &self,
        report: &PageReport,
        body: &str,
        headers: &HeaderMap,
        stream: &IssueStream,
    ) -> usize {
        let document = Html::parse_document(body);
        let mut emitted = 0;

        for reporter in &self.page_reporters {
            if reporter.check(report, &document, headers) {
                stream.send(Issue {
                    page_report_id: report.id,
                    crawl_id: stream.crawl_id,
                    error_type: reporter.error_type,
                });
                emitted += 1;
            }
        }

        emitted
    }

    /// Runs every multipage reporter, then closes the crawl's issue stream
    ///
    /// Waits for all page and multipage issues to be written and records the
    /// end of issue detection on the crawl.
    ///
    /// # Returns
    ///
    /// The total number of issues persisted for the crawl
    pub async fn create_issues(&self, crawl: &Crawl, stream: IssueStream) -> StorageResult<u64> {
        let snapshot = match lock_storage(&self.storage)
            .and_then(|storage| storage.load_crawl_snapshot(crawl.id))
        {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::error!("Failed to load crawl {} for multipage reporters: {}", crawl.id, e);
                None
            }
        };

        if let Some(snapshot) = snapshot {
            for reporter in &self.multipage_reporters {
                let ids = reporter.scan(&snapshot);
                tracing::debug!("{:?}: {} pages", reporter.error_type, ids.len());

                for page_report_id in ids {
                    stream.send(Issue {
                        page_report_id,
                        crawl_id: crawl.id,
                        error_type: reporter.error_type,
                    });
                }
            }
        }

        let total = stream.finish().await?;

        lock_storage(&self.storage)?.save_issues_end(crawl.id, total)?;
        tracing::info!("Crawl {}: {} issues", crawl.id, total);

        Ok(total)
    }
}

/// Drains the issue channel in batches until every sender is gone
async fn write_issues<S: Storage>(
    storage: Arc<Mutex<S>>,
    crawl_id: i64,
    mut rx: mpsc::UnboundedReceiver<Issue>,
) -> u64 {
    let mut total = 0;
    let mut batch = Vec::with_capacity(ISSUE_BATCH_SIZE);

    while let Some(issue) = rx.recv().await {
        batch.push(issue);
        while batch.len() < ISSUE_BATCH_SIZE {
            match rx.try_recv() {
                Ok(issue) => batch.push(issue),
                Err(_) => break,
            }
        }

        match lock_storage(&storage).and_then(|mut storage| storage.save_issues(&batch)) {
            Ok(saved) => total += saved as u64,
            Err(e) => tracing::warn!(
                "Dropping {} issues of crawl {}: {}",
                batch.len(),
                crawl_id,
                e
            ),
        }
        batch.clear();
    }

    total
}
