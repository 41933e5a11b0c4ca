//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::issues::{CrawlSnapshot, ErrorType, Issue};
use crate::model::{Crawl, Project};
use crate::pagereport::PageReport;
use crate::storage::PageReportRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    #[error("Crawl not found: {0}")]
    CrawlNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every database operation needed by the crawler, the
/// reporters and the issue service. Callers share one backend behind a
/// mutex; no method is expected to block for long.
pub trait Storage {
    // ===== Projects =====

    /// Inserts a project, or updates it when `project.id` is set
    ///
    /// # Returns
    ///
    /// The project with its id assigned
    fn save_project(&mut self, project: &Project) -> StorageResult<Project>;

    fn find_project_by_id(&self, id: i64) -> StorageResult<Project>;

    /// Finds the most recently created project with the given start URL
    fn find_project_by_url(&self, url: &str) -> StorageResult<Option<Project>>;

    // ===== Crawls =====

    /// Creates the crawl row for a new crawl of `project`, started now
    fn save_crawl(&mut self, project: &Project) -> StorageResult<Crawl>;

    /// Persists the final counters, flags and end time of a crawl
    fn save_end_crawl(&mut self, crawl: &Crawl) -> StorageResult<Crawl>;

    fn find_crawl_by_id(&self, id: i64) -> StorageResult<Crawl>;

    /// Gets the most recent finished crawl of a project
    fn get_last_crawl(&self, project_id: i64) -> StorageResult<Option<Crawl>>;

    /// Gets up to `limit` finished crawls of a project, most recent first
    fn get_last_crawls(&self, project_id: i64, limit: usize) -> StorageResult<Vec<Crawl>>;

    /// Gets the crawl of the same project that preceded `crawl`
    fn get_previous_crawl(&self, crawl: &Crawl) -> StorageResult<Option<Crawl>>;

    /// Deletes one bounded batch of a crawl's page-level rows
    ///
    /// # Returns
    ///
    /// The number of rows deleted; 0 once nothing is left
    fn delete_crawl_data(&mut self, crawl_id: i64, batch: usize) -> StorageResult<usize>;

    /// Deletes the crawl row itself; its page-level rows must be gone
    fn delete_crawl(&mut self, crawl_id: i64) -> StorageResult<()>;

    // ===== Page Reports =====

    /// Persists a page report and all of its child rows
    ///
    /// # Returns
    ///
    /// The report with its id assigned
    fn save_page_report(&mut self, report: &PageReport, crawl_id: i64) -> StorageResult<PageReport>;

    fn count_page_reports(&self, crawl_id: i64) -> StorageResult<u64>;

    /// Loads the rows scanned by the multipage reporters
    fn load_crawl_snapshot(&self, crawl_id: i64) -> StorageResult<CrawlSnapshot>;

    // ===== Issues =====

    /// Bulk-inserts issues
    fn save_issues(&mut self, issues: &[Issue]) -> StorageResult<usize>;

    /// Records that issue detection finished for a crawl
    fn save_issues_end(&mut self, crawl_id: i64, total_issues: u64) -> StorageResult<()>;

    /// Number of issues per error type, for types with at least one issue
    fn count_issues_by_type(&self, crawl_id: i64) -> StorageResult<Vec<(ErrorType, u64)>>;

    /// Page reports flagged with an error type, ordered by id
    fn find_page_reports_by_issue(
        &self,
        crawl_id: i64,
        error_type: ErrorType,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<PageReportRecord>>;

    fn count_page_reports_by_issue(
        &self,
        crawl_id: i64,
        error_type: ErrorType,
    ) -> StorageResult<u64>;
}
