//! Sumi-Audit: an SEO crawler with issue detection
//!
//! This crate crawls a website from a start URL, analyzes every discovered
//! page into a `PageReport`, persists the reports and flags SEO issues both
//! per page and across the whole crawl.

pub mod config;
pub mod crawler;
pub mod issues;
pub mod model;
pub mod pagereport;
pub mod robots;
pub mod sitemap;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlerOptions, CrawlerService};
pub use issues::{ErrorType, IssueService, Priority, ReportManager};
pub use model::{Crawl, Project};
pub use pagereport::PageReport;
pub use storage::{SqliteStorage, Storage};
