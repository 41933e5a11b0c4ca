//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching without redirect following, and charset decoding
//! - The frontier queue and the seen-URL set
//! - The worker-pool crawler
//! - Crawl orchestration, persistence and retention

#[allow(clippy::module_inception)]
mod crawler;
mod fetcher;
mod queue;
mod service;
mod url_storage;

pub use crawler::{Crawler, CrawlerOptions, PageReportMessage, QueuedUrl};
pub use fetcher::{build_http_client, decode_html, fetch_url, send_lookup, FetchResult};
pub use queue::{ProducerGuard, Queue};
pub use service::{crawl_topic, delete_previous_crawl, CrawlEvent, CrawlerService, Publisher};
pub use url_storage::UrlStorage;
