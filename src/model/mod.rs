//! Core data model shared by the crawler, the reporters and storage
//!
//! - `Project`: what to crawl and how
//! - `Crawl`: one execution of a project's crawl with its aggregate counters

mod crawl;
mod project;

pub use crawl::Crawl;
pub use project::{BasicAuth, Project};
