//! URL handling module for Sumi-Audit
//!
//! This module provides absolute-URL resolution, the hash used as the
//! relational join key between page reports, and host scoping helpers.

mod hash;
mod resolve;

pub use hash::url_hash;
pub use resolve::{absolutize, parse_absolute};

use url::Url;

/// Returns true if both URLs point at the same host
///
/// Links are classified as internal or external by this comparison.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Checks if a host matches a domain pattern
///
/// Patterns are either an exact host (`example.com`) or a wildcard
/// (`*.example.com`) that matches the bare domain and every subdomain.
///
/// # Examples
///
/// ```
/// use sumi_audit::url::matches_domain;
///
/// assert!(matches_domain("example.com", "example.com"));
/// assert!(matches_domain("*.example.com", "api.v2.example.com"));
/// assert!(!matches_domain("*.example.com", "example.org"));
/// ```
pub fn matches_domain(pattern: &str, host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}

/// Decides whether a discovered URL belongs to the crawl's scope
///
/// The start URL's host is always in scope. With `allow_subdomains`, any
/// subdomain of the start host (ignoring a leading `www.`) is too.
pub fn in_crawl_scope(start: &Url, candidate: &Url, allow_subdomains: bool) -> bool {
    let (Some(start_host), Some(host)) = (start.host_str(), candidate.host_str()) else {
        return false;
    };

    if start_host.eq_ignore_ascii_case(host) {
        return true;
    }

    if !allow_subdomains {
        return false;
    }

    let base = start_host.strip_prefix("www.").unwrap_or(start_host);
    matches_domain(&format!("*.{}", base), host)
}
