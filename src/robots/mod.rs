//! Robots.txt handling module
//!
//! `RobotsChecker` fetches robots.txt once per origin and caches the parsed
//! result for the rest of the crawl. Redirects are followed. A failed fetch or
//! a non-2xx final response is cached as "no robots.txt", which blocks nothing.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::send_lookup;
use reqwest::{Client, Method};
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::Url;

/// Host-keyed robots.txt cache
///
/// The cache sits behind a single lock that is held across the fetch, so a
/// slow robots.txt for one host stalls lookups for others until it returns.
pub struct RobotsChecker {
    client: Client,

    /// Product token matched against `User-agent` groups
    user_agent: String,

    /// `None` records a host without a usable robots.txt
    cache: Mutex<HashMap<String, Option<ParsedRobots>>>,
}

impl RobotsChecker {
    /// Creates a new checker
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to fetch robots.txt files
    /// * `user_agent` - Crawler name matched against robots.txt groups
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if robots.txt for the URL's host disallows the URL
    pub async fn is_blocked(&self, url: &Url) -> bool {
        self.with_robots(url, |robots| match robots {
            Some(robots) => !robots.is_allowed(url.as_str(), &self.user_agent),
            None => false,
        })
        .await
    }

    /// Returns true if the URL's host serves a robots.txt with a 2xx status
    pub async fn exists(&self, url: &Url) -> bool {
        self.with_robots(url, |robots| robots.is_some()).await
    }

    /// Returns the sitemaps declared in the host's robots.txt
    pub async fn get_sitemaps(&self, url: &Url) -> Vec<String> {
        self.with_robots(url, |robots| {
            robots
                .map(|r| r.sitemaps().to_vec())
                .unwrap_or_default()
        })
        .await
    }

    /// Runs `f` against the cached robots data for the URL's origin,
    /// fetching it first if needed
    async fn with_robots<T>(&self, url: &Url, f: impl FnOnce(Option<&ParsedRobots>) -> T) -> T {
        let origin = url.origin().ascii_serialization();
        let mut cache = self.cache.lock().await;

        if !cache.contains_key(&origin) {
            let robots = self.fetch(&origin).await;
            cache.insert(origin.clone(), robots);
        }

        f(cache.get(&origin).and_then(|r| r.as_ref()))
    }

    async fn fetch(&self, origin: &str) -> Option<ParsedRobots> {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!("Fetching {}", robots_url);

        let response = match send_lookup(&self.client, Method::GET, &robots_url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("robots.txt fetch failed for {}: {}", origin, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "robots.txt for {} returned {}",
                origin,
                response.status().as_u16()
            );
            return None;
        }

        match response.text().await {
            Ok(content) => Some(ParsedRobots::from_content(&content)),
            Err(e) => {
                tracing::warn!("Failed to read robots.txt for {}: {}", origin, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::redirect::Policy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn checker_for(server: &MockServer) -> (RobotsChecker, Url) {
        let base = Url::parse(&server.uri()).unwrap();
        let client = Client::builder().redirect(Policy::none()).build().unwrap();
        (RobotsChecker::new(client, "TestBot"), base)
    }

    #[tokio::test]
    async fn test_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "User-agent: *\nDisallow: /disallowed\nSitemap: https://example.com/sitemap.xml\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (checker, base) = checker_for(&server).await;

        assert!(checker.is_blocked(&base.join("/disallowed").unwrap()).await);
        assert!(!checker.is_blocked(&base.join("/allowed").unwrap()).await);
        assert!(checker.exists(&base).await);
        assert_eq!(
            checker.get_sitemaps(&base).await,
            vec!["https://example.com/sitemap.xml".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_robots_is_permissive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (checker, base) = checker_for(&server).await;

        assert!(!checker.exists(&base).await);
        assert!(!checker.is_blocked(&base.join("/anything").unwrap()).await);
        assert!(checker.get_sitemaps(&base).await.is_empty());
    }

    #[tokio::test]
    async fn test_redirected_robots_is_honored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/robots-real.txt"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/robots-real.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (checker, base) = checker_for(&server).await;

        assert!(checker.exists(&base).await);
        assert!(checker.is_blocked(&base.join("/private").unwrap()).await);
        assert!(!checker.is_blocked(&base.join("/public").unwrap()).await);
    }

    #[tokio::test]
    async fn test_endless_redirects_count_as_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/robots.txt"))
            .mount(&server)
            .await;

        let (checker, base) = checker_for(&server).await;

        assert!(!checker.exists(&base).await);
        assert!(!checker.is_blocked(&base.join("/anything").unwrap()).await);
    }
}
