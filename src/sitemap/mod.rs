//! Sitemap discovery and parsing
//!
//! Sitemaps are read with the sitemap crate's streaming reader. One level of
//! sitemap-index indirection is resolved: an index expands to its listed
//! sitemaps, which are then read as leaves.

use crate::crawler::send_lookup;
use reqwest::{Client, Method};
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::io::Cursor;
use url::Url;

/// Probes and parses sitemaps over HTTP
pub struct SitemapChecker {
    client: Client,
}

/// Entries of one sitemap document
#[derive(Debug, Default, PartialEq, Eq)]
struct SitemapEntries {
    /// `<url><loc>` values
    urls: Vec<String>,

    /// `<sitemap><loc>` values of a sitemap index
    sitemaps: Vec<String>,
}

impl SitemapChecker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns true if any of the candidate sitemaps answers a HEAD with 2xx,
    /// after redirects
    pub async fn sitemap_exists(&self, urls: &[String]) -> bool {
        for url in urls {
            match send_lookup(&self.client, Method::HEAD, url).await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => {
                    tracing::debug!("Sitemap HEAD {} returned {}", url, response.status().as_u16())
                }
                Err(e) => tracing::debug!("Sitemap HEAD {} failed: {}", url, e),
            }
        }

        false
    }

    /// Streams every page URL listed in the given sitemaps to `callback`
    ///
    /// # Arguments
    ///
    /// * `urls` - Seed sitemaps, either leaf sitemaps or sitemap indexes
    /// * `callback` - Invoked once per `<url>` location, in document order
    pub async fn parse_sitemaps<F>(&self, urls: &[String], mut callback: F)
    where
        F: FnMut(String),
    {
        for seed in urls {
            let Some(entries) = self.fetch(seed).await else {
                continue;
            };

            entries.urls.into_iter().for_each(&mut callback);

            for leaf in entries.sitemaps {
                if let Some(leaf_entries) = self.fetch(&leaf).await {
                    leaf_entries.urls.into_iter().for_each(&mut callback);
                }
            }
        }
    }

    async fn fetch(&self, url: &str) -> Option<SitemapEntries> {
        let response = match send_lookup(&self.client, Method::GET, url).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("Sitemap {} returned {}", url, response.status().as_u16());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch sitemap {}: {}", url, e);
                return None;
            }
        };

        match response.bytes().await {
            Ok(body) => Some(read_entries(&body)),
            Err(e) => {
                tracing::warn!("Failed to read sitemap {}: {}", url, e);
                None
            }
        }
    }
}

/// Builds the seed list: the site's default `/sitemap.xml` followed by the
/// sitemaps advertised in robots.txt, without duplicates
pub fn sitemap_seeds(start: &Url, robots_sitemaps: &[String]) -> Vec<String> {
    let mut seeds = vec![format!("{}/sitemap.xml", start.origin().ascii_serialization())];

    for sitemap in robots_sitemaps {
        if !seeds.contains(sitemap) {
            seeds.push(sitemap.clone());
        }
    }

    seeds
}

fn read_entries(xml: &[u8]) -> SitemapEntries {
    let mut entries = SitemapEntries::default();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    entries.urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    entries.sitemaps.push(url.to_string());
                }
            }
            SiteMapEntity::Err(e) => tracing::debug!("Sitemap entry error: {:?}", e),
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urlset(locs: &[String]) -> String {
        let entries: String = locs
            .iter()
            .map(|l| format!("<url><loc>{}</loc></url>", l))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            entries
        )
    }

    #[test]
    fn test_read_leaf_entries() {
        let xml = urlset(&["https://example.com/a".into(), "https://example.com/b".into()]);
        let entries = read_entries(xml.as_bytes());
        assert_eq!(entries.urls, vec!["https://example.com/a", "https://example.com/b"]);
        assert!(entries.sitemaps.is_empty());
    }

    #[test]
    fn test_seeds_are_deduplicated() {
        let start = Url::parse("https://example.com/blog/").unwrap();
        let seeds = sitemap_seeds(
            &start,
            &[
                "https://example.com/sitemap.xml".to_string(),
                "https://example.com/news.xml".to_string(),
            ],
        );
        assert_eq!(
            seeds,
            vec!["https://example.com/sitemap.xml", "https://example.com/news.xml"]
        );
    }

    #[tokio::test]
    async fn test_sitemap_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let checker = SitemapChecker::new(Client::new());
        let missing = format!("{}/missing.xml", server.uri());
        let present = format!("{}/sitemap.xml", server.uri());

        assert!(!checker.sitemap_exists(&[missing.clone()]).await);
        assert!(checker.sitemap_exists(&[missing, present]).await);
    }

    #[tokio::test]
    async fn test_parse_sitemap_index() {
        let server = MockServer::start().await;
        let base = server.uri();

        let index = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><sitemap><loc>{base}/pages.xml</loc></sitemap><sitemap><loc>{base}/posts.xml</loc></sitemap></sitemapindex>"#
        );

        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pages.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/a")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[
                format!("{base}/b"),
                format!("{base}/c"),
            ])))
            .mount(&server)
            .await;

        let checker = SitemapChecker::new(Client::new());
        let mut found = Vec::new();
        checker
            .parse_sitemaps(&[format!("{base}/sitemap.xml")], |url| found.push(url))
            .await;

        assert_eq!(
            found,
            vec![format!("{base}/a"), format!("{base}/b"), format!("{base}/c")]
        );
    }

    #[tokio::test]
    async fn test_redirected_sitemap_is_followed() {
        let server = MockServer::start().await;
        let base = server.uri();

        for verb in ["HEAD", "GET"] {
            Mock::given(method(verb))
                .and(path("/sitemap.xml"))
                .respond_with(ResponseTemplate::new(301).insert_header("location", "/moved.xml"))
                .mount(&server)
                .await;
        }
        Mock::given(method("HEAD"))
            .and(path("/moved.xml"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/moved.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/a")])),
            )
            .mount(&server)
            .await;

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        let checker = SitemapChecker::new(client);
        let seeds = [format!("{base}/sitemap.xml")];

        assert!(checker.sitemap_exists(&seeds).await);

        let mut found = Vec::new();
        checker.parse_sitemaps(&seeds, |url| found.push(url)).await;
        assert_eq!(found, vec![format!("{base}/a")]);
    }
}
