use crate::config::ProjectConfig;
use crate::url::matches_domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Basic-Auth credentials restricted to a set of domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,

    /// Domain patterns the credentials may be sent to (`*.example.com` allowed)
    pub domains: Vec<String>,
}

impl BasicAuth {
    /// Returns true if the credentials should be attached to a request for `url`
    pub fn applies_to(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        self.domains
            .iter()
            .any(|pattern| matches_domain(pattern, host))
    }
}

/// Crawl configuration for one website
#[derive(Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub url: String,
    pub ignore_robots_txt: bool,
    pub follow_nofollow: bool,
    pub include_noindex: bool,
    pub crawl_sitemap: bool,
    pub allow_subdomains: bool,
    pub basic_auth: Option<BasicAuth>,
    pub created: DateTime<Utc>,
}

impl Project {
    /// Creates an unsaved project for `url` with every option disabled
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: 0,
            url: url.into(),
            ignore_robots_txt: false,
            follow_nofollow: false,
            include_noindex: false,
            crawl_sitemap: false,
            allow_subdomains: false,
            basic_auth: None,
            created: Utc::now(),
        }
    }

    /// Builds an unsaved project from the `[project]` config section
    pub fn from_config(config: &ProjectConfig) -> Self {
        let basic_auth = config.basic_auth.as_ref().map(|auth| BasicAuth {
            username: auth.username.clone(),
            password: auth.password.clone(),
            domains: auth.domains.clone(),
        });

        Self {
            id: 0,
            url: config.url.clone(),
            ignore_robots_txt: config.ignore_robots_txt,
            follow_nofollow: config.follow_nofollow,
            include_noindex: config.include_noindex,
            crawl_sitemap: config.crawl_sitemap,
            allow_subdomains: config.allow_subdomains,
            basic_auth,
            created: Utc::now(),
        }
    }
}
