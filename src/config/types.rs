use serde::Deserialize;

/// Main configuration structure for Sumi-Audit
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub project: ProjectConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Ceiling on the number of crawled page reports per crawl
    #[serde(rename = "max-page-reports", default = "default_max_page_reports")]
    pub max_page_reports: usize,

    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_max_page_reports() -> usize {
    20_000
}

fn default_workers() -> usize {
    2
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_page_reports: default_max_page_reports(),
            workers: default_workers(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the token matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// The website to audit
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Start URL of the crawl
    pub url: String,

    #[serde(rename = "ignore-robots-txt", default)]
    pub ignore_robots_txt: bool,

    #[serde(rename = "follow-nofollow", default)]
    pub follow_nofollow: bool,

    #[serde(rename = "include-noindex", default)]
    pub include_noindex: bool,

    #[serde(rename = "crawl-sitemap", default)]
    pub crawl_sitemap: bool,

    #[serde(rename = "allow-subdomains", default)]
    pub allow_subdomains: bool,

    #[serde(rename = "basic-auth")]
    pub basic_auth: Option<BasicAuthConfig>,
}

/// Basic-Auth credentials and the domains they may be sent to
#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,

    /// Domain patterns (e.g., "example.com" or "*.example.com")
    #[serde(default)]
    pub domains: Vec<String>,
}
