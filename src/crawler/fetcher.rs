//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests that leave redirects to the analyzer
//! - Basic-Auth scoped to configured domains
//! - Charset-aware decoding of HTML bodies
//! - Redirect-following lookups for robots.txt and sitemaps
//! - Error classification

use crate::config::UserAgentConfig;
use crate::model::BasicAuth;
use crate::pagereport::{media_type, HTML_MEDIA_TYPE};
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Method, Response};
use std::time::Duration;
use url::Url;

/// Leading bytes of a body searched for a `<meta>` charset declaration
const CHARSET_SNIFF_LEN: usize = 1024;

/// Redirect hops followed by robots.txt and sitemap lookups
const MAX_LOOKUP_REDIRECTS: usize = 5;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// A response was received, whatever its status
    Response {
        /// HTTP status code
        status: u16,
        /// Response headers
        headers: HeaderMap,
        /// Decoded body for HTML responses, empty otherwise
        body: String,
    },

    /// The request timed out
    Timeout,

    /// Network error (DNS, connection refused, TLS, ...)
    NetworkError(String),
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed: a 3xx response is analyzed as a page of its
/// own and its target is discovered like any other link.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_audit::config::UserAgentConfig;
/// use sumi_audit::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiAudit".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL
///
/// The body is only read for HTML responses and is decoded with
/// [`decode_html`].
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `auth` - Basic-Auth credentials, sent only if they apply to the URL's host
pub async fn fetch_url(client: &Client, url: &Url, auth: Option<&BasicAuth>) -> FetchResult {
    let mut request = client.get(url.clone());

    if let Some(auth) = auth.filter(|a| a.applies_to(url)) {
        request = request.basic_auth(&auth.username, Some(&auth.password));
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return classify_error(url, e),
    };

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let is_html = content_type
        .map(|v| media_type(v) == HTML_MEDIA_TYPE)
        .unwrap_or(false);

    let body = if is_html {
        match response.bytes().await {
            Ok(bytes) => decode_html(&bytes, content_type),
            Err(e) => return classify_error(url, e),
        }
    } else {
        String::new()
    };

    FetchResult::Response {
        status,
        headers,
        body,
    }
}

/// Decodes an HTML body to text
///
/// The encoding is taken from the `Content-Type` charset, then from a
/// `<meta>` declaration in the first 1024 bytes, then from a byte order
/// mark. Bodies with none of these are read as UTF-8. Malformed sequences
/// become U+FFFD.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let prefix = &bytes[..bytes.len().min(CHARSET_SNIFF_LEN)];

    let encoding = content_type
        .and_then(header_charset)
        .or_else(|| meta_charset(prefix))
        .or_else(|| Encoding::for_bom(bytes).map(|(encoding, _)| encoding))
        .unwrap_or(UTF_8);

    let (text, _) = encoding.decode_with_bom_removal(bytes);
    text.into_owned()
}

/// Encoding named by the `charset` parameter of a `Content-Type` value
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| {
            let label = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
            Encoding::for_label(label.as_bytes())
        })
}

/// Encoding declared by `<meta charset>` or `<meta http-equiv content>`
///
/// UTF-16 labels are read as UTF-8.
fn meta_charset(prefix: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(prefix).to_ascii_lowercase();

    head.match_indices("<meta")
        .filter_map(|(start, _)| {
            let tag = &head[start..];
            let tag = &tag[..tag.find('>').unwrap_or(tag.len())];
            charset_value(tag)
        })
        .find_map(|label| Encoding::for_label(label.as_bytes()))
        .map(Encoding::output_encoding)
}

/// Value following `charset=` inside a lowercased tag
fn charset_value(tag: &str) -> Option<&str> {
    let (_, rest) = tag.split_once("charset")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let rest = rest.trim_start_matches(|c: char| c == '"' || c == '\'');

    let end = rest
        .find(|c: char| c == '"' || c == '\'' || c == ';' || c == '/' || c.is_whitespace())
        .unwrap_or(rest.len());

    (end > 0).then(|| &rest[..end])
}

/// Sends a robots.txt or sitemap request, following up to five redirects
///
/// The crawler's client leaves redirects unresolved, so the hops are
/// followed here. A chain that is still redirecting after the last hop is
/// returned as is.
pub async fn send_lookup(
    client: &Client,
    method: Method,
    url: &str,
) -> Result<Response, reqwest::Error> {
    let mut target = url.to_string();

    for _ in 0..MAX_LOOKUP_REDIRECTS {
        let response = client.request(method.clone(), &target).send().await?;

        let next = if response.status().is_redirection() {
            redirect_target(&response)
        } else {
            None
        };

        match next {
            Some(next) => {
                tracing::debug!("{} redirected to {}", target, next);
                target = next.to_string();
            }
            None => return Ok(response),
        }
    }

    client.request(method, &target).send().await
}

fn redirect_target(response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

fn classify_error(url: &Url, e: reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        tracing::debug!("Timeout fetching {}", url);
        FetchResult::Timeout
    } else {
        tracing::debug!("Network error fetching {}: {}", url, e);
        FetchResult::NetworkError(e.to_string())
    }
}
