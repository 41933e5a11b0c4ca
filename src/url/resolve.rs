use crate::UrlError;
use url::Url;

/// Resolves an href found on a page to an absolute http(s) URL
///
/// # Resolution Steps
///
/// 1. Trim surrounding whitespace; reject empty values
/// 2. Reject `javascript:`, `mailto:`, `tel:` and `data:` references
/// 3. Join against the page URL (relative paths, protocol-relative, absolute)
/// 4. Reject any scheme other than http and https
/// 5. Strip the fragment
///
/// The `url` crate already serializes an empty http(s) path as `/`.
///
/// # Examples
///
/// ```
/// use sumi_audit::url::absolutize;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/blog/post").unwrap();
/// let url = absolutize(&base, "../about#team").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about");
/// ```
pub fn absolutize(base: &Url, href: &str) -> Result<Url, UrlError> {
    let href = href.trim();

    if href.is_empty() {
        return Err(UrlError::Malformed("empty reference".to_string()));
    }

    let lowered = href.to_ascii_lowercase();
    for scheme in ["javascript:", "mailto:", "tel:", "data:"] {
        if lowered.starts_with(scheme) {
            return Err(UrlError::InvalidScheme(scheme.trim_end_matches(':').to_string()));
        }
    }

    let mut url = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    Ok(url)
}

/// Parses an absolute http(s) URL, stripping its fragment
pub fn parse_absolute(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_relative_link() {
        let url = absolutize(&base_url(), "/other").unwrap();
        assert_eq!(url.as_str(), "https://example.com/other");
    }

    #[test]
    fn test_relative_path_link() {
        let url = absolutize(&base_url(), "other").unwrap();
        assert_eq!(url.as_str(), "https://example.com/other");
    }

    #[test]
    fn test_protocol_relative_link() {
        let url = absolutize(&base_url(), "//cdn.example.com/app.js").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/app.js");
    }

    #[test]
    fn test_fragment_is_stripped() {
        let url = absolutize(&base_url(), "/docs#intro").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs");
    }

    #[test]
    fn test_fragment_only_resolves_to_page() {
        let url = absolutize(&base_url(), "#section").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_empty_path_defaults_to_root() {
        let url = absolutize(&base_url(), "https://other.com").unwrap();
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn test_rejects_special_schemes() {
        assert!(absolutize(&base_url(), "javascript:void(0)").is_err());
        assert!(absolutize(&base_url(), "mailto:test@example.com").is_err());
        assert!(absolutize(&base_url(), "tel:+1234567890").is_err());
        assert!(absolutize(&base_url(), "data:text/html,<h1>x</h1>").is_err());
        assert!(absolutize(&base_url(), "ftp://example.com/file").is_err());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(absolutize(&base_url(), "   ").is_err());
    }

    #[test]
    fn test_parse_absolute() {
        let url = parse_absolute(" https://example.com/a#b ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
        assert!(parse_absolute("/relative").is_err());
        assert!(parse_absolute("ftp://example.com/").is_err());
    }
}
