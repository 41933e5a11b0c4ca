//! HTTP header helpers for page analysis

/// One entry of an HTTP `Link` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHeader {
    /// The target between angle brackets, unresolved
    pub target: String,

    /// Parameters with lowercase names and unquoted values
    pub params: Vec<(String, String)>,
}

impl LinkHeader {
    /// Returns the value of a parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the `rel` parameter contains `rel` as a token
    pub fn has_rel(&self, rel: &str) -> bool {
        self.param("rel")
            .map(|value| {
                value
                    .split_whitespace()
                    .any(|token| token.eq_ignore_ascii_case(rel))
            })
            .unwrap_or(false)
    }
}

/// Parses an HTTP `Link` header value
///
/// # Example
///
/// ```
/// use sumi_audit::pagereport::parse_link_header;
///
/// let links = parse_link_header(
///     r#"<https://example.com/>; rel="canonical", </de>; rel="alternate"; hreflang="de""#,
/// );
/// assert_eq!(links.len(), 2);
/// assert!(links[0].has_rel("canonical"));
/// assert_eq!(links[1].param("hreflang"), Some("de"));
/// ```
pub fn parse_link_header(value: &str) -> Vec<LinkHeader> {
    let mut entries = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };

        let target = after[..end].trim().to_string();
        let tail = &after[end + 1..];
        let next = tail.find('<').unwrap_or(tail.len());

        let params = tail[..next]
            .split(';')
            .filter_map(|param| {
                let (key, value) = param.split_once('=')?;
                let value = value
                    .trim()
                    .trim_end_matches(',')
                    .trim()
                    .trim_matches('"')
                    .to_string();
                Some((key.trim().to_ascii_lowercase(), value))
            })
            .collect();

        entries.push(LinkHeader { target, params });
        rest = &tail[next..];
    }

    entries
}

/// Extracts `(noindex, nofollow)` from a robots meta content or `X-Robots-Tag` value
///
/// `none` implies both. A user-agent prefix (`googlebot: noindex`) is ignored.
pub fn robots_directives(value: &str) -> (bool, bool) {
    let mut noindex = false;
    let mut nofollow = false;

    for token in value.split(',') {
        let token = match token.rsplit_once(':') {
            Some((_, directive)) => directive,
            None => token,
        };

        match token.trim().to_ascii_lowercase().as_str() {
            "noindex" => noindex = true,
            "nofollow" => nofollow = true,
            "none" => {
                noindex = true;
                nofollow = true;
            }
            _ => {}
        }
    }

    (noindex, nofollow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_link_header() {
        let links = parse_link_header(r#"<https://example.com/page>; rel="canonical""#);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "https://example.com/page");
        assert!(links[0].has_rel("canonical"));
    }

    #[test]
    fn test_parse_multiple_link_headers() {
        let links = parse_link_header(
            r#"<https://example.com/en>; rel="alternate"; hreflang="en", <https://example.com/fr>; rel=alternate; hreflang=fr"#,
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].param("hreflang"), Some("en"));
        assert_eq!(links[1].param("hreflang"), Some("fr"));
        assert!(links[1].has_rel("alternate"));
    }

    #[test]
    fn test_parse_garbage_link_header() {
        assert!(parse_link_header("no brackets here").is_empty());
        assert!(parse_link_header("<unterminated").is_empty());
    }

    #[test]
    fn test_robots_directives() {
        assert_eq!(robots_directives("noindex, nofollow"), (true, true));
        assert_eq!(robots_directives("index, follow"), (false, false));
        assert_eq!(robots_directives("NOINDEX"), (true, false));
        assert_eq!(robots_directives("none"), (true, true));
        assert_eq!(robots_directives("googlebot: nofollow"), (false, true));
    }
}
