//! Robots.txt parser implementation
//!
//! Matching is delegated to the robotstxt crate. `Sitemap:` lines are not
//! group-scoped, so they are collected with a plain line scan.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one host
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,

    /// Absolute sitemap URLs advertised with `Sitemap:` lines
    sitemaps: Vec<String>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    ///
    /// # Returns
    ///
    /// A ParsedRobots instance that can be used to check URL permissions
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            sitemaps: parse_sitemap_lines(content),
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check, absolute or a path (e.g., "/page.html")
    /// * `user_agent` - The product token of the crawler
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns the sitemaps declared in the file, in declaration order
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Collects the values of `Sitemap:` lines, de-duplicated
fn parse_sitemap_lines(content: &str) -> Vec<String> {
    let mut sitemaps: Vec<String> = Vec::new();

    for line in content.lines() {
        // Strip trailing comments
        let line = line.split('#').next().unwrap_or("").trim();

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        if !key.trim().eq_ignore_ascii_case("sitemap") {
            continue;
        }

        let value = value.trim().to_string();
        if !value.is_empty() && !sitemaps.contains(&value) {
            sitemaps.push(value);
        }
    }

    sitemaps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disallow_all() {
        let content = "User-agent: *\nDisallow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/", "TestBot"));
        assert!(!robots.is_allowed("https://example.com/page", "TestBot"));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let content = "User-agent: *\nDisallow: /disallowed";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed("https://example.com/", "TestBot"));
        assert!(robots.is_allowed("https://example.com/allowed", "TestBot"));
        assert!(!robots.is_allowed("https://example.com/disallowed", "TestBot"));
        assert!(!robots.is_allowed("https://example.com/disallowed/deeper", "TestBot"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let content = "User-agent: *\nDisallow: /private\nAllow: /private/public";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/private", "TestBot"));
        assert!(robots.is_allowed("/private/public", "TestBot"));
    }

    #[test]
    fn test_parse_specific_user_agent() {
        let content = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed("/page", "GoodBot"));
        assert!(!robots.is_allowed("/page", "BadBot"));
    }

    #[test]
    fn test_invalid_and_empty_robots_txt() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed("/any/path", "TestBot"));

        let robots = ParsedRobots::from_content("");
        assert!(robots.is_allowed("/any/path", "TestBot"));
    }

    #[test]
    fn test_sitemap_lines() {
        let content = "User-agent: *\nDisallow:\n\
            Sitemap: https://example.com/sitemap-a.xml\n\
            sitemap:https://example.com/sitemap-b.xml # news\n\
            SITEMAP: https://example.com/sitemap-a.xml\n";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(
            robots.sitemaps(),
            &[
                "https://example.com/sitemap-a.xml".to_string(),
                "https://example.com/sitemap-b.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_sitemaps() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.sitemaps().is_empty());
    }
}
