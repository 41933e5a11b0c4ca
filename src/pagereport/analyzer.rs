//! Builds a `PageReport` from an HTTP response
//!
//! Redirect responses only resolve their target. HTML responses are parsed
//! and every SEO-relevant fact is extracted with structural queries over the
//! DOM. Every URL found is resolved against the page URL; references that
//! cannot be resolved to an http(s) URL are dropped.

use crate::pagereport::content::{count_words, headings_in_order};
use crate::pagereport::headers::{parse_link_header, robots_directives};
use crate::pagereport::{Hreflang, Image, Link, PageReport};
use crate::url::{absolutize, same_host};
use crate::UrlError;
use reqwest::header::{HeaderMap, CONTENT_LANGUAGE, CONTENT_TYPE, LINK, LOCATION};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracts the lowercase media type from a `Content-Type` value
///
/// ```
/// use sumi_audit::pagereport::media_type;
///
/// assert_eq!(media_type("Text/HTML; charset=UTF-8"), "text/html");
/// ```
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Analyzes a fetched response
///
/// # Arguments
///
/// * `url` - The URL that was fetched
/// * `status` - HTTP status code
/// * `headers` - Response headers
/// * `body` - Decoded response body (empty for non-HTML responses)
///
/// # Returns
///
/// * `Ok(PageReport)` - The analysis result
/// * `Err(UrlError)` - The page URL itself is not http(s)
pub fn new_page_report(
    url: &Url,
    status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Result<PageReport, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let mut report = PageReport::empty(url);
    report.status_code = status;
    report.content_type = header_value(headers, CONTENT_TYPE.as_str()).unwrap_or_default();
    report.media_type = media_type(&report.content_type);
    report.size = body.len();

    if report.is_redirect() {
        if let Some(location) = header_value(headers, LOCATION.as_str()) {
            match absolutize(&report.parsed_url, &location) {
                Ok(target) => report.set_redirect(&target),
                Err(e) => tracing::debug!("Invalid redirect target on {}: {}", report.url, e),
            }
        }
        return Ok(report);
    }

    for value in headers.get_all("x-robots-tag") {
        if let Ok(value) = value.to_str() {
            let (noindex, nofollow) = robots_directives(value);
            report.noindex |= noindex;
            report.nofollow |= nofollow;
        }
    }

    if report.is_html() {
        let document = Html::parse_document(body);
        analyze_html(&mut report, &document, headers);
    }

    Ok(report)
}

/// Extracts every HTML signal into the report
fn analyze_html(report: &mut PageReport, document: &Html, headers: &HeaderMap) {
    let base = report.parsed_url.clone();

    report.lang = first_attr(document, "html[lang]", "lang")
        .or_else(|| {
            header_value(headers, CONTENT_LANGUAGE.as_str())
                .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        })
        .unwrap_or_default();

    report.title = first_text(document, "title").unwrap_or_default();
    report.description = meta_content(document, "name", "description").unwrap_or_default();

    if let Some(refresh) = meta_content(document, "http-equiv", "refresh") {
        if let Some(target) = refresh_target(&refresh) {
            match absolutize(&base, target) {
                Ok(target) => report.set_redirect(&target),
                Err(e) => tracing::debug!("Invalid refresh target on {}: {}", report.url, e),
            }
        }
        report.refresh = refresh;
    }

    if let Some(robots) = meta_content(document, "name", "robots") {
        let (noindex, nofollow) = robots_directives(&robots);
        report.noindex |= noindex;
        report.nofollow |= nofollow;
        report.robots = robots;
    }

    report.canonical = extract_canonical(document, headers, &base).unwrap_or_default();
    report.hreflangs = extract_hreflangs(document, headers, &base);

    report.h1 = first_text(document, "h1").unwrap_or_default();
    report.h2 = first_text(document, "h2").unwrap_or_default();

    let (internal, external) = extract_links(document, &base);
    report.links = internal;
    report.external_links = external;

    report.images = extract_images(document, &base);
    report.iframes = extract_sources(document, &base, "iframe[src]", "src");
    report.audios = extract_sources(document, &base, "audio[src], audio source[src]", "src");
    report.videos = extract_sources(document, &base, "video[src], video source[src]", "src");
    report.scripts = extract_sources(document, &base, "script[src]", "src");
    report.styles = extract_stylesheets(document, &base);

    report.words = count_words(document);
    report.valid_headings = headings_in_order(document);
}

/// Returns the first value of a header as a trimmed string
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Collapses runs of whitespace in an element's text
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|el| element_text(&el))
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Finds `<meta {key}="{name}" content="...">`, matching the key case-insensitively
fn meta_content(document: &Html, key: &str, name: &str) -> Option<String> {
    let selector = Selector::parse("meta[content]").ok()?;
    document
        .select(&selector)
        .find(|el| {
            el.value()
                .attr(key)
                .map(|v| v.trim().eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("content"))
        .map(|v| v.trim().to_string())
}

/// Returns true if the element's `rel` attribute contains the token
fn has_rel(element: &ElementRef, rel: &str) -> bool {
    element
        .value()
        .attr("rel")
        .map(|v| v.split_whitespace().any(|t| t.eq_ignore_ascii_case(rel)))
        .unwrap_or(false)
}

/// Extracts the target from a refresh directive such as `0;URL='/'`
fn refresh_target(refresh: &str) -> Option<&str> {
    let (_, rest) = refresh.split_once(';').or_else(|| refresh.split_once(','))?;
    let rest = rest.trim();

    let has_url_key = rest
        .get(..3)
        .is_some_and(|key| key.eq_ignore_ascii_case("url"));

    let target = match rest.get(3..) {
        Some(value) if has_url_key => value.trim_start().strip_prefix('=')?.trim(),
        _ => rest,
    };

    let target = target.trim_matches(|c: char| c == '\'' || c == '"').trim();
    (!target.is_empty()).then_some(target)
}

fn extract_canonical(document: &Html, headers: &HeaderMap, base: &Url) -> Option<String> {
    if let Ok(selector) = Selector::parse("link[rel][href]") {
        let tag = document
            .select(&selector)
            .filter(|el| has_rel(el, "canonical"))
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| absolutize(base, href).ok());

        if let Some(url) = tag {
            return Some(url.to_string());
        }
    }

    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_link_header)
        .filter(|l| l.has_rel("canonical"))
        .find_map(|l| absolutize(base, &l.target).ok())
        .map(|url| url.to_string())
}

fn extract_hreflangs(document: &Html, headers: &HeaderMap, base: &Url) -> Vec<Hreflang> {
    let mut hreflangs = Vec::new();

    if let Ok(selector) = Selector::parse("link[hreflang][href]") {
        for element in document.select(&selector) {
            if !has_rel(&element, "alternate") {
                continue;
            }

            let (Some(href), Some(lang)) =
                (element.value().attr("href"), element.value().attr("hreflang"))
            else {
                continue;
            };

            if let Ok(url) = absolutize(base, href) {
                hreflangs.push(Hreflang {
                    url: url.to_string(),
                    lang: lang.trim().to_string(),
                });
            }
        }
    }

    if !hreflangs.is_empty() {
        return hreflangs;
    }

    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_link_header)
        .filter(|l| l.has_rel("alternate"))
        .filter_map(|l| {
            let lang = l.param("hreflang")?.to_string();
            let url = absolutize(base, &l.target).ok()?;
            Some(Hreflang {
                url: url.to_string(),
                lang,
            })
        })
        .collect()
}

/// Extracts anchors, split into internal and external by host
fn extract_links(document: &Html, base: &Url) -> (Vec<Link>, Vec<Link>) {
    let mut internal = Vec::new();
    let mut external = Vec::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return (internal, external);
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Ok(url) = absolutize(base, href) else {
            continue;
        };

        let rel = element.value().attr("rel").unwrap_or("").trim().to_string();
        let tokens: Vec<String> = rel
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();

        let link = Link {
            url: url.to_string(),
            text: element_text(&element),
            nofollow: tokens.iter().any(|t| t == "nofollow"),
            sponsored: tokens.iter().any(|t| t == "sponsored"),
            ugc: tokens.iter().any(|t| t == "ugc"),
            rel,
        };

        if same_host(base, &url) {
            internal.push(link);
        } else {
            external.push(link);
        }
    }

    (internal, external)
}

/// Splits a `srcset` value into its candidate URLs
fn srcset_candidates(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

/// Extracts images, including every `srcset` and `<picture>` source candidate
///
/// Candidates share the alt text of the image element they belong to.
fn extract_images(document: &Html, base: &Url) -> Vec<Image> {
    let mut images: Vec<Image> = Vec::new();

    let mut push = |href: &str, alt: &str| {
        if let Ok(url) = absolutize(base, href) {
            let url = url.to_string();
            if !images.iter().any(|i| i.url == url) {
                images.push(Image {
                    url,
                    alt: alt.to_string(),
                });
            }
        }
    };

    if let Ok(selector) = Selector::parse("img") {
        for element in document.select(&selector) {
            let alt = element.value().attr("alt").unwrap_or("").trim();

            if let Some(src) = element.value().attr("src") {
                push(src, alt);
            }

            if let Some(srcset) = element.value().attr("srcset") {
                for candidate in srcset_candidates(srcset) {
                    push(candidate, alt);
                }
            }
        }
    }

    if let (Ok(pictures), Ok(sources), Ok(img)) = (
        Selector::parse("picture"),
        Selector::parse("source[srcset]"),
        Selector::parse("img"),
    ) {
        for picture in document.select(&pictures) {
            let alt = picture
                .select(&img)
                .next()
                .and_then(|el| el.value().attr("alt"))
                .unwrap_or("")
                .trim()
                .to_string();

            for source in picture.select(&sources) {
                if let Some(srcset) = source.value().attr("srcset") {
                    for candidate in srcset_candidates(srcset) {
                        push(candidate, &alt);
                    }
                }
            }
        }
    }

    images
}

/// Extracts de-duplicated absolute URLs from an attribute of matching elements
fn extract_sources(document: &Html, base: &Url, selector: &str, attr: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let Ok(selector) = Selector::parse(selector) else {
        return urls;
    };

    for element in document.select(&selector) {
        if let Some(url) = element
            .value()
            .attr(attr)
            .and_then(|href| absolutize(base, href).ok())
        {
            let url = url.to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }

    urls
}

fn extract_stylesheets(document: &Html, base: &Url) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return urls;
    };

    for element in document.select(&selector) {
        if !has_rel(&element, "stylesheet") {
            continue;
        }

        if let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| absolutize(base, href).ok())
        {
            let url = url.to_string();
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }

    urls
}
