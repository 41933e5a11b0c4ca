//! Structural content checks over a parsed HTML document

use scraper::{Html, Selector};

/// Elements whose text is not counted as page content
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "a"];

/// Checks that headings never skip a level on the way down
///
/// A single pass over the headings in document order tracks the current
/// level. A heading is invalid if it is more than one level deeper than the
/// current one (`h1` → `h3`); going back up is always allowed.
pub fn headings_in_order(document: &Html) -> bool {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return true;
    };

    let mut current = 0u32;

    for heading in document.select(&selector) {
        let level = heading
            .value()
            .name()
            .get(1..)
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(1);

        if level > current + 1 {
            return false;
        }

        current = level;
    }

    true
}

/// Counts words of visible body text
///
/// Script, style and anchor text are excluded. Punctuation and symbols are
/// collapsed to whitespace before splitting.
pub fn count_words(document: &Html) -> usize {
    let Ok(selector) = Selector::parse("body") else {
        return 0;
    };

    let Some(body) = document.select(&selector).next() else {
        return 0;
    };

    let mut buffer = String::new();

    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| NON_CONTENT_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });

        if !hidden {
            buffer.push_str(text);
            buffer.push(' ');
        }
    }

    buffer
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .count()
}
