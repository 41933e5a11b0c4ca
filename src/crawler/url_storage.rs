use std::collections::HashSet;
use std::sync::RwLock;

/// Per-crawl memory of URLs already queued or emitted
#[derive(Debug, Default)]
pub struct UrlStorage {
    seen: RwLock<HashSet<String>>,
}

impl UrlStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the URL has been added
    pub fn seen(&self, url: &str) -> bool {
        match self.seen.read() {
            Ok(seen) => seen.contains(url),
            Err(poisoned) => poisoned.into_inner().contains(url),
        }
    }

    /// Marks the URL as seen
    ///
    /// Returns true if it was not seen before, so a caller can check and mark
    /// in one step.
    pub fn add(&self, url: &str) -> bool {
        match self.seen.write() {
            Ok(mut seen) => seen.insert(url.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(url.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        match self.seen.read() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
