use sha2::{Digest, Sha256};
use url::Url;

/// Computes the join key used to match pages, redirects, canonicals and hreflangs
///
/// The URL is parsed and re-serialized first so that representation
/// differences (host case, default ports, a missing root path, a fragment)
/// hash identically. Unparsable input is hashed verbatim.
///
/// # Examples
///
/// ```
/// use sumi_audit::url::url_hash;
///
/// assert_eq!(
///     url_hash("HTTPS://Example.com:443"),
///     url_hash("https://example.com/#top"),
/// );
/// ```
pub fn url_hash(raw: &str) -> String {
    let normalized = match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
