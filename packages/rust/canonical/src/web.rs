//! Web URL normalization.
//!
//! Two URLs that point at the same article must normalize to the same string:
//! - scheme and host lowercased, host IDNA/punycode-encoded, default ports
//!   dropped (all handled by the WHATWG parser in the `url` crate)
//! - dot segments, empty segments and the trailing slash removed from the path
//! - tracking parameters dropped, remaining query pairs sorted and re-encoded
//! - fragment removed

use sha2::{Digest, Sha256};
use url::Url;
use url::form_urlencoded;

use crate::{CanonicalError, to_hex};

/// Query parameters dropped by exact name.
pub const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "mc_eid", "mc_cid", "igshid"];

/// Query parameters dropped by prefix.
pub const TRACKING_PREFIXES: &[&str] = &["utm_", "vero_"];

/// Whether a query parameter name is on the tracking denylist.
pub fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str())
        || TRACKING_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Normalize an http(s) URL into its canonical form.
pub fn normalize_url(input: &str) -> Result<Url, CanonicalError> {
    let mut url =
        Url::parse(input.trim()).map_err(|e| CanonicalError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(CanonicalError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CanonicalError::MissingHost);
    }

    let path = normalize_path(url.path());
    url.set_path(&path);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish();
        url.set_query(Some(&query));
    }

    url.set_fragment(None);
    Ok(url)
}

/// SHA-256 hex digest of the canonical form of `input`.
///
/// Returns the canonical URL alongside its digest.
pub fn url_digest(input: &str) -> Result<(Url, String), CanonicalError> {
    let url = normalize_url(input)?;
    let digest = to_hex(&Sha256::digest(url.as_str().as_bytes()));
    Ok((url, digest))
}

/// Collapse `.`/`..`/empty segments and drop the trailing slash.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
