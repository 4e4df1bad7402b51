//! Platform identifier extraction for video and cloud-document URLs.
//!
//! These sources already carry a stable identifier, so canonicalization is
//! extraction plus validation. Inputs that look like the platform but carry
//! no well-formed identifier are rejected instead of guessed at.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::CanonicalError;

/// Length of a video-platform identifier.
pub const VIDEO_ID_LEN: usize = 11;

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{11}$").expect("valid regex"));

static DOC_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]+$").expect("valid regex"));

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
    "youtu.be",
];

const SHORT_LINK_HOST: &str = "youtu.be";

/// Path prefixes that carry the ID as the next segment.
const ID_PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

const CLOUD_DOC_HOST: &str = "docs.google.com";

fn parse_http(input: &str) -> Option<Url> {
    let url = Url::parse(input.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

// ---------------------------------------------------------------------------
// Video platform
// ---------------------------------------------------------------------------

pub fn is_video_platform_host(host: &str) -> bool {
    VIDEO_HOSTS.contains(&host)
}

/// Whether `input` is an http(s) URL on a video-platform host.
pub fn is_video_platform_url(input: &str) -> bool {
    parse_http(input)
        .and_then(|u| u.host_str().map(is_video_platform_host))
        .unwrap_or(false)
}

/// Extract the 11-character video identifier from a platform URL.
///
/// Accepted shapes: `watch?v=<id>`, `youtu.be/<id>`, and
/// `/shorts/<id>`, `/embed/<id>`, `/live/<id>`, `/v/<id>`.
pub fn video_id(input: &str) -> Result<String, CanonicalError> {
    let url = parse_http(input).ok_or_else(|| CanonicalError::InvalidUrl(input.to_string()))?;
    let host = url.host_str().unwrap_or_default();
    if !is_video_platform_host(host) {
        return Err(CanonicalError::MissingId(format!("{host} is not a video platform host")));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let candidate = if host == SHORT_LINK_HOST {
        segments.first().map(|s| s.to_string())
    } else if segments.first() == Some(&"watch") {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
    } else {
        match segments.as_slice() {
            [prefix, id, ..] if ID_PATH_PREFIXES.contains(prefix) => Some(id.to_string()),
            _ => None,
        }
    };

    match candidate {
        Some(id) if VIDEO_ID_RE.is_match(&id) => Ok(id),
        Some(id) => Err(CanonicalError::MissingId(format!(
            "'{id}' is not a {VIDEO_ID_LEN}-character video id"
        ))),
        None => Err(CanonicalError::MissingId(format!("no video id in {input}"))),
    }
}

// ---------------------------------------------------------------------------
// Cloud documents
// ---------------------------------------------------------------------------

/// The cloud office document families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudDocKind {
    Document,
    Spreadsheet,
    Presentation,
    Form,
}

impl CloudDocKind {
    pub const ALL: [CloudDocKind; 4] = [
        Self::Document,
        Self::Spreadsheet,
        Self::Presentation,
        Self::Form,
    ];

    /// Path segment used by the hosting service (`/document/d/...`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheets",
            Self::Presentation => "presentation",
            Self::Form => "forms",
        }
    }

    /// Segment used in canonical URIs (`cloud-doc:///docs/<id>`).
    pub fn uri_segment(&self) -> &'static str {
        match self {
            Self::Document => "docs",
            Self::Spreadsheet => "sheets",
            Self::Presentation => "slides",
            Self::Form => "forms",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }

    pub fn from_uri_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.uri_segment() == segment)
    }
}

pub fn is_cloud_doc_host(host: &str) -> bool {
    host == CLOUD_DOC_HOST
}

/// Whether `input` is an http(s) URL pointing into a cloud document family.
pub fn is_cloud_doc_url(input: &str) -> bool {
    let Some(url) = parse_http(input) else {
        return false;
    };
    if !url.host_str().is_some_and(is_cloud_doc_host) {
        return false;
    }
    url.path_segments()
        .and_then(|mut s| s.next())
        .and_then(CloudDocKind::from_path_segment)
        .is_some()
}

/// Extract the document family and identifier from a cloud-document URL.
///
/// Accepts `/<family>/d/<id>/...` and, for published forms, `/forms/d/e/<id>/...`.
pub fn cloud_doc_id(input: &str) -> Result<(CloudDocKind, String), CanonicalError> {
    let url = parse_http(input).ok_or_else(|| CanonicalError::InvalidUrl(input.to_string()))?;
    if !url.host_str().is_some_and(is_cloud_doc_host) {
        return Err(CanonicalError::MissingId(format!("{input} is not a cloud document URL")));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let kind = segments
        .first()
        .and_then(|s| CloudDocKind::from_path_segment(s))
        .ok_or_else(|| CanonicalError::MissingId(format!("unknown document family in {input}")))?;

    let id = match (kind, &segments[1..]) {
        (CloudDocKind::Form, ["d", "e", id, ..]) => *id,
        (_, ["d", id, ..]) => *id,
        _ => return Err(CanonicalError::MissingId(format!("no document id in {input}"))),
    };

    if !DOC_ID_RE.is_match(id) {
        return Err(CanonicalError::MissingId(format!("'{id}' is not a document id")));
    }
    Ok((kind, id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn video_id_accepted_shapes() {
        for input in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ?feature=share",
        ] {
            assert_eq!(video_id(input).expect(input), ID, "{input}");
        }
    }

    #[test]
    fn video_id_rejects_malformed() {
        for input in [
            "https://www.youtube.com/",
            "https://www.youtube.com/watch",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQextra",
            "https://youtu.be/",
            "https://www.youtube.com/@channel",
            "https://example.com/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(
                matches!(video_id(input), Err(CanonicalError::MissingId(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn video_host_detection() {
        assert!(is_video_platform_url("https://www.youtube.com/@channel"));
        assert!(is_video_platform_url("http://youtu.be/x"));
        assert!(!is_video_platform_url("https://notyoutube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_video_platform_url("youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn cloud_doc_families() {
        let cases = [
            ("https://docs.google.com/document/d/1AbC_d-EF/edit", CloudDocKind::Document),
            ("https://docs.google.com/spreadsheets/d/1AbC_d-EF/edit#gid=0", CloudDocKind::Spreadsheet),
            ("https://docs.google.com/presentation/d/1AbC_d-EF", CloudDocKind::Presentation),
            ("https://docs.google.com/forms/d/1AbC_d-EF/viewform", CloudDocKind::Form),
            ("https://docs.google.com/forms/d/e/1AbC_d-EF/viewform", CloudDocKind::Form),
        ];
        for (input, kind) in cases {
            assert!(is_cloud_doc_url(input), "{input}");
            let (k, id) = cloud_doc_id(input).expect(input);
            assert_eq!(k, kind);
            assert_eq!(id, "1AbC_d-EF");
        }
    }

    #[test]
    fn cloud_doc_rejects_missing_id() {
        assert!(is_cloud_doc_url("https://docs.google.com/document/u/0/"));
        assert!(cloud_doc_id("https://docs.google.com/document/u/0/").is_err());
        assert!(cloud_doc_id("https://docs.google.com/document/d/").is_err());
        assert!(!is_cloud_doc_url("https://docs.google.com/"));
        assert!(!is_cloud_doc_url("https://drive.google.com/file/d/abc"));
    }

    #[test]
    fn cloud_doc_segments_roundtrip() {
        for kind in CloudDocKind::ALL {
            assert_eq!(CloudDocKind::from_uri_segment(kind.uri_segment()), Some(kind));
            assert_eq!(CloudDocKind::from_path_segment(kind.path_segment()), Some(kind));
        }
    }
}
