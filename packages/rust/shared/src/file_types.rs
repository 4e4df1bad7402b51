//! File extension tables and MIME lookup for local file sources.
//!
//! Extensions are compared lowercase and include the leading dot.

/// Plain-text formats read directly as UTF-8.
pub const TEXT_EXTENSIONS: &[&str] = &[
    ".csv", ".json", ".xml", ".txt", ".md", ".yaml", ".yml", ".toml", ".ini", ".py", ".js",
    ".html", ".css", ".java", ".cpp", ".c", ".go", ".rs", ".rb", ".php", ".log", ".env", ".sh",
];

/// Binary document formats that need a converter.
pub const DOC_EXTENSIONS: &[&str] = &[
    ".docx", ".pptx", ".xlsx", ".xls", ".pdf", ".msg", ".html", ".rtf",
];

/// Audio formats handled by transcription.
pub const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".m4a", ".ogg", ".flac"];

const MIME_TYPES: &[(&str, &str)] = &[
    (".csv", "text/csv"),
    (".json", "application/json"),
    (".xml", "application/xml"),
    (".txt", "text/plain"),
    (".md", "text/markdown"),
    (".yaml", "text/yaml"),
    (".yml", "text/yaml"),
    (".toml", "application/toml"),
    (".ini", "text/plain"),
    (".py", "text/x-python"),
    (".js", "text/javascript"),
    (".html", "text/html"),
    (".css", "text/css"),
    (".java", "text/x-java-source"),
    (".cpp", "text/x-c++src"),
    (".c", "text/x-csrc"),
    (".go", "text/x-go"),
    (".rs", "text/x-rustsrc"),
    (".rb", "text/x-ruby"),
    (".php", "text/x-php"),
    (".log", "text/plain"),
    (".env", "text/plain"),
    (".sh", "application/x-sh"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        ".pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    (
        ".xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (".xls", "application/vnd.ms-excel"),
    (".pdf", "application/pdf"),
    (".msg", "application/vnd.ms-outlook"),
    (".rtf", "application/rtf"),
    (".wav", "audio/wav"),
    (".mp3", "audio/mpeg"),
    (".m4a", "audio/mp4"),
    (".ogg", "audio/ogg"),
    (".flac", "audio/flac"),
];

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a lowercase dotted extension.
pub fn mime_type(extension: &str) -> &'static str {
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}

pub fn is_text(extension: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension)
}

pub fn is_document(extension: &str) -> bool {
    DOC_EXTENSIONS.contains(&extension) || is_text(extension)
}

pub fn is_audio(extension: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&extension)
}
