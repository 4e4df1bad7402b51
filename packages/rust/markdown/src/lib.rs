//! HTML-to-Markdown conversion for extracted content.
//!
//! Tables are rendered up front (htmd has no table support), the rest of the
//! document goes through `htmd`, and the result is tidied by [`cleanup`].

mod cleanup;
mod tables;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

use siphon_shared::{Result, SiphonError};

/// Tags whose content never makes it into the Markdown.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "iframe", "noscript", "svg", "form", "button",
];

/// Options for [`convert`].
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Base for resolving relative links; links stay as written when `None`.
    pub base_url: Option<Url>,
}

impl ConvertOptions {
    pub fn with_base(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
        }
    }
}

/// Converted Markdown plus a few facts about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub markdown: String,
    /// Text of the first level-one heading, if any.
    pub title: Option<String>,
    /// Words outside fenced code blocks.
    pub word_count: usize,
}

/// Convert an HTML document or fragment to Markdown.
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn convert(html: &str, opts: &ConvertOptions) -> Result<Converted> {
    let (html, rendered_tables) = tables::extract_tables(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();
    let raw = converter
        .convert(&html)
        .map_err(|e| SiphonError::Conversion(format!("htmd conversion failed: {e}")))?;

    let raw = tables::restore_tables(&raw, &rendered_tables);
    let markdown = cleanup::run(&raw, opts.base_url.as_ref());

    let title = first_heading(&markdown);
    let word_count = word_count(&markdown);
    debug!(
        tables = rendered_tables.len(),
        word_count,
        md_len = markdown.len(),
        "converted html"
    );

    Ok(Converted {
        markdown,
        title,
        word_count,
    })
}

/// Text of the first `# ` heading in `md`.
pub fn first_heading(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t#]*$").expect("valid regex"));

    H1_RE
        .captures(md)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Count words outside fenced code blocks.
pub fn word_count(md: &str) -> usize {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

    FENCE_RE
        .replace_all(md, " ")
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(html: &str) -> String {
        convert(html, &ConvertOptions::default()).unwrap().markdown
    }

    #[test]
    fn converts_headings_and_paragraphs() {
        let out = convert(
            "<html><body><h1>Hello World</h1><p>Some <strong>bold</strong> text.</p></body></html>",
            &ConvertOptions::default(),
        )
        .unwrap();
        assert!(out.markdown.contains("# Hello World"));
        assert!(out.markdown.contains("**bold**"));
        assert_eq!(out.title.as_deref(), Some("Hello World"));
        assert!(out.word_count >= 5);
        assert!(!out.markdown.contains("<p>"));
    }

    #[test]
    fn skips_scripts_and_navigation() {
        let out = md(r#"<body>
            <nav><a href="/">Home</a></nav>
            <p>Important text.</p>
            <script>window.analytics = 1;</script>
        </body>"#);
        assert!(out.contains("Important text."));
        assert!(!out.contains("analytics"));
        assert!(!out.contains("Home"));
    }

    #[test]
    fn keeps_code_blocks() {
        let out = md(r#"<pre><code class="language-rust">fn main() {
    println!("hello");
}</code></pre>"#);
        assert!(out.contains("```rust"));
        assert!(out.contains("println!"));
    }

    #[test]
    fn renders_tables_as_pipe_tables() {
        let out = md(r#"<p>Before</p>
            <table>
                <thead><tr><th>Name</th><th>Value</th></tr></thead>
                <tbody>
                    <tr><td>foo</td><td>bar</td></tr>
                    <tr><td>baz</td><td>a | b</td></tr>
                </tbody>
            </table>
            <p>After</p>"#);
        assert!(out.contains("| Name | Value |\n| --- | --- |\n| foo | bar |\n"), "{out}");
        assert!(out.contains(r"| baz | a \| b |"));
        assert!(out.contains("Before"));
        assert!(out.contains("After"));
    }

    #[test]
    fn resolves_relative_links_against_base() {
        let opts = ConvertOptions::with_base(Url::parse("https://site.com/blog/post").unwrap());
        let out = convert(r#"<p><a href="/about">About</a></p>"#, &opts).unwrap();
        assert!(out.markdown.contains("[About](https://site.com/about)"));
    }

    #[test]
    fn empty_input_yields_empty_markdown() {
        let out = convert("<html><body></body></html>", &ConvertOptions::default()).unwrap();
        assert!(out.markdown.trim().is_empty());
        assert_eq!(out.title, None);
        assert_eq!(out.word_count, 0);
    }

    #[test]
    fn first_heading_ignores_lower_levels() {
        assert_eq!(first_heading("## Sub\n\n# Main #\n"), Some("Main".into()));
        assert_eq!(first_heading("no headings here"), None);
    }

    #[test]
    fn word_count_skips_fences() {
        assert_eq!(word_count("One two three.\n\n```\nlots of code words\n```\n"), 3);
    }
}
