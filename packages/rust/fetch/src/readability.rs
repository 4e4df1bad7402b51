//! Main-content extraction for article pages.
//!
//! Finds the element most likely to hold the article body, strips page
//! chrome from it, and collects the page metadata readers care about.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Containers tried in order; the first with enough text wins.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    r#"[itemprop="articleBody"]"#,
    "main",
    r#"[role="main"]"#,
    "#content",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".content",
];

/// A candidate needs at least this much text to be taken without comparison.
const MIN_CONTENT_CHARS: usize = 140;

static CHROME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "nav, header, footer, aside, script, style, noscript, form, iframe, \
         .sidebar, .share, .social, .comments, .advertisement, .ad, \
         [role=\"navigation\"], [aria-hidden=\"true\"]",
    )
    .expect("valid selector")
});

static BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section").expect("valid selector"));
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// The readable part of an HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readable {
    /// Article body HTML with chrome removed.
    pub html: String,
    pub title: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub lang: Option<String>,
    pub excerpt: Option<String>,
}

/// Extract the readable content and metadata of `html`.
pub fn extract_readable(html: &str) -> Readable {
    let doc = Html::parse_document(html);

    let html = find_content(&doc)
        .map(|el| strip_chrome(&el))
        .unwrap_or_default();

    Readable {
        html,
        title: meta(&doc, r#"meta[property="og:title"]"#)
            .or_else(|| meta(&doc, r#"meta[name="twitter:title"]"#))
            .or_else(|| text_of(&doc, "title"))
            .or_else(|| text_of(&doc, "h1")),
        byline: meta(&doc, r#"meta[name="author"]"#)
            .or_else(|| text_of(&doc, r#"[rel="author"]"#))
            .or_else(|| text_of(&doc, ".byline, .author")),
        site_name: meta(&doc, r#"meta[property="og:site_name"]"#),
        lang: attr_of(&doc, "html", "lang"),
        excerpt: meta(&doc, r#"meta[name="description"]"#)
            .or_else(|| meta(&doc, r#"meta[property="og:description"]"#)),
    }
}

fn text_len(el: &ElementRef) -> usize {
    el.text().map(|t| t.trim().len()).sum()
}

fn find_content(doc: &Html) -> Option<ElementRef<'_>> {
    let candidates: Vec<ElementRef> = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .filter_map(|sel| doc.select(&sel).next())
        .collect();

    if let Some(el) = candidates.iter().find(|el| text_len(el) >= MIN_CONTENT_CHARS) {
        return Some(*el);
    }

    // No semantic container: take the block with the most paragraph text.
    let densest = doc
        .select(&BLOCKS)
        .map(|el| {
            let score: usize = el
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| c.value().name() == "p")
                .map(|p| text_len(&p))
                .sum();
            (score, el)
        })
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score)
        .map(|(_, el)| el);

    densest
        .or_else(|| candidates.into_iter().max_by_key(text_len))
        .or_else(|| doc.select(&BODY).next())
}

/// Serialize `el` without chrome descendants.
fn strip_chrome(el: &ElementRef) -> String {
    let mut html = el.inner_html();
    for chrome in el.select(&CHROME) {
        html = html.replacen(&chrome.html(), "", 1);
    }
    html
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
    (!s.is_empty()).then_some(s)
}

fn meta(doc: &Html, selector: &str) -> Option<String> {
    attr_of(doc, selector, "content")
}

fn attr_of(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .find_map(non_empty)
}

fn text_of(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .map(|el| el.text().collect::<String>())
        .find_map(|t| non_empty(&t))
}

/// Paragraph count, used by callers to judge extraction quality.
pub fn paragraph_count(html: &str) -> usize {
    Html::parse_fragment(html).select(&PARAGRAPH).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = "Rust gives you control over memory without a garbage collector, \
        and the borrow checker makes sure references never outlive the data they point to.";

    #[test]
    fn picks_article_and_strips_chrome() {
        let html = format!(
            r#"<html lang="en"><head>
                <title>Fallback title</title>
                <meta property="og:title" content="Ownership Explained">
                <meta property="og:site_name" content="Example Blog">
                <meta name="author" content="Jordan Lee">
                <meta name="description" content="A short tour.">
            </head><body>
                <nav><a href="/">Home</a></nav>
                <article>
                    <h1>Ownership Explained</h1>
                    <p>{LONG}</p>
                    <aside>Related posts</aside>
                    <script>track()</script>
                </article>
                <footer>Copyright</footer>
            </body></html>"#
        );

        let readable = extract_readable(&html);
        assert!(readable.html.contains("borrow checker"));
        assert!(!readable.html.contains("Related posts"));
        assert!(!readable.html.contains("track()"));
        assert!(!readable.html.contains("Copyright"));
        assert_eq!(readable.title.as_deref(), Some("Ownership Explained"));
        assert_eq!(readable.site_name.as_deref(), Some("Example Blog"));
        assert_eq!(readable.byline.as_deref(), Some("Jordan Lee"));
        assert_eq!(readable.lang.as_deref(), Some("en"));
        assert_eq!(readable.excerpt.as_deref(), Some("A short tour."));
        assert_eq!(paragraph_count(&readable.html), 1);
    }

    #[test]
    fn falls_back_to_densest_block() {
        let html = format!(
            r#"<html><head><title>  Plain   Page </title></head><body>
                <div class="menu"><a href="/a">A</a></div>
                <div class="story"><p>{LONG}</p><p>Second paragraph.</p></div>
            </body></html>"#
        );

        let readable = extract_readable(&html);
        assert!(readable.html.contains("Second paragraph."));
        assert!(!readable.html.contains("menu"));
        assert_eq!(readable.title.as_deref(), Some("Plain Page"));
        assert_eq!(readable.byline, None);
        assert_eq!(readable.lang, None);
    }

    #[test]
    fn bare_body_still_yields_content() {
        let readable = extract_readable("<html><body>Just text.</body></html>");
        assert!(readable.html.contains("Just text."));
    }
}
