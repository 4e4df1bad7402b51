//! Tidy-up passes over freshly converted Markdown.
//!
//! Passes that rewrite prose skip fenced code blocks.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Apply every pass in order.
pub(crate) fn run(md: &str, base_url: Option<&Url>) -> String {
    let md = outside_fences(md, unwrap_layout_tags);
    let md = demote_extra_h1(&md);
    let md = strip_fence_class_prefix(&md);
    let md = match base_url {
        Some(base) => outside_fences(&md, |line| absolutize_links(line, base)),
        None => md,
    };
    finish(&md)
}

/// Apply `pass` to every line that is not inside a fenced code block.
fn outside_fences(md: &str, mut pass: impl FnMut(&str) -> String) -> String {
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                line.to_string()
            } else if in_fence {
                line.to_string()
            } else {
                pass(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep the first `# ` heading; later ones become `## `.
fn demote_extra_h1(md: &str) -> String {
    let mut seen_h1 = false;
    outside_fences(md, |line| {
        if line.starts_with("# ") {
            if seen_h1 {
                return format!("#{line}");
            }
            seen_h1 = true;
        }
        line.to_string()
    })
}

/// ```` ```language-js ```` -> ```` ```js ````.
fn strip_fence_class_prefix(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*)```(?:language-|lang-|highlight-)([\w+-]+)").expect("valid regex")
    });

    FENCE_RE.replace_all(md, "$1```$2").into_owned()
}

/// Drop layout-only tags htmd passes through, keeping their text.
fn unwrap_layout_tags(line: &str) -> String {
    static LAYOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|main|figure|figcaption|picture|font|center)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    LAYOUT_RE.replace_all(line, "").into_owned()
}

/// Resolve relative link targets (not images) against `base`.
fn absolutize_links(line: &str, base: &Url) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(line, |caps: &Captures| {
            let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
            let keep = !bang.is_empty()
                || href.starts_with('#')
                || href.contains("://")
                || href.starts_with("mailto:");
            if keep {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(abs) => format!("[{text}]({abs})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Trim line ends, allow at most one blank line in a row, end with one newline.
fn finish(md: &str) -> String {
    let mut out = String::with_capacity(md.len());
    let mut blank_run = 0;
    for line in md.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotes_second_h1() {
        assert_eq!(
            demote_extra_h1("# Title\n\ntext\n\n# Again\n\n## Sub"),
            "# Title\n\ntext\n\n## Again\n\n## Sub"
        );
    }

    #[test]
    fn fence_class_prefix_removed() {
        assert_eq!(
            strip_fence_class_prefix("```language-javascript\nx\n```"),
            "```javascript\nx\n```"
        );
        assert_eq!(strip_fence_class_prefix("```rust\nx\n```"), "```rust\nx\n```");
    }

    #[test]
    fn layout_tags_unwrapped_outside_fences() {
        let md = "<div class=\"note\">Important</div>\n```html\n<div>kept</div>\n```";
        let out = outside_fences(md, unwrap_layout_tags);
        assert!(out.starts_with("Important\n"));
        assert!(out.contains("<div>kept</div>"));
    }

    #[test]
    fn links_resolved_but_images_and_anchors_kept() {
        let base = Url::parse("https://docs.example.com/guide/intro").unwrap();
        assert_eq!(
            absolutize_links("[Next](/api) and [Up](../index)", &base),
            "[Next](https://docs.example.com/api) and [Up](https://docs.example.com/index)"
        );
        assert_eq!(absolutize_links("[S](#s)", &base), "[S](#s)");
        assert_eq!(absolutize_links("![logo](/l.png)", &base), "![logo](/l.png)");
        assert_eq!(
            absolutize_links("[x](https://other.com/p)", &base),
            "[x](https://other.com/p)"
        );
    }

    #[test]
    fn finish_collapses_blank_runs() {
        assert_eq!(finish("\n\nA  \n\n\n\nB\t\n\n\n"), "A\n\nB\n");
        assert_eq!(finish(""), "");
    }

    #[test]
    fn full_run() {
        let input = "# T\n\n\n\n<div>body</div>\n\n# T2\n\n```lang-python\nprint('hi')\n```";
        let out = run(input, None);
        assert_eq!(out, "# T\n\nbody\n\n## T2\n\n```python\nprint('hi')\n```\n");
    }
}
