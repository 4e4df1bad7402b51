//! Table rendering ahead of the htmd pass.
//!
//! Each top-level `<table>` is rendered to a pipe table and swapped for a
//! placeholder paragraph; the rendered tables are put back after conversion
//! so htmd never reflows them.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

fn placeholder(index: usize) -> String {
    format!("SIPHONTABLE{index}")
}

/// Body HTML with tables replaced by placeholders, plus the rendered tables.
pub(crate) fn extract_tables(html: &str) -> (String, Vec<String>) {
    let doc = Html::parse_document(html);
    let Some(body) = doc.select(&BODY).next() else {
        return (html.to_string(), Vec::new());
    };

    // Serialize through scraper so table markup matches byte for byte.
    let mut out = body.inner_html();
    let mut rendered = Vec::new();

    for table in body.select(&TABLE).filter(|t| !inside_table(t)) {
        let Some(md) = render_table(&table) else {
            continue;
        };
        let marker = format!("<p>{}</p>", placeholder(rendered.len()));
        let replaced = out.replacen(&table.html(), &marker, 1);
        if replaced != out {
            out = replaced;
            rendered.push(md);
        }
    }

    (out, rendered)
}

/// Put rendered tables back in place of their placeholders.
pub(crate) fn restore_tables(md: &str, tables: &[String]) -> String {
    // Highest index first so SIPHONTABLE1 never matches inside SIPHONTABLE10.
    tables
        .iter()
        .enumerate()
        .rev()
        .fold(md.to_string(), |acc, (i, table)| acc.replace(&placeholder(i), table))
}

fn inside_table(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "table")
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', r"\|")
}

/// Render a table as GitHub-flavoured Markdown; the first row is the header.
fn render_table(table: &ElementRef) -> Option<String> {
    let mut rows: Vec<Vec<String>> = table
        .select(&ROW)
        .map(|tr| tr.select(&CELL).map(|c| cell_text(&c)).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max()?;
    for row in &mut rows {
        row.resize(width, String::new());
    }

    let line = |cells: &[String]| format!("| {} |", cells.join(" | "));
    let separator = vec!["---".to_string(); width];
    let mut lines = vec![line(rows[0].as_slice()), line(separator.as_slice())];
    lines.extend(rows[1..].iter().map(|r| line(r.as_slice())));
    Some(lines.join("\n"))
}
