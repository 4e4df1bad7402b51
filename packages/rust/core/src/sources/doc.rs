//! Text extraction for local documents.
//!
//! Plain-text formats are read as UTF-8, HTML goes through the Markdown
//! converter, PDFs through `pdf-extract`, and Office Open XML documents are
//! unzipped and their text runs collected with `quick-xml`.

use std::io::{Cursor, Read};
use std::path::PathBuf;

use async_trait::async_trait;
use quick_xml::events::Event;
use tracing::{debug, instrument};

use siphon_canonical::file_extension;
use siphon_markdown::ConvertOptions;
use siphon_shared::file_types::is_text;
use siphon_shared::{RawContent, Result, SiphonError, SourceIdentity, SourceType};

use super::file::file_metadata;
use crate::strategy::Extractor;

/// Largest decompressed size read from a single archive entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extractor for `file-doc` sources.
pub struct DocExtractor;

#[async_trait]
impl Extractor for DocExtractor {
    fn source_type(&self) -> SourceType {
        SourceType::FileDoc
    }

    #[instrument(skip_all, fields(uri = %identity.canonical_uri))]
    async fn extract(&self, identity: &SourceIdentity) -> Result<RawContent> {
        let path = PathBuf::from(identity.original_input.trim());
        let extension = file_extension(&path).unwrap_or_default();

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SiphonError::io(&path, e))?;

        let ext = extension.clone();
        let text = tokio::task::spawn_blocking(move || document_text(&ext, &bytes))
            .await
            .map_err(|e| SiphonError::Conversion(format!("conversion task failed: {e}")))??;

        if text.trim().is_empty() {
            return Err(SiphonError::extraction(
                &identity.canonical_uri,
                format!("no text found in {}", path.display()),
            ));
        }
        debug!(%extension, chars = text.len(), "document converted");

        let mut content = RawContent::new(SourceType::FileDoc, text);
        content.metadata = file_metadata(&path, identity)?;
        Ok(content)
    }
}

/// Convert document bytes to text according to their extension.
pub(crate) fn document_text(extension: &str, bytes: &[u8]) -> Result<String> {
    match extension {
        ".html" => {
            let html = String::from_utf8_lossy(bytes);
            Ok(siphon_markdown::convert(&html, &ConvertOptions::default())?.markdown)
        }
        ".pdf" => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| SiphonError::Conversion(format!("PDF extraction failed: {e}"))),
        ".docx" => docx_text(bytes),
        ".pptx" => pptx_text(bytes),
        ext if is_text(ext) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        ext => Err(SiphonError::Conversion(format!(
            "unsupported format '{ext}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Office Open XML
// ---------------------------------------------------------------------------

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn ooxml_err(e: impl std::fmt::Display) -> SiphonError {
    SiphonError::Conversion(format!("OOXML extraction failed: {e}"))
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(ooxml_err)
}

/// Read one archive entry, refusing entries that decompress past the limit.
fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ooxml_err(format!(
            "{name} exceeds {MAX_XML_ENTRY_BYTES} bytes"
        )));
    }
    Ok(out)
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    paragraphs_text(&xml)
}

fn pptx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let mut slides: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    slides.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = Vec::with_capacity(slides.len());
    for name in slides {
        let xml = read_entry(&mut archive, &name)?;
        let text = paragraphs_text(&xml)?;
        if !text.is_empty() {
            out.push(text);
        }
    }
    Ok(out.join("\n\n"))
}

/// Collect `<t>` runs, one line per `<p>` paragraph.
///
/// Matches on local names, so it serves both WordprocessingML (`w:`) and
/// DrawingML (`a:`).
fn paragraphs_text(xml: &[u8]) -> Result<String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = line.trim();
                    if !text.is_empty() {
                        lines.push(text.to_string());
                    }
                    line.clear();
                }
                _ => {}
            },
            Event::Text(t) if in_text => line.push_str(&t.unescape().map_err(ooxml_err)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !line.trim().is_empty() {
        lines.push(line.trim().to_string());
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::sources::file::FileParser;
    use crate::strategy::SourceParser;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const DOCX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly </w:t></w:r><w:r><w:t xml:space="preserve">report &amp; outlook</w:t></w:r></w:p>
    <w:p><w:r><w:t>Revenue grew.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn slide(text: &str) -> String {
        format!(
            r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
        )
    }

    #[test]
    fn docx_paragraphs_extracted() {
        let bytes = zip_of(&[("word/document.xml", DOCX_XML)]);
        let text = document_text(".docx", &bytes).unwrap();
        assert_eq!(text, "Quarterly report & outlook\nRevenue grew.");
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let (one, two, ten) = (slide("First"), slide("Second"), slide("Tenth"));
        let bytes = zip_of(&[
            ("ppt/slides/slide10.xml", ten.as_str()),
            ("ppt/slides/slide2.xml", two.as_str()),
            ("ppt/slides/slide1.xml", one.as_str()),
        ]);
        let text = document_text(".pptx", &bytes).unwrap();
        assert_eq!(text, "First\n\nSecond\n\nTenth");
    }

    #[test]
    fn html_and_text_formats() {
        let md = document_text(".html", b"<h1>Title</h1><p>Body <b>bold</b></p>").unwrap();
        assert!(md.starts_with("# Title"));
        assert!(md.contains("**bold**"));

        let text = document_text(".csv", b"a,b\n1,2\n").unwrap();
        assert_eq!(text, "a,b\n1,2\n");
    }

    #[test]
    fn pdf_text_extracted() {
        let bytes = crate::testing::minimal_pdf("Quarterly report");
        let text = document_text(".pdf", &bytes).unwrap();
        assert_eq!(text.trim(), "Quarterly report");
    }

    #[test]
    fn unsupported_and_corrupt_inputs_fail() {
        let err = document_text(".rtf", b"{\\rtf1}").unwrap_err();
        assert!(err.to_string().contains("unsupported format"));

        assert!(document_text(".docx", b"not a zip").is_err());
        let no_body = zip_of(&[("other.xml", "<x/>")]);
        assert!(document_text(".docx", &no_body).is_err());
    }

    #[tokio::test]
    async fn extractor_reads_file_with_metadata() {
        let dir = std::env::temp_dir().join(format!("siphon-doc-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("notes.md");
        std::fs::write(&path, "# Notes\n\nRemember the milk.\n").unwrap();

        let identity = FileParser::documents()
            .canonicalize(&path.to_string_lossy())
            .unwrap();
        let content = DocExtractor.extract(&identity).await.unwrap();

        assert_eq!(content.source_type, SourceType::FileDoc);
        assert!(content.text.contains("Remember the milk."));
        assert_eq!(content.meta_str("file_name"), Some("notes.md"));
        assert_eq!(content.meta_str("mime_type"), Some("text/markdown"));
    }

    #[tokio::test]
    async fn empty_document_is_an_extraction_failure() {
        let dir = std::env::temp_dir().join(format!("siphon-doc-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blank.txt");
        std::fs::write(&path, "   \n").unwrap();

        let identity = FileParser::documents()
            .canonicalize(&path.to_string_lossy())
            .unwrap();
        let err = DocExtractor.extract(&identity).await.unwrap_err();
        assert!(matches!(err, SiphonError::Extraction { .. }));
    }
}
