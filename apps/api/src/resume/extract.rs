//! Text Extractor: linear text out of an uploaded DOCX or PDF.
//!
//! DOCX bodies are read as a paragraph sequence from `word/document.xml`.
//! PDFs are read as a page sequence; a page that cannot be read is skipped.

use std::io::{Cursor, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::resume::ResumeError;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const DOCX_BODY: &str = "word/document.xml";

/// An uploaded document whose format has been identified.
#[derive(Debug, Clone)]
pub enum RawDocument {
    Docx(Vec<u8>),
    Pdf(Vec<u8>),
}

impl RawDocument {
    /// Identifies the format from the file name, falling back to magic bytes.
    pub fn from_upload(file_name: Option<&str>, bytes: Vec<u8>) -> Result<Self, ResumeError> {
        let ext = file_name
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match ext.as_deref() {
            Some("docx") => Ok(RawDocument::Docx(bytes)),
            Some("pdf") if bytes.starts_with(PDF_MAGIC) => Ok(RawDocument::Pdf(bytes)),
            Some("pdf") => Err(ResumeError::CorruptInput(
                "file has a .pdf name but is not a PDF".to_string(),
            )),
            _ if bytes.starts_with(PDF_MAGIC) => Ok(RawDocument::Pdf(bytes)),
            _ if bytes.starts_with(ZIP_MAGIC) => Ok(RawDocument::Docx(bytes)),
            Some(other) => Err(ResumeError::UnsupportedFormat(format!(".{other}"))),
            None => Err(ResumeError::UnsupportedFormat(
                "unrecognised file contents".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawDocument::Docx(_) => "docx",
            RawDocument::Pdf(_) => "pdf",
        }
    }
}

/// Newline-joined text of a document, guaranteed non-blank.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Extracts the text of `doc`.
pub fn extract(doc: &RawDocument) -> Result<ExtractedText, ResumeError> {
    let blocks = match doc {
        RawDocument::Docx(bytes) => docx_paragraphs(bytes)?,
        RawDocument::Pdf(bytes) => pdf_pages(bytes)?,
    };

    let text = blocks.join("\n");
    if text.trim().is_empty() {
        return Err(ResumeError::EmptyContent);
    }

    debug!("Extracted {} chars from {}", text.len(), doc.kind());
    Ok(ExtractedText(text))
}

// ──────────────────────────────────────────────
// DOCX
// ──────────────────────────────────────────────

fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ResumeError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ResumeError::CorruptInput(format!("failed to open DOCX archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| ResumeError::CorruptInput(format!("missing {DOCX_BODY}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ResumeError::CorruptInput(format!("failed to read {DOCX_BODY}: {e}")))?;

    parse_document_xml(&xml)
}

/// Collects the text of every `w:p` in document order.
fn parse_document_xml(xml: &str) -> Result<Vec<String>, ResumeError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:r" => in_run = true,
                b"w:t" => in_text = true,
                _ => {}
            },
            // Tab stops in `w:pPr` are also `w:tab`; only runs carry text.
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" if in_paragraph && in_run => current.push('\t'),
                b"w:br" | b"w:cr" if in_paragraph && in_run => current.push('\n'),
                // A self-closing paragraph is an empty line.
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| ResumeError::CorruptInput(format!("bad DOCX text: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" => in_run = false,
                b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ResumeError::CorruptInput(format!("DOCX XML parse error: {e}")))
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

// ──────────────────────────────────────────────
// PDF
// ──────────────────────────────────────────────

fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ResumeError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(pdf_load_error)?;

    // pdf-extract panics on some malformed content streams.
    let by_pages = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    let pages = match by_pages {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!("pdf-extract failed ({e}), falling back to per-page extraction");
            per_page_fallback(&doc)
        }
        Err(_) => {
            warn!("pdf-extract panicked, falling back to per-page extraction");
            per_page_fallback(&doc)
        }
    };

    Ok(pages
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect())
}

fn pdf_load_error(e: lopdf::Error) -> ResumeError {
    match e {
        lopdf::Error::Decryption(_) => {
            ResumeError::CorruptInput("Could not decrypt password-protected PDF".to_string())
        }
        other => ResumeError::CorruptInput(format!("failed to load PDF: {other}")),
    }
}

fn per_page_fallback(doc: &lopdf::Document) -> Vec<String> {
    doc.get_pages()
        .keys()
        .filter_map(|&number| match doc.extract_text(&[number]) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Could not extract text from page {number}: {e}");
                None
            }
        })
        .collect()
}

/// In-memory DOCX whose body is `document_xml`.
#[cfg(test)]
pub(crate) fn docx_fixture_from_xml(document_xml: &str) -> Vec<u8> {
    use std::io::Write;

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(DOCX_BODY, options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// In-memory DOCX with one paragraph per entry.
#[cfg(test)]
pub(crate) fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| {
            let text = p.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
            format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
        })
        .collect();
    docx_fixture_from_xml(&format!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pdf(lines: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut content = String::from("BT /F1 12 Tf 72 720 Td 14 TL");
        for line in lines {
            content.push_str(&format!(" ({line}) Tj T*"));
        }
        content.push_str(" ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">jane@example.com </w:t></w:r><w:r><w:tab/><w:t>555-123-4567</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>SKILLS</w:t></w:r></w:p>
    <w:p><w:r><w:t>R&amp;D, Rust</w:t><w:br/><w:t>Go</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_from_upload_by_extension() {
        let doc = RawDocument::from_upload(Some("cv.DOCX"), vec![1, 2, 3]).unwrap();
        assert!(matches!(doc, RawDocument::Docx(_)));

        let doc = RawDocument::from_upload(Some("cv.pdf"), b"%PDF-1.4".to_vec()).unwrap();
        assert!(matches!(doc, RawDocument::Pdf(_)));
    }

    #[test]
    fn test_from_upload_by_magic_bytes() {
        let doc = RawDocument::from_upload(None, b"%PDF-1.7 rest".to_vec()).unwrap();
        assert_eq!(doc.kind(), "pdf");

        let doc = RawDocument::from_upload(Some("upload"), docx_fixture_from_xml(DOCUMENT_XML)).unwrap();
        assert_eq!(doc.kind(), "docx");
    }

    #[test]
    fn test_from_upload_rejects_unsupported() {
        let err = RawDocument::from_upload(Some("cv.txt"), b"plain text".to_vec()).unwrap_err();
        assert!(matches!(err, ResumeError::UnsupportedFormat(ref ext) if ext == ".txt"));

        let err = RawDocument::from_upload(None, b"plain text".to_vec()).unwrap_err();
        assert!(matches!(err, ResumeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_from_upload_fake_pdf_is_corrupt() {
        let err = RawDocument::from_upload(Some("cv.pdf"), b"not a pdf".to_vec()).unwrap_err();
        assert!(matches!(err, ResumeError::CorruptInput(_)));
    }

    #[test]
    fn test_extract_docx_paragraphs() {
        let text = extract(&RawDocument::Docx(docx_fixture_from_xml(DOCUMENT_XML))).unwrap();
        assert_eq!(
            text.as_str(),
            "Jane Doe\njane@example.com \t555-123-4567\n\nSKILLS\nR&D, Rust\nGo"
        );
    }

    #[test]
    fn test_docx_fixture_round_trips_paragraphs() {
        let bytes = docx_fixture(&["Jane Doe", "R&D <lead>"]);
        let text = extract(&RawDocument::Docx(bytes)).unwrap();
        assert_eq!(text.as_str(), "Jane Doe\nR&D <lead>");
    }

    #[test]
    fn test_extract_docx_without_text_is_empty_content() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p/><w:p><w:r/></w:p></w:body></w:document>"#;
        let err = extract(&RawDocument::Docx(docx_fixture_from_xml(xml))).unwrap_err();
        assert!(matches!(err, ResumeError::EmptyContent));
    }

    #[test]
    fn test_extract_docx_bad_archive_is_corrupt() {
        let err = extract(&RawDocument::Docx(b"PK\x03\x04garbage".to_vec())).unwrap_err();
        assert!(matches!(err, ResumeError::CorruptInput(_)));
    }

    #[test]
    fn test_extract_pdf_text() {
        let pdf = make_pdf(&["Jane Doe", "SUMMARY", "Backend engineer"]);
        let text = extract(&RawDocument::Pdf(pdf)).unwrap();
        assert!(text.as_str().contains("Jane Doe"));
        assert!(text.as_str().contains("Backend engineer"));
    }

    #[test]
    fn test_extract_unparseable_pdf_is_corrupt() {
        let err = extract(&RawDocument::Pdf(b"%PDF-1.4\nnot really".to_vec())).unwrap_err();
        assert!(matches!(err, ResumeError::CorruptInput(_)));
    }

    #[test]
    fn test_extract_docx_ignores_tab_stop_definitions() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
<w:p><w:pPr><w:tabs><w:tab w:val="right" w:pos="9360"/></w:tabs></w:pPr><w:r><w:t>Jane Doe</w:t></w:r></w:p>
<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Acme</w:t><w:tab/><w:t>2020</w:t></w:r></w:p>
</w:body></w:document>"#;
        let text = extract(&RawDocument::Docx(docx_fixture_from_xml(xml))).unwrap();
        assert_eq!(text.as_str(), "Jane Doe\nAcme\t2020");
    }

    #[test]
    fn test_decryption_failure_is_reported_as_password_protected() {
        let err = pdf_load_error(lopdf::Error::Decryption(
            lopdf::encryption::DecryptionError::IncorrectPassword,
        ));
        assert!(matches!(
            err,
            ResumeError::CorruptInput(ref msg) if msg == "Could not decrypt password-protected PDF"
        ));

        let err = pdf_load_error(lopdf::Error::PageNumberNotFound(3));
        assert!(matches!(err, ResumeError::CorruptInput(ref msg) if msg.starts_with("failed to load PDF")));
    }

    #[test]
    fn test_per_page_fallback_skips_unreadable_pages() {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();

        let good_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        // Identity-H without a ToUnicode map cannot be decoded.
        let broken_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Missing",
            "Encoding" => "Identity-H",
        });

        let mut kids = Vec::new();
        for (font_id, line) in [(good_font, "Jane Doe"), (broken_font, "Lost page")] {
            let content = format!("BT /F1 12 Tf 72 720 Td ({line}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let pages = per_page_fallback(&doc);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("Jane Doe"));
    }
}
