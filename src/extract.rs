//! Text extraction for binary document formats (PDF, DOCX, PPTX).
//!
//! The loader supplies raw bytes; this module returns plain UTF-8 text at
//! page granularity: one string per PDF page, one per slide, a single body
//! for Word documents. No panics — malformed input returns [`RagError::Extract`]
//! and the ingestion aborts cleanly.

use std::io::Read;

use crate::errors::RagError;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract one text string per PDF page.
pub fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>, RagError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Extract(format!("PDF extraction failed: {}", e)))
}

/// Extract the body text of a Word document (`word/document.xml` text runs).
pub fn docx_text(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extract(e.to_string()))?;
    let xml = zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    text_runs(&xml)
}

/// Extract one text string per slide, in slide order.
pub fn pptx_slides(bytes: &[u8]) -> Result<Vec<String>, RagError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extract(e.to_string()))?;

    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        slides.push(text_runs(&xml)?);
    }
    Ok(slides)
}

fn zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, RagError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| RagError::Extract(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| RagError::Extract(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(RagError::Extract(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Collect the contents of all `<t>` text-run elements, space-joined.
///
/// Both WordprocessingML (`w:t`) and DrawingML (`a:t`) store visible text in
/// elements whose local name is `t`, so one walker serves DOCX and PPTX.
fn text_runs(xml: &[u8]) -> Result<String, RagError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(RagError::Extract(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = pdf_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = docx_text(b"not a zip").unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_pptx() {
        let err = pptx_slides(b"not a zip").unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
    }

    #[test]
    fn text_runs_joins_t_elements() {
        let xml = br#"<?xml version="1.0"?>
            <w:document xmlns:w="http://example/w">
              <w:body><w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t>world</w:t></w:r></w:p></w:body>
            </w:document>"#;
        let text = text_runs(xml).unwrap();
        assert_eq!(text, "Hello world");
    }
}
