//! Document loader adapter: path/URL → typed pages.
//!
//! Resolves the effective document type (explicit override or detection) and
//! produces the ordered page sequence the chunker consumes. Detection order:
//! an `http`/`https` URL is `web`; otherwise the file extension decides, with
//! plain text as the default.
//!
//! | extension | type |
//! |-----------|------|
//! | `pdf` | pdf |
//! | `ppt`, `pptx` | slides |
//! | `doc`, `docx` | word |
//! | `txt`, `md`, anything else | text |

use std::path::Path;
use std::time::Duration;

use crate::errors::RagError;
use crate::extract;
use crate::models::{Document, Page};

const WEB_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Pdf,
    Slides,
    Word,
    Web,
    Text,
}

impl DocKind {
    /// Parse an explicit type name. Accepts the aliases users actually type.
    pub fn parse(s: &str) -> Option<DocKind> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocKind::Pdf),
            "slides" | "ppt" | "pptx" => Some(DocKind::Slides),
            "word" | "doc" | "docx" => Some(DocKind::Word),
            "web" | "url" | "html" => Some(DocKind::Web),
            "text" | "txt" | "md" => Some(DocKind::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Pdf => "pdf",
            DocKind::Slides => "slides",
            DocKind::Word => "word",
            DocKind::Web => "web",
            DocKind::Text => "text",
        }
    }
}

/// True when the source string parses as an `http`/`https` URL.
pub fn is_url(source: &str) -> bool {
    matches!(
        reqwest::Url::parse(source),
        Ok(url) if url.scheme() == "http" || url.scheme() == "https"
    )
}

/// Resolve the effective type for a source string.
///
/// An explicit type (other than `"auto"`) overrides detection; an unknown
/// explicit type is [`RagError::UnsupportedType`].
pub fn detect_kind(source: &str, explicit: Option<&str>) -> Result<DocKind, RagError> {
    if let Some(name) = explicit {
        if !name.eq_ignore_ascii_case("auto") {
            return DocKind::parse(name).ok_or_else(|| RagError::UnsupportedType(name.to_string()));
        }
    }

    if is_url(source) {
        return Ok(DocKind::Web);
    }

    let extension = Path::new(source)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    Ok(match extension.as_str() {
        "pdf" => DocKind::Pdf,
        "ppt" | "pptx" => DocKind::Slides,
        "doc" | "docx" => DocKind::Word,
        _ => DocKind::Text,
    })
}

/// Load a document's pages. No chunking happens here.
pub async fn load_document(source: &str, kind: DocKind) -> Result<Document, RagError> {
    match kind {
        DocKind::Web => load_web(source).await,
        DocKind::Pdf | DocKind::Slides | DocKind::Word | DocKind::Text => {
            let path = Path::new(source);
            if !path.exists() {
                return Err(RagError::NotFound(path.to_path_buf()));
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| source.to_string());

            let pages = match kind {
                DocKind::Pdf => {
                    let bytes = tokio::fs::read(path).await?;
                    number_pages(extract::pdf_pages(&bytes)?)
                }
                DocKind::Slides => {
                    let bytes = tokio::fs::read(path).await?;
                    number_pages(extract::pptx_slides(&bytes)?)
                }
                DocKind::Word => {
                    let bytes = tokio::fs::read(path).await?;
                    single_page(extract::docx_text(&bytes)?)
                }
                DocKind::Text => {
                    let text = tokio::fs::read_to_string(path).await?;
                    single_page(text)
                }
                DocKind::Web => unreachable!(),
            };

            tracing::info!(source, kind = kind.as_str(), pages = pages.len(), "loaded document");
            Ok(Document {
                source: source.to_string(),
                name,
                pages,
            })
        }
    }
}

async fn load_web(source: &str) -> Result<Document, RagError> {
    let client = reqwest::Client::builder()
        .timeout(WEB_FETCH_TIMEOUT)
        .build()?;
    let response = client.get(source).send().await?.error_for_status()?;
    let html = response.text().await?;
    let text = html_to_text(&html);

    tracing::info!(source, bytes = html.len(), "fetched web document");
    Ok(Document {
        source: source.to_string(),
        name: source.to_string(),
        pages: single_page(text),
    })
}

/// Strip markup and collect visible text, skipping script/style content.
fn html_to_text(html: &str) -> String {
    const SKIP: [&str; 3] = ["script", "style", "noscript"];

    let doc = scraper::Html::parse_document(html);
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let parent_is_skipped = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| SKIP.contains(&e.name())))
                .unwrap_or(false);
            if parent_is_skipped {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
        }
    }
    out
}

fn number_pages(texts: Vec<String>) -> Vec<Page> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: i + 1,
            section: None,
            text,
        })
        .collect()
}

fn single_page(text: String) -> Vec<Page> {
    vec![Page {
        number: 1,
        section: None,
        text,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_urls_as_web() {
        assert_eq!(detect_kind("https://example.com/manual", None).unwrap(), DocKind::Web);
        assert_eq!(detect_kind("http://example.com/a.pdf", None).unwrap(), DocKind::Web);
    }

    #[test]
    fn detects_by_extension() {
        assert_eq!(detect_kind("manual.pdf", None).unwrap(), DocKind::Pdf);
        assert_eq!(detect_kind("deck.pptx", None).unwrap(), DocKind::Slides);
        assert_eq!(detect_kind("deck.ppt", None).unwrap(), DocKind::Slides);
        assert_eq!(detect_kind("report.docx", None).unwrap(), DocKind::Word);
        assert_eq!(detect_kind("report.doc", None).unwrap(), DocKind::Word);
        assert_eq!(detect_kind("notes.txt", None).unwrap(), DocKind::Text);
        assert_eq!(detect_kind("notes.md", None).unwrap(), DocKind::Text);
    }

    #[test]
    fn unknown_extension_defaults_to_text() {
        assert_eq!(detect_kind("data.log", None).unwrap(), DocKind::Text);
        assert_eq!(detect_kind("no_extension", None).unwrap(), DocKind::Text);
    }

    #[test]
    fn explicit_type_overrides_detection() {
        assert_eq!(detect_kind("weird.bin", Some("pdf")).unwrap(), DocKind::Pdf);
        assert_eq!(detect_kind("manual.pdf", Some("auto")).unwrap(), DocKind::Pdf);
    }

    #[test]
    fn unknown_explicit_type_is_unsupported() {
        let err = detect_kind("file.xyz", Some("spreadsheet")).unwrap_err();
        assert!(matches!(err, RagError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = load_document("/definitely/not/here.txt", DocKind::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn text_file_loads_as_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\nline two").unwrap();

        let doc = load_document(path.to_str().unwrap(), DocKind::Text)
            .await
            .unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].number, 1);
        assert_eq!(doc.pages[0].text, "line one\nline two");
        assert_eq!(doc.name, "notes.txt");
    }

    #[test]
    fn html_to_text_skips_scripts() {
        let html = "<html><head><style>body { color: red; }</style></head>\
                    <body><h1>Title</h1><script>var x = 1;</script><p>Body text.</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("Body text."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
    }
}
