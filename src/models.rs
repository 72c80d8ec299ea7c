//! Core data types flowing through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One raw text unit produced by the loader: a PDF page, a slide, a Word
/// document body, a fetched web page, or a whole text file.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based position within the source document.
    pub number: usize,
    /// Optional section label (e.g. a slide title), when the format carries one.
    pub section: Option<String>,
    pub text: String,
}

/// A loaded document: identity plus its ordered pages.
///
/// Immutable once loaded; the session facade owns it for the lifetime of the
/// conversation.
#[derive(Debug, Clone)]
pub struct Document {
    /// The path or URL string the document was loaded from.
    pub source: String,
    /// Display name (file stem or URL).
    pub name: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn total_characters(&self) -> usize {
        self.pages.iter().map(|p| p.text.len()).sum()
    }
}

/// A bounded substring of one page's text, prepared for embedding.
///
/// Chunks are ephemeral: produced by the chunker, consumed by the batch
/// engine, after which only the vectors and [`ChunkMeta`] survive.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    /// Source page number (copied from the page, never a borrow).
    pub page: usize,
    pub section: Option<String>,
}

/// Metadata retained in the vector index for each embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    pub document: String,
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub text: String,
}

/// A source reference returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub document: String,
    pub page: usize,
}

/// An answer synthesized from retrieved chunks.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Page references of the retrieved source chunks, best match first.
    pub sources: Vec<PageRef>,
}
