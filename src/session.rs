//! Index & QA facade.
//!
//! A [`DocSession`] owns the live vector index and document list for one
//! conversation and exposes the four operations the orchestration layer is
//! allowed to see: [`load`](DocSession::load), [`add`](DocSession::add),
//! [`ask`](DocSession::ask), and [`info`](DocSession::info). Providers are
//! injected as trait objects, so the tool layer never touches a concrete
//! implementation.
//!
//! The cache is consulted before any embedding work: a hit restores the
//! index and its metadata without a single provider call. Retrieval width
//! starts at the configured base (3) and widens once to the merged width (5)
//! when a second document joins the index.
//!
//! Callers must serialize access — one session, one conversation, no
//! concurrent ingestion against the same instance.

use std::sync::Arc;

use crate::cache::{CacheMetadata, IndexCache};
use crate::chunker;
use crate::config::Config;
use crate::embedding::{
    create_completion_client, create_embedding_client, CompletionClient, EmbeddingClient,
};
use crate::engine::{self, BatchSettings};
use crate::errors::RagError;
use crate::index::VectorIndex;
use crate::loader;
use crate::models::Answer;
use crate::progress::{IngestReporter, NoProgress};
use crate::qa;

/// Per-document bookkeeping, built from a fresh ingestion or a cache hit.
#[derive(Debug, Clone)]
pub struct DocRecord {
    pub source: String,
    pub name: String,
    pub pages: usize,
    pub chunks: usize,
    pub total_characters: usize,
    /// True when the record was restored from the cache rather than built.
    pub from_cache: bool,
}

/// Aggregate counts over every document in the session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub documents: Vec<String>,
    pub pages: usize,
    pub chunks: usize,
    pub total_characters: usize,
}

struct BuiltDocument {
    index: VectorIndex,
    record: DocRecord,
}

pub struct DocSession {
    config: Config,
    embedder: Arc<dyn EmbeddingClient>,
    completer: Arc<dyn CompletionClient>,
    cache: Option<IndexCache>,
    reporter: Box<dyn IngestReporter>,
    index: Option<VectorIndex>,
    documents: Vec<DocRecord>,
    k: usize,
}

impl DocSession {
    /// Build a session with injected providers.
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingClient>,
        completer: Arc<dyn CompletionClient>,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| IndexCache::new(config.cache.root.clone()));
        let k = config.retrieval.base_k;
        Self {
            config,
            embedder,
            completer,
            cache,
            reporter: Box::new(NoProgress),
            index: None,
            documents: Vec::new(),
            k,
        }
    }

    /// Build a session with providers resolved from configuration.
    pub fn from_config(config: Config) -> Result<Self, RagError> {
        let embedder = create_embedding_client(&config.embedding)?;
        let completer = create_completion_client(&config.completion)?;
        Ok(Self::new(config, embedder, completer))
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn IngestReporter>) {
        self.reporter = reporter;
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    /// Current retrieval width.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Build or restore an index for `source` and install it as the live one.
    ///
    /// Replaces any previously loaded index and resets the retrieval width.
    pub async fn load(&mut self, source: &str, doc_type: Option<&str>) -> Result<(), RagError> {
        let built = self.build_or_restore(source, doc_type).await?;
        self.index = Some(built.index);
        self.documents = vec![built.record];
        self.k = self.config.retrieval.base_k;
        Ok(())
    }

    /// Ingest another document and merge its index into the live one.
    ///
    /// Requires a prior successful [`load`](DocSession::load); widens the
    /// retrieval width to the merged value.
    pub async fn add(&mut self, source: &str, doc_type: Option<&str>) -> Result<(), RagError> {
        if self.index.is_none() {
            return Err(RagError::InvalidState(
                "load a document before adding another",
            ));
        }

        let built = self.build_or_restore(source, doc_type).await?;
        if let Some(index) = self.index.as_mut() {
            index.merge(built.index);
        }
        self.documents.push(built.record);
        self.k = self.config.retrieval.merged_k;
        Ok(())
    }

    /// Answer a query against the live index.
    pub async fn ask(&self, query: &str) -> Result<Answer, RagError> {
        let Some(index) = self.index.as_ref() else {
            return Err(RagError::InvalidState("no document loaded"));
        };
        qa::answer(
            query,
            index,
            self.k,
            self.embedder.as_ref(),
            self.completer.as_ref(),
        )
        .await
    }

    /// Aggregate counts for the loaded documents. Cache-restored documents
    /// report their stored metadata; freshly built ones report computed
    /// counts.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            documents: self.documents.iter().map(|d| d.name.clone()).collect(),
            pages: self.documents.iter().map(|d| d.pages).sum(),
            chunks: self.documents.iter().map(|d| d.chunks).sum(),
            total_characters: self.documents.iter().map(|d| d.total_characters).sum(),
        }
    }

    pub fn documents(&self) -> &[DocRecord] {
        &self.documents
    }

    /// The load/add pipeline: cache lookup first, then
    /// loader → chunker → batch engine, then best-effort persistence.
    async fn build_or_restore(
        &self,
        source: &str,
        doc_type: Option<&str>,
    ) -> Result<BuiltDocument, RagError> {
        let kind = loader::detect_kind(source, doc_type)?;
        let key = IndexCache::cache_key(source)?;

        if let Some(cache) = self.cache.as_ref() {
            if cache.has(&key).await {
                let (index, meta) = cache.load(&key).await?;
                tracing::info!(source, key, "cache hit, skipping embedding");
                return Ok(BuiltDocument {
                    index,
                    record: record_from_meta(source, &meta, true),
                });
            }
        }

        let document = loader::load_document(source, kind).await?;
        let chunks = chunker::chunk_pages(
            &document.pages,
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        );
        tracing::info!(source, pages = document.pages.len(), chunks = chunks.len(), "chunked document");

        let settings = BatchSettings::from_config(&self.config.embedding);
        let index = engine::build_index(
            self.embedder.as_ref(),
            &document.name,
            &chunks,
            &settings,
            self.reporter.as_ref(),
        )
        .await?;

        let meta = CacheMetadata {
            document_path: source.to_string(),
            document_name: document.name.clone(),
            pages: document.pages.len(),
            chunks: chunks.len(),
            total_characters: document.total_characters(),
        };

        if let Some(cache) = self.cache.as_ref() {
            if let Err(err) = cache.store(&key, &index, &meta).await {
                tracing::warn!(%err, source, "cache persistence failed; continuing with in-memory index");
            }
        }

        Ok(BuiltDocument {
            index,
            record: record_from_meta(source, &meta, false),
        })
    }
}

fn record_from_meta(source: &str, meta: &CacheMetadata, from_cache: bool) -> DocRecord {
    DocRecord {
        source: source.to_string(),
        name: meta.document_name.clone(),
        pages: meta.pages,
        chunks: meta.chunks,
        total_characters: meta.total_characters,
        from_cache,
    }
}
