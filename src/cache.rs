//! Content-addressed cache for built vector indexes.
//!
//! Each cache entry is one subdirectory under the cache root, named by a
//! sha256 key over the document's identity: the URL string for web documents,
//! or path + byte size + mtime for local files — so editing or replacing a
//! file yields a new key and the stale entry is simply never addressed again.
//! Entries hold the serialized index (`index.json`) and a plain-text metadata
//! record (`meta.txt`, `key: value` lines). Entries are never updated in
//! place and never reclaimed automatically; [`IndexCache::clear_all`] is the
//! only cleanup.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::errors::RagError;
use crate::index::VectorIndex;
use crate::loader;

const INDEX_FILE: &str = "index.json";
const META_FILE: &str = "meta.txt";

/// Metadata persisted alongside a cached index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetadata {
    pub document_path: String,
    pub document_name: String,
    pub pages: usize,
    pub chunks: usize,
    pub total_characters: usize,
}

impl CacheMetadata {
    fn to_lines(&self) -> String {
        format!(
            "document_path: {}\ndocument_name: {}\npages: {}\nchunks: {}\ntotal_characters: {}\n",
            self.document_path, self.document_name, self.pages, self.chunks, self.total_characters
        )
    }

    fn parse(content: &str) -> Result<Self, RagError> {
        let mut document_path = None;
        let mut document_name = None;
        let mut pages = None;
        let mut chunks = None;
        let mut total_characters = None;

        for line in content.lines() {
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match field.trim() {
                "document_path" => document_path = Some(value.to_string()),
                "document_name" => document_name = Some(value.to_string()),
                "pages" => pages = value.parse().ok(),
                "chunks" => chunks = value.parse().ok(),
                "total_characters" => total_characters = value.parse().ok(),
                _ => {}
            }
        }

        let missing = |field: &str| {
            RagError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("cache metadata missing field: {}", field),
            ))
        };

        Ok(CacheMetadata {
            document_path: document_path.ok_or_else(|| missing("document_path"))?,
            document_name: document_name.ok_or_else(|| missing("document_name"))?,
            pages: pages.ok_or_else(|| missing("pages"))?,
            chunks: chunks.ok_or_else(|| missing("chunks"))?,
            total_characters: total_characters.ok_or_else(|| missing("total_characters"))?,
        })
    }
}

/// Filesystem-backed cache of serialized vector indexes.
#[derive(Clone, Debug)]
pub struct IndexCache {
    root: PathBuf,
}

impl IndexCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable content-address for a document identity.
    ///
    /// URLs hash the URL string itself. Local files hash path, byte size,
    /// and mtime seconds; a missing file surfaces [`RagError::NotFound`].
    pub fn cache_key(source: &str) -> Result<String, RagError> {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());

        if !loader::is_url(source) {
            let metadata = std::fs::metadata(source).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RagError::NotFound(PathBuf::from(source))
                } else {
                    RagError::Io(e)
                }
            })?;
            let mtime_secs = metadata
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH)
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            hasher.update(metadata.len().to_le_bytes());
            hasher.update(mtime_secs.to_le_bytes());
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Directory holding the entry for `key`.
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// True iff an entry exists and its metadata record is readable.
    pub async fn has(&self, key: &str) -> bool {
        fs::metadata(self.entry_dir(key).join(META_FILE))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Reconstruct a cached index and its metadata. No embedding happens.
    pub async fn load(&self, key: &str) -> Result<(VectorIndex, CacheMetadata), RagError> {
        let dir = self.entry_dir(key);

        let meta_content = fs::read_to_string(dir.join(META_FILE)).await?;
        let metadata = CacheMetadata::parse(&meta_content)?;

        let index_bytes = fs::read(dir.join(INDEX_FILE)).await?;
        let index: VectorIndex = serde_json::from_slice(&index_bytes).map_err(|e| {
            RagError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("corrupt cache index: {}", e),
            ))
        })?;

        tracing::info!(key, entries = index.len(), "loaded index from cache");
        Ok((index, metadata))
    }

    /// Persist an index and its metadata under `key`.
    ///
    /// Failures come back as [`RagError::CachePersist`], which callers treat
    /// as non-fatal: the in-memory index is still usable.
    pub async fn store(
        &self,
        key: &str,
        index: &VectorIndex,
        metadata: &CacheMetadata,
    ) -> Result<(), RagError> {
        let persist = |message: String| RagError::CachePersist {
            key: key.to_string(),
            message,
        };

        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| persist(e.to_string()))?;

        let index_bytes = serde_json::to_vec(index).map_err(|e| persist(e.to_string()))?;
        fs::write(dir.join(INDEX_FILE), index_bytes)
            .await
            .map_err(|e| persist(e.to_string()))?;
        fs::write(dir.join(META_FILE), metadata.to_lines())
            .await
            .map_err(|e| persist(e.to_string()))?;

        tracing::info!(key, entries = index.len(), "stored index in cache");
        Ok(())
    }

    /// Remove every cache entry. Returns the number of entries removed.
    pub async fn clear_all(&self) -> Result<usize, RagError> {
        if fs::metadata(&self.root).await.is_err() {
            return Ok(0);
        }

        let mut removed = 0usize;
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
                removed += 1;
            }
        }

        tracing::info!(removed, "cleared index cache");
        Ok(removed)
    }
}
