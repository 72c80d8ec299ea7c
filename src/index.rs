//! Cumulative vector index with stable ids and append-only merging.
//!
//! Ids are assigned monotonically and never reused. Merging moves another
//! index's entries in after the existing ones, in their original order, under
//! freshly assigned ids — entries are never deleted or rewritten. The whole
//! structure serializes with serde for cache persistence.

use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::models::ChunkMeta;

/// One embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: u64,
    pub vector: Vec<f32>,
    pub meta: ChunkMeta,
}

/// A retrieval hit: similarity score plus the matched entry.
#[derive(Debug, Clone)]
pub struct Scored<'a> {
    pub score: f32,
    pub entry: &'a IndexEntry,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    next_id: u64,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry under a fresh id.
    pub fn insert(&mut self, vector: Vec<f32>, meta: ChunkMeta) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(IndexEntry { id, vector, meta });
        id
    }

    /// Append-only merge: `other`'s entries join after the existing ones, in
    /// order, under new ids continuing this index's sequence.
    pub fn merge(&mut self, other: VectorIndex) {
        for entry in other.entries {
            self.insert(entry.vector, entry.meta);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Top-k nearest entries by cosine similarity, best first.
    ///
    /// Ties break on id ascending so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Scored<'_>> {
        let mut scored: Vec<Scored<'_>> = self
            .entries
            .iter()
            .map(|entry| Scored {
                score: cosine_similarity(query, &entry.vector),
                entry,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.entry.id.cmp(&b.entry.id))
        });
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(document: &str, page: usize, text: &str) -> ChunkMeta {
        ChunkMeta {
            document: document.to_string(),
            page,
            section: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn insert_assigns_monotone_ids() {
        let mut index = VectorIndex::new();
        assert_eq!(index.insert(vec![1.0, 0.0], meta("d", 1, "a")), 0);
        assert_eq!(index.insert(vec![0.0, 1.0], meta("d", 2, "b")), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn merge_is_append_only_with_fresh_ids() {
        let mut a = VectorIndex::new();
        a.insert(vec![1.0, 0.0], meta("d1", 1, "a"));
        a.insert(vec![0.0, 1.0], meta("d1", 2, "b"));

        let mut b = VectorIndex::new();
        b.insert(vec![0.5, 0.5], meta("d2", 1, "c"));

        a.merge(b);
        assert_eq!(a.len(), 3);
        let ids: Vec<u64> = a.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(a.entries()[2].meta.document, "d2");
    }

    #[test]
    fn merged_ids_continue_after_earlier_merges() {
        let mut cumulative = VectorIndex::new();
        for round in 0..3 {
            let mut part = VectorIndex::new();
            part.insert(vec![round as f32, 1.0], meta("d", round + 1, "x"));
            cumulative.merge(part);
        }
        let ids: Vec<u64> = cumulative.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn search_returns_best_first() {
        let mut index = VectorIndex::new();
        index.insert(vec![1.0, 0.0], meta("d", 1, "east"));
        index.insert(vec![0.0, 1.0], meta("d", 2, "north"));
        index.insert(vec![0.7, 0.7], meta("d", 3, "northeast"));

        let hits = index.search(&[1.0, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.meta.page, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn search_k_larger_than_len() {
        let mut index = VectorIndex::new();
        index.insert(vec![1.0], meta("d", 1, "only"));
        assert_eq!(index.search(&[1.0], 5).len(), 1);
    }

    #[test]
    fn serde_roundtrip_preserves_ids() {
        let mut index = VectorIndex::new();
        index.insert(vec![0.25, -1.5], meta("d", 4, "text"));
        index.insert(vec![0.5, 0.5], meta("d", 7, "more"));

        let json = serde_json::to_string(&index).unwrap();
        let mut restored: VectorIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.entries()[1].meta.page, 7);
        // Ids keep counting from where the original left off.
        assert_eq!(restored.insert(vec![0.0, 0.0], meta("d", 9, "new")), 2);
    }
}
