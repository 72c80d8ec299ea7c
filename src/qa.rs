//! Query-time retrieval and answer synthesis.
//!
//! Embeds the query, retrieves the top-k chunks by cosine similarity, stuffs
//! them into a single prompt, and asks the completion provider for an answer.
//! The returned [`Answer`] carries the source chunks' page references, best
//! match first.

use crate::embedding::{CompletionClient, EmbeddingClient};
use crate::errors::RagError;
use crate::index::{Scored, VectorIndex};
use crate::models::{Answer, PageRef};

/// Answer `query` against `index`, retrieving the top `k` chunks.
pub async fn answer(
    query: &str,
    index: &VectorIndex,
    k: usize,
    embedder: &dyn EmbeddingClient,
    completer: &dyn CompletionClient,
) -> Result<Answer, RagError> {
    let query_vec = embedder
        .embed(&[query.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::Provider("empty embedding response".to_string()))?;

    let hits = index.search(&query_vec, k);
    tracing::debug!(query, hits = hits.len(), "retrieved context chunks");

    let prompt = build_prompt(query, &hits);
    let text = completer.complete(&prompt).await?;

    let sources = hits
        .iter()
        .map(|hit| PageRef {
            document: hit.entry.meta.document.clone(),
            page: hit.entry.meta.page,
        })
        .collect();

    Ok(Answer { text, sources })
}

/// Stuff retrieved chunks into one prompt, numbered and tagged with their
/// document and page so the model can cite them.
fn build_prompt(query: &str, hits: &[Scored<'_>]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say so.\n\nContext:\n",
    );
    for (i, hit) in hits.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] ({}, page {})\n{}\n\n",
            i + 1,
            hit.entry.meta.document,
            hit.entry.meta.page,
            hit.entry.meta.text
        ));
    }
    prompt.push_str(&format!("Question: {}\nAnswer:", query));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMeta;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Letter-frequency embedding: identical text → identical vector.
    fn freq_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 26];
        for c in text.chars().flat_map(|c| c.to_lowercase()) {
            if c.is_ascii_lowercase() {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        v
    }

    struct FreqEmbedder;

    #[async_trait]
    impl EmbeddingClient for FreqEmbedder {
        fn model_name(&self) -> &str {
            "freq"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts.iter().map(|t| freq_vector(t)).collect())
        }
    }

    /// Records the prompt and answers with a canned string.
    struct EchoCompleter {
        last_prompt: Mutex<String>,
    }

    #[async_trait]
    impl CompletionClient for EchoCompleter {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String, RagError> {
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            Ok("synthesized answer".to_string())
        }
    }

    fn indexed(texts: &[(&str, usize)]) -> VectorIndex {
        let mut index = VectorIndex::new();
        for (text, page) in texts {
            index.insert(
                freq_vector(text),
                ChunkMeta {
                    document: "manual.pdf".to_string(),
                    page: *page,
                    section: None,
                    text: text.to_string(),
                },
            );
        }
        index
    }

    #[tokio::test]
    async fn retrieves_matching_page_as_top_source() {
        let index = indexed(&[
            ("voltage range configuration", 1),
            ("angle measurement between two lines", 3),
            ("maintenance schedule and cleaning", 7),
        ]);
        let completer = EchoCompleter {
            last_prompt: Mutex::new(String::new()),
        };

        let result = answer(
            "angle measurement between two lines",
            &index,
            2,
            &FreqEmbedder,
            &completer,
        )
        .await
        .unwrap();

        assert_eq!(result.text, "synthesized answer");
        assert_eq!(result.sources[0].page, 3);
        assert_eq!(result.sources.len(), 2);
    }

    #[tokio::test]
    async fn prompt_contains_context_and_question() {
        let index = indexed(&[("distance measurement uses two points", 2)]);
        let completer = EchoCompleter {
            last_prompt: Mutex::new(String::new()),
        };

        answer("how does distance measurement work", &index, 1, &FreqEmbedder, &completer)
            .await
            .unwrap();

        let prompt = completer.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("distance measurement uses two points"));
        assert!(prompt.contains("manual.pdf, page 2"));
        assert!(prompt.contains("Question: how does distance measurement work"));
    }

    #[tokio::test]
    async fn empty_index_still_answers_with_no_sources() {
        let index = VectorIndex::new();
        let completer = EchoCompleter {
            last_prompt: Mutex::new(String::new()),
        };

        let result = answer("anything", &index, 3, &FreqEmbedder, &completer)
            .await
            .unwrap();
        assert!(result.sources.is_empty());
    }
}
