//! End-to-end pipeline scenarios driven through the library API with
//! deterministic in-test providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docdex::chunker::chunk_pages;
use docdex::config::Config;
use docdex::embedding::{CompletionClient, EmbeddingClient};
use docdex::engine::{build_index, BatchSettings};
use docdex::errors::RagError;
use docdex::models::Page;
use docdex::progress::NoProgress;
use docdex::session::DocSession;

/// Letter-frequency embedding: deterministic, and similar texts score close.
fn freq_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 27];
    for c in text.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        } else if c.is_ascii_digit() {
            v[26] += 1.0;
        }
    }
    v
}

struct FreqEmbedder {
    calls: AtomicUsize,
}

impl FreqEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for FreqEmbedder {
    fn model_name(&self) -> &str {
        "freq"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| freq_vector(t)).collect())
    }
}

/// Embedder that throttles on scripted call numbers (1-based).
struct ThrottlingEmbedder {
    inner: Arc<FreqEmbedder>,
    throttle_calls: Vec<usize>,
}

#[async_trait]
impl EmbeddingClient for ThrottlingEmbedder {
    fn model_name(&self) -> &str {
        "throttling-freq"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let call = self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.throttle_calls.contains(&call) {
            return Err(RagError::Provider(
                "embeddings API error 429 Too Many Requests: retry later".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| freq_vector(t)).collect())
    }
}

struct RecordingCompleter {
    prompts: Mutex<Vec<String>>,
}

impl RecordingCompleter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionClient for RecordingCompleter {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("the manual covers this on the cited pages".to_string())
    }
}

/// Twelve pages of distinct prose; page 3 carries a recognizable sentence.
fn twelve_pages() -> Vec<Page> {
    let fillers = [
        "general introduction to the measurement workstation and its panels",
        "safety precautions for operating near high voltage sources",
        "angle measurement between two reference lines uses the protractor tool",
        "distance calibration against the certified gauge block",
        "surface roughness sampling and filter selection",
        "exporting results to the network share",
        "maintenance intervals for the optical assembly",
        "troubleshooting camera focus drift",
        "firmware update procedure over the service port",
        "environmental limits for temperature and humidity",
        "spare part ordering codes and lead times",
        "warranty terms and service contacts",
    ];
    fillers
        .iter()
        .enumerate()
        .map(|(i, filler)| Page {
            number: i + 1,
            section: None,
            text: format!("{}\n", filler).repeat(60),
        })
        .collect()
}

fn settings(batch_size: usize, batch_delay: f64, adaptive: bool) -> BatchSettings {
    BatchSettings {
        batch_size,
        batch_delay,
        adaptive,
    }
}

fn test_config(cache_root: &std::path::Path) -> Config {
    let mut config: Config = toml::from_str("").unwrap();
    config.cache.root = cache_root.to_path_buf();
    config.embedding.batch_size = 5;
    config.embedding.batch_delay = 0.0;
    config
}

#[tokio::test(start_paused = true)]
async fn twelve_page_document_batches_and_retrieves_page_three() {
    let pages = twelve_pages();
    let chunks = chunk_pages(&pages, 1000, 200);
    assert!(chunks.len() > 5, "expected a multi-batch chunk count");

    let embedder = FreqEmbedder::new();
    let start = tokio::time::Instant::now();
    let index = build_index(
        embedder.as_ref(),
        "manual.txt",
        &chunks,
        &settings(5, 1.5, false),
        &NoProgress,
    )
    .await
    .unwrap();

    // ceil(N/5) provider calls, each pacing-delayed except the last.
    let expected_batches = chunks.len().div_ceil(5);
    assert_eq!(embedder.calls(), expected_batches);
    let elapsed = start.elapsed().as_secs_f64();
    let expected_sleep = 1.5 * (expected_batches - 1) as f64;
    assert!(
        (elapsed - expected_sleep).abs() < 0.05,
        "elapsed {} expected {}",
        elapsed,
        expected_sleep
    );

    // One entry per chunk.
    assert_eq!(index.len(), chunks.len());

    // A query drawn verbatim from page 3 returns page 3 as the top source.
    let query = "angle measurement between two reference lines uses the protractor tool";
    let hits = index.search(&freq_vector(query), 1);
    assert_eq!(hits[0].entry.meta.page, 3);
}

#[tokio::test(start_paused = true)]
async fn throttle_recovery_keeps_exactly_one_entry_per_chunk() {
    let pages = twelve_pages();
    let chunks = chunk_pages(&pages, 1000, 200);

    let inner = FreqEmbedder::new();
    let embedder = ThrottlingEmbedder {
        inner: inner.clone(),
        throttle_calls: vec![3],
    };

    let index = build_index(
        &embedder,
        "manual.txt",
        &chunks,
        &settings(5, 0.2, false),
        &NoProgress,
    )
    .await
    .unwrap();

    // The retried batch replaces the failed attempt wholesale.
    assert_eq!(index.len(), chunks.len());
}

#[tokio::test]
async fn session_roundtrip_same_answer_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");

    let body: String = twelve_pages()
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let doc_path = dir.path().join("manual.txt");
    std::fs::write(&doc_path, &body).unwrap();
    let source = doc_path.to_string_lossy().to_string();

    let query = "angle measurement between two reference lines uses the protractor tool";

    // First session: cache miss, builds and stores.
    let embedder = FreqEmbedder::new();
    let mut first = DocSession::new(
        test_config(&cache_root),
        embedder.clone(),
        RecordingCompleter::new(),
    );
    first.load(&source, None).await.unwrap();
    assert!(embedder.calls() > 0);
    let first_answer = first.ask(query).await.unwrap();
    let first_info = first.info();

    // Second session ("fresh process"): cache hit, zero embedding calls for
    // ingestion, identical top-k source pages and metadata.
    let embedder2 = FreqEmbedder::new();
    let mut second = DocSession::new(
        test_config(&cache_root),
        embedder2.clone(),
        RecordingCompleter::new(),
    );
    second.load(&source, None).await.unwrap();
    assert_eq!(embedder2.calls(), 0, "cache hit must skip embedding");

    let second_answer = second.ask(query).await.unwrap();
    assert_eq!(
        first_answer
            .sources
            .iter()
            .map(|s| s.page)
            .collect::<Vec<_>>(),
        second_answer
            .sources
            .iter()
            .map(|s| s.page)
            .collect::<Vec<_>>(),
        "top-k source pages must survive the cache roundtrip"
    );

    let second_info = second.info();
    assert_eq!(second_info.pages, first_info.pages);
    assert_eq!(second_info.chunks, first_info.chunks);
    assert_eq!(second_info.total_characters, first_info.total_characters);
}

#[tokio::test]
async fn changed_document_misses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let doc_path = dir.path().join("notes.txt");
    std::fs::write(&doc_path, "original body about calibration\n".repeat(10)).unwrap();
    let source = doc_path.to_string_lossy().to_string();

    let embedder = FreqEmbedder::new();
    let mut session = DocSession::new(
        test_config(&cache_root),
        embedder.clone(),
        RecordingCompleter::new(),
    );
    session.load(&source, None).await.unwrap();
    let calls_after_first = embedder.calls();
    assert!(calls_after_first > 0);

    // Editing the file changes size, so the old entry is never addressed.
    std::fs::write(
        &doc_path,
        "rewritten body about calibration and alignment\n".repeat(12),
    )
    .unwrap();
    session.load(&source, None).await.unwrap();
    assert!(
        embedder.calls() > calls_after_first,
        "changed document must be re-embedded"
    );
}

#[tokio::test]
async fn merged_session_answers_across_documents() {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");

    let doc_a = dir.path().join("alpha.txt");
    std::fs::write(
        &doc_a,
        "voltage range configuration and probe selection\n".repeat(15),
    )
    .unwrap();
    let doc_b = dir.path().join("beta.txt");
    std::fs::write(
        &doc_b,
        "network export settings and share permissions\n".repeat(15),
    )
    .unwrap();

    let completer = RecordingCompleter::new();
    let mut session = DocSession::new(
        test_config(&cache_root),
        FreqEmbedder::new(),
        completer.clone(),
    );
    session
        .load(&doc_a.to_string_lossy(), None)
        .await
        .unwrap();
    session.add(&doc_b.to_string_lossy(), None).await.unwrap();
    assert_eq!(session.k(), 5);

    let answer = session
        .ask("network export settings and share permissions")
        .await
        .unwrap();
    assert!(answer.sources.len() <= 5);
    assert_eq!(answer.sources[0].document, "beta.txt");

    // The stuffed prompt carried the retrieved context.
    let prompts = completer.prompts.lock().unwrap();
    assert!(prompts[0].contains("network export settings"));
}
