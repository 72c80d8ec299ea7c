//! Ingestion progress reporting.
//!
//! Reports observable progress while an index is being built — which batch is
//! embedding, how many chunks are done, and throttle-recovery waits — so long
//! ingestion runs are not silent. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

/// A single progress event during index construction.
#[derive(Clone, Debug)]
pub enum IngestEvent {
    /// A batch is about to be embedded.
    Embedding {
        document: String,
        batch: usize,
        chunks_done: usize,
        chunks_total: usize,
    },
    /// A throttle was hit; the engine is waiting before retrying.
    Throttled { document: String, wait_secs: f64 },
    /// All batches finished.
    Finished { document: String, chunks: usize },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestReporter: Send + Sync {
    /// Emit a progress event. Called from the batch engine.
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress: "embed manual.pdf  batch 3  120 / 480 chunks".
pub struct StderrProgress;

impl IngestReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Embedding {
                document,
                batch,
                chunks_done,
                chunks_total,
            } => format!(
                "embed {}  batch {}  {} / {} chunks\n",
                document, batch, chunks_done, chunks_total
            ),
            IngestEvent::Throttled {
                document,
                wait_secs,
            } => format!(
                "embed {}  rate limited, waiting {:.1}s...\n",
                document, wait_secs
            ),
            IngestEvent::Finished { document, chunks } => {
                format!("embed {}  done ({} chunks)\n", document, chunks)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestReporter for JsonProgress {
    fn report(&self, event: IngestEvent) {
        let obj = match &event {
            IngestEvent::Embedding {
                document,
                batch,
                chunks_done,
                chunks_total,
            } => serde_json::json!({
                "event": "embedding",
                "document": document,
                "batch": batch,
                "chunks_done": chunks_done,
                "chunks_total": chunks_total,
            }),
            IngestEvent::Throttled {
                document,
                wait_secs,
            } => serde_json::json!({
                "event": "throttled",
                "document": document,
                "wait_secs": wait_secs,
            }),
            IngestEvent::Finished { document, chunks } => serde_json::json!({
                "event": "finished",
                "document": document,
                "chunks": chunks,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
