//! Batched vector-index construction under an external rate limit.
//!
//! The engine turns an ordered chunk sequence into one cumulative
//! [`VectorIndex`]: chunks are partitioned into consecutive batches at the
//! current effective batch size, each batch is embedded in a single provider
//! call, and the per-batch indexes are folded into the cumulative one in
//! batch order. Calls are paced with an inter-batch delay, and both the delay
//! and the batch size adapt to throttling:
//!
//! - After two clean batches, adaptive tuning speculatively drops the delay
//!   to a fast floor, remembering the old delay as "last known good".
//! - On a throttle (HTTP 429 / "Too Many Requests" signature), that last
//!   known good delay is restored and **locked** for the rest of the run; if
//!   there is nothing to restore yet, the batch size shrinks instead.
//! - The failed batch is retried from the same position — never skipped,
//!   never duplicated — after a recovery wait of at least
//!   [`MIN_RECOVERY_SECS`].
//!
//! All tuning state lives in a run-scoped [`RunState`] constructed per call,
//! so nothing leaks between ingestion runs. Execution is strictly sequential:
//! one batch in flight, sleeps between calls, no parallel submission — the
//! rate limit is a shared resource to pace, not to race.

use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingClient;
use crate::errors::RagError;
use crate::index::VectorIndex;
use crate::models::{Chunk, ChunkMeta};
use crate::progress::{IngestEvent, IngestReporter};

/// Pacing floor once adaptive tuning kicks in (seconds).
pub const FAST_DELAY_FLOOR: f64 = 0.1;
/// Batch-size decrement applied on an unlocked throttle.
pub const BATCH_SIZE_DECREMENT: usize = 2;
/// Batch size never shrinks below this.
pub const MIN_BATCH_SIZE: usize = 2;
/// Minimum recovery wait after a throttle (seconds); actual wait is
/// `max(3 × delay, MIN_RECOVERY_SECS)`.
pub const MIN_RECOVERY_SECS: f64 = 5.0;
/// Clean batches required before the delay is speculatively lowered.
const CLEAN_BATCHES_BEFORE_LOWERING: usize = 2;
/// Retry budget per batch position; exhaustion surfaces `RateLimited`.
const MAX_BATCH_ATTEMPTS: u32 = 8;

/// Named performance preset: initial batch size and inter-batch delay.
///
/// | profile | batch size | delay |
/// |---------|-----------:|------:|
/// | turbo   | 100 | 0.1 |
/// | extreme | 200 | 0.1 |
/// | ultra   | 300 | 0.1 |
/// | maximum | 400 | 0.1 |
/// | insane  | 500 | 0.1 |
///
/// Selecting a profile enables adaptive tuning; the preset itself is never
/// mutated — tuning only touches the run-scoped effective values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfProfile {
    Turbo,
    Extreme,
    Ultra,
    Maximum,
    Insane,
}

impl PerfProfile {
    pub fn parse(name: &str) -> Option<PerfProfile> {
        match name.to_ascii_lowercase().as_str() {
            "turbo" => Some(PerfProfile::Turbo),
            "extreme" => Some(PerfProfile::Extreme),
            "ultra" => Some(PerfProfile::Ultra),
            "maximum" => Some(PerfProfile::Maximum),
            "insane" => Some(PerfProfile::Insane),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PerfProfile::Turbo => "turbo",
            PerfProfile::Extreme => "extreme",
            PerfProfile::Ultra => "ultra",
            PerfProfile::Maximum => "maximum",
            PerfProfile::Insane => "insane",
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            PerfProfile::Turbo => 100,
            PerfProfile::Extreme => 200,
            PerfProfile::Ultra => 300,
            PerfProfile::Maximum => 400,
            PerfProfile::Insane => 500,
        }
    }

    pub fn batch_delay(&self) -> f64 {
        0.1
    }
}

/// Effective batching settings for one ingestion run.
///
/// A profile selection wins over the config's explicit values and turns
/// adaptive tuning on; without one, the conservative configured pair applies
/// with tuning off.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub batch_delay: f64,
    pub adaptive: bool,
}

impl BatchSettings {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        match config.profile.as_deref().and_then(PerfProfile::parse) {
            Some(profile) => Self {
                batch_size: profile.batch_size(),
                batch_delay: profile.batch_delay(),
                adaptive: true,
            },
            None => Self {
                batch_size: config.batch_size,
                batch_delay: config.batch_delay,
                adaptive: false,
            },
        }
    }
}

/// Run-scoped tuning state. Constructed fresh per ingestion call and dropped
/// at completion; never stored on a long-lived object.
#[derive(Debug)]
struct RunState {
    batch_size: usize,
    delay: f64,
    adaptive: bool,
    /// Successful batches since the last throttle.
    clean_batches: usize,
    /// A throttle was seen at least once this run.
    throttled: bool,
    /// The delay has been restored to last-known-good and frozen.
    locked: bool,
    /// Delay in use before the last speculative lowering.
    last_good_delay: Option<f64>,
}

impl RunState {
    fn new(settings: &BatchSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            delay: settings.batch_delay,
            adaptive: settings.adaptive,
            clean_batches: 0,
            throttled: false,
            locked: false,
            last_good_delay: None,
        }
    }

    /// Inter-batch pacing delay, applying speculative lowering first.
    ///
    /// Once locked, the locked delay is returned unconditionally.
    fn pacing_delay(&mut self) -> f64 {
        if !self.locked
            && self.adaptive
            && self.clean_batches >= CLEAN_BATCHES_BEFORE_LOWERING
            && self.delay > FAST_DELAY_FLOOR
        {
            self.last_good_delay = Some(self.delay);
            self.delay = FAST_DELAY_FLOOR;
            tracing::debug!(delay = self.delay, "lowered inter-batch delay");
        }
        self.delay
    }

    /// Apply the throttle policy and return the recovery wait in seconds.
    fn on_throttle(&mut self) -> f64 {
        self.throttled = true;
        self.clean_batches = 0;
        if !self.locked {
            if let Some(good) = self.last_good_delay {
                self.delay = good;
                self.locked = true;
                tracing::info!(delay = self.delay, "locked last known good delay");
            } else if self.batch_size > MIN_BATCH_SIZE {
                self.batch_size =
                    (self.batch_size - BATCH_SIZE_DECREMENT).max(MIN_BATCH_SIZE);
                tracing::info!(batch_size = self.batch_size, "reduced batch size");
            }
        }
        (3.0 * self.delay).max(MIN_RECOVERY_SECS)
    }
}

/// Embed `chunks` into one cumulative index.
///
/// Every chunk lands in exactly one batch; a throttled batch is retried from
/// the same position (re-sliced at the current batch size if it shrank), so
/// recovery neither skips nor duplicates entries. Any non-throttling provider
/// error aborts the run and discards the partial index.
pub async fn build_index(
    client: &dyn EmbeddingClient,
    document: &str,
    chunks: &[Chunk],
    settings: &BatchSettings,
    progress: &dyn IngestReporter,
) -> Result<VectorIndex, RagError> {
    if chunks.is_empty() {
        return Ok(VectorIndex::new());
    }

    tracing::info!(
        document,
        chunks = chunks.len(),
        batch_size = settings.batch_size,
        batch_delay = settings.batch_delay,
        adaptive = settings.adaptive,
        "building vector index"
    );

    let mut state = RunState::new(settings);
    let mut cumulative: Option<VectorIndex> = None;
    let mut cursor = 0usize;
    let mut batch_seq = 0usize;

    while cursor < chunks.len() {
        let mut attempts = 0u32;

        loop {
            let end = (cursor + state.batch_size).min(chunks.len());
            let batch = &chunks[cursor..end];
            attempts += 1;

            progress.report(IngestEvent::Embedding {
                document: document.to_string(),
                batch: batch_seq + 1,
                chunks_done: cursor,
                chunks_total: chunks.len(),
            });

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match client.embed(&texts).await {
                Ok(vectors) => {
                    if vectors.len() != batch.len() {
                        return Err(RagError::Provider(format!(
                            "expected {} vectors, got {}",
                            batch.len(),
                            vectors.len()
                        )));
                    }

                    let mut part = VectorIndex::new();
                    for (chunk, vector) in batch.iter().zip(vectors) {
                        part.insert(
                            vector,
                            ChunkMeta {
                                document: document.to_string(),
                                page: chunk.page,
                                section: chunk.section.clone(),
                                text: chunk.text.clone(),
                            },
                        );
                    }
                    match cumulative.as_mut() {
                        None => cumulative = Some(part),
                        Some(index) => index.merge(part),
                    }

                    state.clean_batches += 1;
                    batch_seq += 1;
                    cursor = end;

                    if cursor < chunks.len() {
                        let delay = state.pacing_delay();
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    }
                    break;
                }
                Err(err) if err.is_throttle() => {
                    if attempts >= MAX_BATCH_ATTEMPTS {
                        return Err(RagError::RateLimited {
                            attempts,
                            message: err.to_string(),
                        });
                    }
                    let wait = state.on_throttle();
                    tracing::warn!(
                        document,
                        batch = batch_seq + 1,
                        wait_secs = wait,
                        "rate limited, retrying batch"
                    );
                    progress.report(IngestEvent::Throttled {
                        document: document.to_string(),
                        wait_secs: wait,
                    });
                    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    progress.report(IngestEvent::Finished {
        document: document.to_string(),
        chunks: chunks.len(),
    });

    let index = cumulative.unwrap_or_default();
    tracing::info!(
        document,
        entries = index.len(),
        batches = batch_seq,
        throttled = state.throttled,
        "index built"
    );
    Ok(index)
}
