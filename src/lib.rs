//! # docdex
//!
//! Cached vector-index construction and document QA over PDFs, slides, Word
//! documents, and web pages.
//!
//! docdex turns an arbitrary document into a queryable vector index: pages
//! are chunked, chunks are embedded in paced batches that respect an
//! external provider's rate limit, the resulting vectors are merged into one
//! cumulative index, and the index is persisted through a content-addressed
//! cache so the next session skips embedding entirely.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Loader  │──▶│ Chunker │──▶│ Batch Engine │──▶│ VectorIndex │
//! │ pdf/web/ │   │ overlap │   │ pace + retry │   │ append-only │
//! │ word/ppt │   │  split  │   │  429 backoff │   │   cosine    │
//! └──────────┘   └─────────┘   └──────┬───────┘   └──────┬──────┘
//!                                     │                  │
//!                              ┌──────▼──────┐    ┌──────▼──────┐
//!                              │ IndexCache  │    │ DocSession  │
//!                              │ sha256 keys │    │ load/add/   │
//!                              │ index+meta  │    │ ask/info    │
//!                              └─────────────┘    └─────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! docdex ingest manual.pdf --profile turbo   # build + cache the index
//! docdex ask "how do I measure an angle?" --doc manual.pdf
//! docdex info --doc manual.pdf
//! docdex cache clear
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Document type detection and page loading |
//! | [`extract`] | PDF/DOCX/PPTX text extraction |
//! | [`chunker`] | Overlapping fixed-size chunking |
//! | [`engine`] | Batched embedding with pacing and adaptive tuning |
//! | [`index`] | Append-only vector index with cosine search |
//! | [`cache`] | Content-addressed index cache |
//! | [`embedding`] | Embedding/completion provider boundary |
//! | [`qa`] | Retrieval and answer synthesis |
//! | [`session`] | The load/add/ask/info facade |
//! | [`progress`] | Ingest progress reporting |

pub mod cache;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod index;
pub mod loader;
pub mod models;
pub mod progress;
pub mod qa;
pub mod session;
