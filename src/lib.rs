//! Hybrid retrieval and memory prioritization for AI coding agents.
//!
//! Mnema is the ranking core of a local knowledge store: it indexes source
//! code, documentation, and short natural-language memories, retrieves and
//! ranks the most relevant items for a query, and keeps the memory store
//! compact as knowledge accumulates.
//!
//! # Architecture
//!
//! - **Lexical**: per-corpus BM25 inverted indexes over code-aware and
//!   stemming tokenizers, with dynamic-programming segmentation for flatcase
//!   identifiers
//! - **Semantic**: a vector layer with an ANN fast path and a bounded
//!   brute-force fallback
//! - **Fusion**: Reciprocal Rank Fusion plus symbol/exact-match boosting
//! - **Memory**: a working-memory pipeline (validity, pinning, decay,
//!   diversity) and a consolidation engine with reversible merges
//!
//! Everything with I/O behind it — embeddings, the LLM used for merge
//! synthesis, ANN backends, record storage — is an injected trait; the engine
//! itself is synchronous and single-process.
//!
//! # Modules
//!
//! - [`config`] — tunable parameters with documented defaults
//! - [`tokenize`] — code, natural-language, and AST-enrichment tokenizers
//! - [`segment`] — flatcase segmentation (DP and trainable BPE)
//! - [`index`] — BM25 indexes and the per-corpus registry
//! - [`vector`] — ANN/brute-force vector search
//! - [`fusion`] — Reciprocal Rank Fusion and post-fusion filters
//! - [`retrieval`] — the hybrid search service
//! - [`memory`] — working-memory pipeline and consolidation
//! - [`embedding`] — provider trait and boundary validation
//! - [`storage`] — key-value store for persisted index blobs

pub mod config;
pub mod embedding;
pub mod fusion;
pub mod index;
pub mod memory;
pub mod retrieval;
pub mod segment;
pub mod storage;
pub mod tokenize;
pub mod vector;
