//! Engine configuration.
//!
//! Every tunable the engine accepts lives here as a serde-deserializable
//! struct with documented defaults; loading from files or the environment is
//! the embedding application's job. BM25's `k1`/`b` and the RRF `K` constant
//! are deliberately *not* configurable — they are part of the scoring
//! contract (see [`crate::index::bm25`] and [`crate::fusion`]).

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub working_memory: WorkingMemoryConfig,
    pub consolidation: ConsolidationConfig,
    pub segmenter: SegmenterConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// RRF weight of the vector list; `0.0` is pure lexical, `1.0` pure vector.
    pub fusion_alpha: f64,
    /// Minimum cosine similarity for a vector hit to survive.
    pub vector_similarity_threshold: f64,
    /// Row cap for the brute-force vector fallback; corpora above it degrade
    /// to lexical-only.
    pub brute_force_max_rows: usize,
    /// Default result count when the caller doesn't specify one.
    pub default_max_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkingMemoryConfig {
    /// Corrections at or above this count pin a memory.
    pub pin_threshold: u32,
    /// Half-life of the confidence decay, in hours.
    pub decay_half_life_hours: f64,
    /// Pairwise-similarity ceiling for the diversity filter.
    pub diversity_max_similarity: f64,
    /// Cosine threshold for the embedding-based invariant fallback.
    pub invariant_similarity_threshold: f64,
    /// Priority-score weights. Inferred constants, kept overridable on
    /// purpose — see DESIGN.md.
    pub weight_invariant: f64,
    pub weight_quality: f64,
    pub weight_corrections: f64,
    pub weight_tags: f64,
    pub weight_access: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Cosine similarity at or above which two memories are merge candidates.
    pub merge_similarity_threshold: f64,
    /// Candidate-pair cap per consolidation run.
    pub max_candidates_per_run: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Target BPE vocabulary size.
    pub bpe_vocab_size: usize,
    /// Minimum pair frequency below which BPE training stops.
    pub bpe_min_pair_freq: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fusion_alpha: 0.6,
            vector_similarity_threshold: 0.25,
            brute_force_max_rows: 10_000,
            default_max_results: 10,
        }
    }
}

impl Default for WorkingMemoryConfig {
    fn default() -> Self {
        Self {
            pin_threshold: 3,
            decay_half_life_hours: 168.0,
            diversity_max_similarity: 0.85,
            invariant_similarity_threshold: 0.75,
            weight_invariant: 0.30,
            weight_quality: 0.25,
            weight_corrections: 0.20,
            weight_tags: 0.15,
            weight_access: 0.10,
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            merge_similarity_threshold: 0.85,
            max_candidates_per_run: 50,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            bpe_vocab_size: 2000,
            bpe_min_pair_freq: 2,
        }
    }
}
