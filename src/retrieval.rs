//! The retrieval service: hybrid search over one corpus.
//!
//! [`SearchEngine`] owns the per-corpus BM25 indexes (via the registry) and
//! the vector layer, and runs the full query pipeline: tokenize → BM25 →
//! vector → RRF fuse → symbol boost → post-filter → truncate. With
//! `alpha = 0` the ranking is exactly the BM25 ranking; when the vector side
//! is unavailable or degraded, the query silently becomes lexical-only.

use std::collections::HashMap;

use anyhow::Result;

use crate::config::RetrievalConfig;
use crate::fusion::{apply_post_filters, apply_symbol_boost, rrf_fuse, PostFilter, RankedResult};
use crate::index::{query_tokens, Corpus, IndexRegistry, IndexedUnit};
use crate::vector::{VectorOutcome, VectorSearch, VectorSource};

/// BM25/vector candidates fetched per requested result.
const CANDIDATE_FACTOR: usize = 3;

/// Per-query options.
#[derive(Debug, Default, Clone)]
pub struct SearchOptions {
    /// Maximum results; falls back to the configured default when `None`.
    pub limit: Option<usize>,
    /// Fusion weight override; falls back to the configured alpha.
    pub alpha: Option<f64>,
    /// Post-fusion filters.
    pub filter: PostFilter,
}

/// Hybrid retrieval over the engine's corpora.
pub struct SearchEngine {
    registry: IndexRegistry,
    vector: VectorSearch,
    config: RetrievalConfig,
}

impl SearchEngine {
    pub fn new(registry: IndexRegistry, vector: VectorSearch, config: RetrievalConfig) -> Self {
        Self {
            registry,
            vector,
            config,
        }
    }

    pub fn registry_mut(&mut self) -> &mut IndexRegistry {
        &mut self.registry
    }

    /// Run a hybrid query against one corpus.
    ///
    /// `query_embedding` and `vectors` are optional — without them the query
    /// is lexical-only. The vector side also drops out (with a log line, not
    /// an error) when the corpus is too large for the brute-force fallback.
    pub fn hybrid_search(
        &mut self,
        corpus: Corpus,
        query: &str,
        query_embedding: Option<&[f32]>,
        vectors: Option<&dyn VectorSource>,
        units_by_id: &HashMap<i64, IndexedUnit>,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>> {
        let limit = options.limit.unwrap_or(self.config.default_max_results);
        let candidate_limit = limit * CANDIDATE_FACTOR;

        // 1. Tokenize the query the way the corpus expects.
        let tokens = query_tokens(corpus, query);

        // 2. Lexical candidates (exact-match boost applies inside for code).
        let index = self.registry.get(corpus)?;
        let bm25_hits: Vec<(i64, f64)> = index
            .search(query, &tokens, candidate_limit)
            .into_iter()
            .map(|hit| (hit.id, hit.score))
            .collect();

        // 3. Vector candidates, if the caller brought an embedding.
        let vector_hits: Vec<(i64, f64)> = match (query_embedding, vectors) {
            (Some(embedding), Some(source)) => {
                match self.vector.search(
                    source,
                    embedding,
                    candidate_limit,
                    self.config.vector_similarity_threshold,
                )? {
                    VectorOutcome::Hits(hits) => {
                        hits.into_iter().map(|h| (h.id, h.score)).collect()
                    }
                    VectorOutcome::Degraded => Vec::new(),
                }
            }
            _ => Vec::new(),
        };

        // 4. Fuse. An empty vector list means its RRF terms are all zero, so
        //    force pure-lexical weighting to keep scores meaningful.
        let alpha = if vector_hits.is_empty() {
            0.0
        } else {
            options.alpha.unwrap_or(self.config.fusion_alpha)
        };
        let mut results = rrf_fuse(&bm25_hits, &vector_hits, alpha);

        // 5. Symbol-name boost for code search.
        if corpus == Corpus::Code {
            apply_symbol_boost(&mut results, &tokens, units_by_id);
        }

        // 6. Post-fusion filters, then the final cut.
        let mut results = apply_post_filters(results, units_by_id, &options.filter);
        results.truncate(limit);
        Ok(results)
    }
}
