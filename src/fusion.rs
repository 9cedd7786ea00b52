//! Reciprocal Rank Fusion of lexical and vector result lists.
//!
//! RRF scores by rank, not raw score, so the two lists don't need comparable
//! score scales. `K` is the standard fusion constant and fixed; the `alpha`
//! weight is the caller's lever between lexical and semantic retrieval.

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;

use crate::index::IndexedUnit;

/// Standard RRF rank-smoothing constant.
pub const RRF_K: f64 = 60.0;

/// Symbol-name boost for an exact query-token match.
const SYMBOL_EXACT_BOOST: f64 = 0.15;
/// Symbol-name boost for a partial (substring) match.
const SYMBOL_PARTIAL_BOOST: f64 = 0.08;

/// Longest content regex accepted by the post-fusion filter.
const MAX_FILTER_REGEX_LEN: usize = 500;

/// A fused, ranked result.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub id: i64,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f64>,
}

/// Optional post-fusion filters. Invalid filters are skipped, never fatal.
#[derive(Debug, Default, Clone)]
pub struct PostFilter {
    /// Regex matched against unit content; unparseable or oversized patterns
    /// are ignored.
    pub content_regex: Option<String>,
    /// Exact match against the unit's signature kind (e.g. `"fn"`).
    pub symbol_type: Option<String>,
}

/// Fuse two ranked lists with weighted Reciprocal Rank Fusion.
///
/// `score(d) = (1-α)/(K + rank_bm25 + 1) + α/(K + rank_vector + 1)` with
/// 0-based ranks; absence from a list contributes zero for that term. Original
/// scores ride along for diagnostics.
pub fn rrf_fuse(
    bm25: &[(i64, f64)],
    vector: &[(i64, f64)],
    alpha: f64,
) -> Vec<RankedResult> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut fused: HashMap<i64, RankedResult> = HashMap::new();

    for (rank, (id, raw_score)) in bm25.iter().enumerate() {
        let entry = fused.entry(*id).or_insert(RankedResult {
            id: *id,
            score: 0.0,
            bm25_score: None,
            vector_score: None,
        });
        entry.score += (1.0 - alpha) / (RRF_K + rank as f64 + 1.0);
        entry.bm25_score = Some(*raw_score);
    }

    for (rank, (id, raw_score)) in vector.iter().enumerate() {
        let entry = fused.entry(*id).or_insert(RankedResult {
            id: *id,
            score: 0.0,
            bm25_score: None,
            vector_score: None,
        });
        entry.score += alpha / (RRF_K + rank as f64 + 1.0);
        entry.vector_score = Some(*raw_score);
    }

    let mut results: Vec<RankedResult> = fused.into_values().collect();
    sort_ranked(&mut results);
    results
}

/// Apply the code-search symbol-name boost, clamp, and re-sort.
///
/// The first query token that matches a result's symbol name wins: +0.15 for
/// an exact (case-insensitive) match, +0.08 for substring containment.
pub fn apply_symbol_boost(
    results: &mut Vec<RankedResult>,
    query_tokens: &[String],
    units: &HashMap<i64, IndexedUnit>,
) {
    for result in results.iter_mut() {
        let Some(symbol) = units
            .get(&result.id)
            .and_then(|u| u.symbol_name.as_deref())
        else {
            continue;
        };
        let symbol_lower = symbol.to_lowercase();
        for token in query_tokens {
            if *token == symbol_lower {
                result.score += SYMBOL_EXACT_BOOST;
                break;
            }
            if symbol_lower.contains(token.as_str()) {
                result.score += SYMBOL_PARTIAL_BOOST;
                break;
            }
        }
        result.score = result.score.min(1.0);
    }
    sort_ranked(results);
}

/// Drop results failing the post-fusion filters.
///
/// An invalid or oversized content regex disables that filter rather than
/// failing the query.
pub fn apply_post_filters(
    results: Vec<RankedResult>,
    units: &HashMap<i64, IndexedUnit>,
    filter: &PostFilter,
) -> Vec<RankedResult> {
    let content_regex = filter.content_regex.as_deref().and_then(compile_filter_regex);

    results
        .into_iter()
        .filter(|result| {
            let Some(unit) = units.get(&result.id) else {
                // Units we cannot resolve are left alone — filters only drop
                // what they can actually inspect.
                return true;
            };
            if let Some(re) = &content_regex {
                if !re.is_match(&unit.content) {
                    return false;
                }
            }
            if let Some(wanted) = &filter.symbol_type {
                let kind = unit.signature.as_deref().and_then(signature_kind);
                if kind != Some(wanted.as_str()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Compile a user-supplied filter regex, skipping anything suspicious.
fn compile_filter_regex(pattern: &str) -> Option<Regex> {
    if pattern.len() > MAX_FILTER_REGEX_LEN {
        tracing::debug!(len = pattern.len(), "content regex too long, filter skipped");
        return None;
    }
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(error) => {
            tracing::debug!(%error, "invalid content regex, filter skipped");
            None
        }
    }
}

/// First word of a signature, e.g. `"fn"` from `"fn parse_row(input: &str)"`.
fn signature_kind(signature: &str) -> Option<&str> {
    signature.split_whitespace().next()
}

fn sort_ranked(results: &mut [RankedResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
