//! BM25 inverted index with incremental maintenance.
//!
//! One instance per corpus. `k1` and `b` are fixed constants — they are part
//! of the scoring contract, not tunables. The average document length is
//! maintained through a running token total so the
//! `avg_doc_length == Σ doc_lengths / total_docs` invariant holds after every
//! add and remove without a full recomputation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Corpus;

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.3;
/// BM25 length-normalization strength.
pub const BM25_B: f64 = 0.75;

/// Flat bonus added on top of a multiplicative exact-match boost.
const EXACT_MATCH_BONUS: f64 = 5.0;
/// Multiplier when the query appears at a word boundary in raw content.
const WORD_BOUNDARY_MULTIPLIER: f64 = 3.0;
/// Multiplier when the query appears only as a substring.
const SUBSTRING_MULTIPLIER: f64 = 2.0;

/// A ranked lexical hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Hit {
    pub id: i64,
    pub score: f64,
}

/// Summary counters for observability.
#[derive(Debug, Serialize)]
pub struct Bm25Stats {
    pub corpus: Corpus,
    pub total_docs: usize,
    pub distinct_terms: usize,
    pub avg_doc_length: f64,
}

/// Per-corpus BM25 inverted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    corpus: Corpus,
    /// term → (doc id → term frequency)
    inverted: HashMap<String, HashMap<i64, u32>>,
    /// doc id → token count
    doc_lengths: HashMap<i64, u32>,
    /// Running total of all token occurrences, kept in lockstep with
    /// `doc_lengths` so the average never drifts.
    total_token_count: u64,
    total_docs: usize,
    /// Lowercased raw content, populated for the code corpus only.
    raw_content: HashMap<i64, String>,
}

impl Bm25Index {
    pub fn new(corpus: Corpus) -> Self {
        Self {
            corpus,
            inverted: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_token_count: 0,
            total_docs: 0,
            raw_content: HashMap::new(),
        }
    }

    pub fn corpus(&self) -> Corpus {
        self.corpus
    }

    pub fn total_docs(&self) -> usize {
        self.total_docs
    }

    /// Average document length in tokens; 0.0 for an empty index.
    pub fn avg_doc_length(&self) -> f64 {
        if self.total_docs == 0 {
            return 0.0;
        }
        self.total_token_count as f64 / self.total_docs as f64
    }

    pub fn stats(&self) -> Bm25Stats {
        Bm25Stats {
            corpus: self.corpus,
            total_docs: self.total_docs,
            distinct_terms: self.inverted.len(),
            avg_doc_length: self.avg_doc_length(),
        }
    }

    /// Add (or replace) a document's postings.
    ///
    /// `raw_content` is retained only when the corpus keeps it; passing it for
    /// other corpora is a no-op rather than an error.
    pub fn add(&mut self, id: i64, tokens: &[String], raw_content: Option<&str>) {
        if self.doc_lengths.contains_key(&id) {
            self.remove(id);
        }

        let mut term_freqs: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token.as_str()).or_insert(0) += 1;
        }

        let doc_len = tokens.len() as u32;
        for (term, freq) in term_freqs {
            self.inverted
                .entry(term.to_string())
                .or_default()
                .insert(id, freq);
        }
        self.doc_lengths.insert(id, doc_len);
        self.total_token_count += u64::from(doc_len);
        self.total_docs += 1;

        if self.corpus.retains_raw_content() {
            if let Some(raw) = raw_content {
                self.raw_content.insert(id, raw.to_lowercase());
            }
        }
    }

    /// Remove a document. Returns `false` if it was not indexed.
    pub fn remove(&mut self, id: i64) -> bool {
        let Some(doc_len) = self.doc_lengths.remove(&id) else {
            return false;
        };
        self.inverted.retain(|_, postings| {
            postings.remove(&id);
            !postings.is_empty()
        });
        self.total_token_count -= u64::from(doc_len);
        self.total_docs -= 1;
        self.raw_content.remove(&id);
        true
    }

    /// Score all documents matching any query term, best first.
    ///
    /// For identifier-like single-word queries against a corpus that retains
    /// raw content, the exact-match boost multiplies the BM25 score and adds
    /// a flat bonus.
    pub fn search(&self, query: &str, query_tokens: &[String], limit: usize) -> Vec<Bm25Hit> {
        let mut scores: HashMap<i64, f64> = HashMap::new();
        let avg_len = self.avg_doc_length().max(1.0);
        let n = self.total_docs as f64;

        let mut seen_terms: Vec<&str> = Vec::new();
        for term in query_tokens {
            if seen_terms.contains(&term.as_str()) {
                continue;
            }
            seen_terms.push(term.as_str());

            let Some(postings) = self.inverted.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (&doc_id, &tf) in postings {
                let doc_len = f64::from(self.doc_lengths[&doc_id]);
                let tf = f64::from(tf);
                let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len);
                *scores.entry(doc_id).or_insert(0.0) += idf * (tf * (BM25_K1 + 1.0)) / (tf + norm);
            }
        }

        if is_identifier_query(query) && !self.raw_content.is_empty() {
            let needle = query.trim().to_lowercase();
            for (doc_id, score) in scores.iter_mut() {
                if let Some(raw) = self.raw_content.get(doc_id) {
                    *score = apply_exact_match_boost(*score, raw, &needle);
                }
            }
        }

        let mut hits: Vec<Bm25Hit> = scores
            .into_iter()
            .map(|(id, score)| Bm25Hit { id, score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        hits
    }

    /// Serialize to the opaque blob stored in the metadata store.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to serialize BM25 index")
    }

    /// Deserialize a persisted blob. Callers treat an error as a cache miss.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob).context("failed to deserialize BM25 index blob")
    }
}

/// True for queries eligible for the exact-match boost: a single word made of
/// identifier characters, containing at least one letter.
fn is_identifier_query(query: &str) -> bool {
    let trimmed = query.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
        && trimmed.chars().any(|c| c.is_alphabetic())
}

/// Boost a score from raw-content containment: ×3 + 5 at a word boundary,
/// ×2 + 5 for plain substring containment, unchanged otherwise.
fn apply_exact_match_boost(score: f64, raw: &str, needle: &str) -> f64 {
    if has_word_boundary_match(raw, needle) {
        score * WORD_BOUNDARY_MULTIPLIER + EXACT_MATCH_BONUS
    } else if raw.contains(needle) {
        score * SUBSTRING_MULTIPLIER + EXACT_MATCH_BONUS
    } else {
        score
    }
}

/// Whether `needle` occurs in `haystack` delimited by non-identifier chars.
fn has_word_boundary_match(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(needle) {
        let start = search_from + pos;
        let end = start + needle.len();
        let before_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_alphanumeric() && c != '_');
        let after_ok = end == haystack.len()
            || haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| !c.is_alphanumeric() && c != '_');
        if before_ok && after_ok {
            return true;
        }
        search_from = end;
    }
    false
}
