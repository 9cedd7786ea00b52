//! Trainable byte-pair-encoding fallback for flatcase segmentation.
//!
//! Where the DP segmenter leans on word frequencies, BPE learns merge rules
//! directly from indexed-token frequencies: starting from single characters,
//! the most frequent adjacent pair is merged repeatedly until the vocabulary
//! reaches its target size or no pair clears the minimum frequency. The same
//! merges then segment unseen flatcase tokens.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Retrain hourly while new content keeps arriving.
const RETRAIN_DIRTY_INTERVAL_HOURS: i64 = 1;
/// Otherwise retrain daily.
const RETRAIN_IDLE_INTERVAL_HOURS: i64 = 24;

/// A trained BPE vocabulary: ordered merges plus the token table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpeVocab {
    /// Merge rules in training order — order matters when segmenting.
    pub merges: Vec<(String, String)>,
    /// Token → id, single characters first, merged tokens after.
    pub vocab: HashMap<String, u32>,
    /// Target vocabulary size the training run was configured with.
    pub vocab_size: usize,
    /// Total token occurrences in the training corpus.
    pub corpus_size: u64,
    /// When this vocabulary was trained.
    pub trained_at: DateTime<Utc>,
}

impl BpeVocab {
    /// Train merges from indexed-token frequencies.
    ///
    /// `token_freqs` maps each distinct indexed token to its occurrence
    /// count. Training stops at `target_vocab` entries or when the best
    /// remaining pair occurs fewer than `min_pair_freq` times.
    pub fn train(
        token_freqs: &HashMap<String, u64>,
        target_vocab: usize,
        min_pair_freq: u64,
    ) -> Self {
        // Each word as a char-split sequence, weighted by its frequency.
        let mut words: Vec<(Vec<String>, u64)> = token_freqs
            .iter()
            .filter(|(w, _)| !w.is_empty())
            .map(|(w, freq)| (w.chars().map(|c| c.to_string()).collect(), *freq))
            .collect();

        let mut vocab: HashMap<String, u32> = HashMap::new();
        for (parts, _) in &words {
            for part in parts {
                let next_id = vocab.len() as u32;
                vocab.entry(part.clone()).or_insert(next_id);
            }
        }

        let mut merges: Vec<(String, String)> = Vec::new();

        while vocab.len() < target_vocab {
            let Some((pair, freq)) = most_frequent_pair(&words) else {
                break;
            };
            if freq < min_pair_freq {
                break;
            }

            let merged = format!("{}{}", pair.0, pair.1);
            for (parts, _) in &mut words {
                merge_in_place(parts, &pair, &merged);
            }
            let next_id = vocab.len() as u32;
            vocab.entry(merged).or_insert(next_id);
            merges.push(pair);
        }

        Self {
            merges,
            vocab_size: target_vocab,
            vocab,
            corpus_size: token_freqs.values().sum(),
            trained_at: Utc::now(),
        }
    }

    /// Segment a word by replaying the learned merges in training order.
    pub fn segment(&self, word: &str) -> Vec<String> {
        let mut parts: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        for (left, right) in &self.merges {
            let merged = format!("{left}{right}");
            merge_in_place(&mut parts, &(left.clone(), right.clone()), &merged);
        }
        parts
    }

    /// Number of distinct tokens in the trained vocabulary.
    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }
}

/// Count adjacent pairs across all words, weighted by word frequency.
fn most_frequent_pair(words: &[(Vec<String>, u64)]) -> Option<((String, String), u64)> {
    let mut counts: HashMap<(String, String), u64> = HashMap::new();
    for (parts, freq) in words {
        for window in parts.windows(2) {
            let key = (window[0].clone(), window[1].clone());
            *counts.entry(key).or_insert(0) += freq;
        }
    }
    // Tie-break lexicographically so training is deterministic.
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
}

/// Replace every adjacent `pair` occurrence in `parts` with `merged`.
fn merge_in_place(parts: &mut Vec<String>, pair: &(String, String), merged: &str) {
    let mut i = 0;
    while i + 1 < parts.len() {
        if parts[i] == pair.0 && parts[i + 1] == pair.1 {
            parts[i] = merged.to_string();
            parts.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// Whether a retraining pass is due.
///
/// Hourly while new content was indexed since the last pass, daily otherwise.
/// Never trained yet ⇒ due.
pub fn retrain_due(
    last_trained: Option<DateTime<Utc>>,
    indexed_since_last: bool,
    now: DateTime<Utc>,
) -> bool {
    let Some(last) = last_trained else {
        return true;
    };
    let elapsed = now - last;
    if indexed_since_last {
        elapsed >= Duration::hours(RETRAIN_DIRTY_INTERVAL_HOURS)
    } else {
        elapsed >= Duration::hours(RETRAIN_IDLE_INTERVAL_HOURS)
    }
}
