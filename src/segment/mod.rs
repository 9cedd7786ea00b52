//! Word segmentation for flatcase identifiers.
//!
//! Identifiers like `getusername` carry no case or separator boundaries, so
//! the code tokenizer cannot split them. [`FlatcaseSegmenter`] recovers the
//! split with dynamic programming over corpus token frequencies; [`bpe`]
//! offers a trainable byte-pair-encoding alternative that learns merges from
//! the same frequencies.

pub mod bpe;

use std::collections::HashMap;
use std::sync::OnceLock;

use linked_hash_map::LinkedHashMap;

/// Candidate token length bounds for the DP.
const MIN_TOKEN_LEN: usize = 2;
const MAX_TOKEN_LEN: usize = 15;

/// Tokens up to this length earn a `sqrt(len) * 0.5` bonus; longer candidates
/// are penalized so un-split compounds don't win by default.
const LENGTH_BONUS_CAP: usize = 8;
const LENGTH_WEIGHT: f64 = 0.5;

/// Score for a token absent from both the corpus and the built-in table.
/// Must be worse than several known-token scores combined, or unknown
/// compounds would never split.
const UNKNOWN_TOKEN_SCORE: f64 = -15.0;
/// Extra penalty when choosing an unknown token strands a short leading
/// remainder (≤ this many chars) — tiny fragments rarely form real words.
const SHORT_REMAINDER_LEN: usize = 3;
const SHORT_REMAINDER_PENALTY: f64 = -2.0;

/// Segmentation results are cached — the DP is expensive per call.
const CACHE_CAPACITY: usize = 2000;

/// The built-in frequency table is expressed per this many corpus tokens.
const BUILTIN_CORPUS_SIZE: u64 = 100_000;

/// True for identifiers eligible for segmentation: 4+ ASCII lowercase
/// letters, no separators or digits.
pub fn is_flatcase(word: &str) -> bool {
    word.len() >= 4 && word.chars().all(|c| c.is_ascii_lowercase())
}

/// Dynamic-programming segmenter for flatcase identifiers.
///
/// Frequencies observed from indexed content drive the split scores; a
/// built-in table of common English/programming words (scaled to the live
/// corpus size) fills the gaps. Results are cached in an LRU keyed by
/// `word + corpus size`, since any change in corpus size can change the
/// optimal split.
pub struct FlatcaseSegmenter {
    corpus_freqs: HashMap<String, u64>,
    corpus_size: u64,
    cache: LinkedHashMap<String, Vec<String>>,
}

impl Default for FlatcaseSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatcaseSegmenter {
    pub fn new() -> Self {
        Self {
            corpus_freqs: HashMap::new(),
            corpus_size: 0,
            cache: LinkedHashMap::new(),
        }
    }

    /// Build a segmenter over pre-counted corpus token frequencies.
    pub fn with_frequencies(freqs: HashMap<String, u64>) -> Self {
        let corpus_size = freqs.values().sum();
        Self {
            corpus_freqs: freqs,
            corpus_size,
            cache: LinkedHashMap::new(),
        }
    }

    /// Feed tokens from newly indexed content into the frequency model.
    pub fn observe_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for token in tokens {
            *self.corpus_freqs.entry(token.to_string()).or_insert(0) += 1;
            self.corpus_size += 1;
        }
    }

    /// Total observed token count.
    pub fn corpus_size(&self) -> u64 {
        self.corpus_size
    }

    /// Split a flatcase word into its most probable sub-tokens.
    ///
    /// Non-flatcase input is returned whole. Cached per `word + corpus size`.
    pub fn segment(&mut self, word: &str) -> Vec<String> {
        if !is_flatcase(word) {
            return vec![word.to_string()];
        }

        let cache_key = format!("{word}@{}", self.corpus_size);
        if let Some(hit) = self.cache.get_refresh(&cache_key) {
            return hit.clone();
        }

        let result = self.segment_uncached(word);

        self.cache.insert(cache_key, result.clone());
        while self.cache.len() > CACHE_CAPACITY {
            self.cache.pop_front();
        }
        result
    }

    /// DP over split positions: `best[i]` is the best cumulative log-score of
    /// any split of `word[0..i]`; backtracking through `parent` reconstructs
    /// the winning split.
    fn segment_uncached(&self, word: &str) -> Vec<String> {
        let n = word.len();
        let mut best = vec![f64::NEG_INFINITY; n + 1];
        let mut parent = vec![0usize; n + 1];
        best[0] = 0.0;

        for end in 1..=n {
            for len in MIN_TOKEN_LEN..=MAX_TOKEN_LEN.min(end) {
                let start = end - len;
                if best[start] == f64::NEG_INFINITY {
                    continue;
                }
                let candidate = &word[start..end];
                let score = best[start] + self.token_score(candidate, start);
                if score > best[end] {
                    best[end] = score;
                    parent[end] = start;
                }
            }
        }

        if best[n] == f64::NEG_INFINITY {
            // No valid split (can't happen for flatcase input of length ≥ 4,
            // but keep the whole word rather than panic).
            return vec![word.to_string()];
        }

        let mut parts: Vec<String> = Vec::new();
        let mut end = n;
        while end > 0 {
            let start = parent[end];
            parts.push(word[start..end].to_string());
            end = start;
        }
        parts.reverse();
        parts
    }

    /// Log-frequency score plus length shaping for one candidate token.
    fn token_score(&self, token: &str, start: usize) -> f64 {
        let len = token.len();
        let freq = self
            .corpus_freqs
            .get(token)
            .copied()
            .filter(|f| *f > 0)
            .or_else(|| self.scaled_builtin_freq(token));

        match freq {
            Some(freq) => {
                let corpus = self.normalization_corpus() as f64;
                let mut score = (freq as f64 / corpus).ln();
                if len <= LENGTH_BONUS_CAP {
                    score += (len as f64).sqrt() * LENGTH_WEIGHT;
                } else {
                    score -= (len - LENGTH_BONUS_CAP) as f64 * LENGTH_WEIGHT;
                }
                score
            }
            None => {
                let mut score = UNKNOWN_TOKEN_SCORE;
                if start > 0 && start <= SHORT_REMAINDER_LEN {
                    score += SHORT_REMAINDER_PENALTY;
                }
                score
            }
        }
    }

    /// The corpus size scores are normalized against. Small live corpora are
    /// floored at the built-in table's size so a token seen once in a tiny
    /// corpus doesn't look overwhelmingly probable.
    fn normalization_corpus(&self) -> u64 {
        self.corpus_size.max(BUILTIN_CORPUS_SIZE)
    }

    /// Built-in frequency scaled to the normalization corpus.
    fn scaled_builtin_freq(&self, token: &str) -> Option<u64> {
        let base = builtin_frequencies().get(token).copied()?;
        Some((base * self.normalization_corpus() / BUILTIN_CORPUS_SIZE).max(1))
    }

    /// Expand a token stream: flatcase tokens additionally contribute their
    /// segmented parts, so `getusername` also indexes as `get user name`.
    /// Non-flatcase tokens and unsplittable words pass through unchanged.
    pub fn expand_tokens(&mut self, tokens: &[String]) -> Vec<String> {
        let mut out = tokens.to_vec();
        for token in tokens {
            if is_flatcase(token) {
                let parts = self.segment(token);
                if parts.len() > 1 {
                    out.extend(parts);
                }
            }
        }
        out
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Frequency table of common English and programming words, per
/// [`BUILTIN_CORPUS_SIZE`] corpus tokens. Deliberately small — the live
/// corpus takes over as soon as content is indexed.
fn builtin_frequencies() -> &'static HashMap<&'static str, u64> {
    static TABLE: OnceLock<HashMap<&'static str, u64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let entries: [(&str, u64); 96] = [
            ("get", 900),
            ("set", 700),
            ("the", 650),
            ("user", 600),
            ("name", 580),
            ("data", 560),
            ("file", 540),
            ("index", 500),
            ("list", 480),
            ("value", 470),
            ("key", 460),
            ("map", 450),
            ("read", 440),
            ("write", 430),
            ("count", 420),
            ("time", 410),
            ("node", 400),
            ("path", 395),
            ("text", 390),
            ("token", 385),
            ("parse", 380),
            ("string", 375),
            ("hash", 370),
            ("cache", 365),
            ("search", 360),
            ("query", 355),
            ("test", 350),
            ("load", 345),
            ("save", 340),
            ("open", 335),
            ("close", 330),
            ("next", 325),
            ("item", 320),
            ("size", 315),
            ("type", 310),
            ("code", 305),
            ("line", 300),
            ("word", 295),
            ("char", 290),
            ("byte", 285),
            ("error", 280),
            ("result", 275),
            ("config", 270),
            ("update", 265),
            ("delete", 260),
            ("create", 255),
            ("insert", 250),
            ("remove", 245),
            ("build", 240),
            ("start", 235),
            ("stop", 230),
            ("run", 225),
            ("send", 220),
            ("max", 218),
            ("min", 216),
            ("add", 214),
            ("new", 212),
            ("old", 210),
            ("row", 208),
            ("col", 206),
            ("sum", 204),
            ("len", 202),
            ("buf", 200),
            ("ptr", 198),
            ("src", 196),
            ("dst", 194),
            ("tmp", 192),
            ("log", 190),
            ("net", 188),
            ("web", 186),
            ("app", 184),
            ("job", 182),
            ("task", 180),
            ("lock", 178),
            ("sync", 176),
            ("async", 174),
            ("state", 172),
            ("store", 170),
            ("field", 168),
            ("frame", 166),
            ("block", 164),
            ("chunk", 162),
            ("batch", 160),
            ("group", 158),
            ("score", 156),
            ("rank", 154),
            ("merge", 152),
            ("split", 150),
            ("match", 148),
            ("check", 146),
            ("valid", 144),
            ("input", 142),
            ("output", 140),
            ("buffer", 138),
            ("stream", 136),
            ("memory", 134),
        ];
        entries.into_iter().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_flatcase() {
        assert!(is_flatcase("getusername"));
        assert!(is_flatcase("word"));
        assert!(!is_flatcase("cat")); // too short
        assert!(!is_flatcase("getUser")); // has uppercase
        assert!(!is_flatcase("get_user")); // has separator
        assert!(!is_flatcase("base64")); // has digits
    }

    #[test]
    fn test_segment_with_builtin_dictionary() {
        let mut seg = FlatcaseSegmenter::new();
        assert_eq!(seg.segment("getusername"), vec!["get", "user", "name"]);
        assert_eq!(seg.segment("readfile"), vec!["read", "file"]);
    }

    #[test]
    fn test_segment_prefers_corpus_frequencies() {
        let mut freqs = HashMap::new();
        // A domain corpus where "engram" dominates.
        freqs.insert("engram".to_string(), 5000);
        freqs.insert("store".to_string(), 4000);
        let mut seg = FlatcaseSegmenter::with_frequencies(freqs);
        assert_eq!(seg.segment("engramstore"), vec!["engram", "store"]);
    }

    #[test]
    fn test_non_flatcase_returned_whole() {
        let mut seg = FlatcaseSegmenter::new();
        assert_eq!(seg.segment("getUserName"), vec!["getUserName"]);
        assert_eq!(seg.segment("ab"), vec!["ab"]);
    }

    #[test]
    fn test_unknown_word_not_over_split() {
        let mut seg = FlatcaseSegmenter::new();
        // Nothing in any table matches — a single unknown token should beat
        // a pile of unknown fragments.
        let parts = seg.segment("zxqvwjkl");
        assert_eq!(parts, vec!["zxqvwjkl"]);
    }

    #[test]
    fn test_cache_hit_and_eviction() {
        let mut seg = FlatcaseSegmenter::new();
        seg.segment("getusername");
        assert_eq!(seg.cache_len(), 1);
        // Same word, same corpus size — served from cache, no growth.
        seg.segment("getusername");
        assert_eq!(seg.cache_len(), 1);

        for i in 0..(CACHE_CAPACITY + 10) {
            // Synthesize distinct flatcase words.
            let word = format!("word{}", "a".repeat(4 + i % 13));
            let word: String = word.chars().filter(|c| c.is_ascii_lowercase()).collect();
            let unique = format!("{}{}", word, "b".repeat(i / 13 + 1));
            seg.segment(&unique);
        }
        assert!(seg.cache_len() <= CACHE_CAPACITY);
    }

    #[test]
    fn test_cache_keyed_by_corpus_size() {
        let mut seg = FlatcaseSegmenter::new();
        seg.segment("getusername");
        let before = seg.cache_len();
        // Observing tokens changes corpus size, so the same word re-keys.
        seg.observe_tokens(["get", "user", "name"]);
        seg.segment("getusername");
        assert_eq!(seg.cache_len(), before + 1);
    }

    #[test]
    fn test_expand_tokens_appends_segments() {
        let mut seg = FlatcaseSegmenter::new();
        let tokens = vec!["getusername".to_string(), "parse_row".to_string()];
        let expanded = seg.expand_tokens(&tokens);
        // Originals preserved, flatcase split appended, snake_case untouched.
        assert!(expanded.contains(&"getusername".to_string()));
        assert!(expanded.contains(&"get".to_string()));
        assert!(expanded.contains(&"user".to_string()));
        assert!(expanded.contains(&"name".to_string()));
        assert_eq!(
            expanded.iter().filter(|t| t.as_str() == "parse_row").count(),
            1
        );
    }

    #[test]
    fn test_observe_tokens_accumulates() {
        let mut seg = FlatcaseSegmenter::new();
        seg.observe_tokens(["alpha", "alpha", "beta"]);
        assert_eq!(seg.corpus_size(), 3);
    }
}
