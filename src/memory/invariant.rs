//! Invariant detection for pinning.
//!
//! A memory phrased as an imperative or prohibition ("always run the linter",
//! "never force-push to main") is an invariant and must surface regardless of
//! score. Detection is a data-driven rule table per language, with an
//! embedding-similarity fallback against reference invariant phrases when no
//! rule fires. The fallback is best-effort: any failure resolves to
//! [`InvariantSignal::NoMatch`], never an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::embedding::{cosine_similarity, validate_embedding, EmbeddingProvider};

/// How a memory was (or wasn't) recognized as an invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantSignal {
    /// A rule-table pattern matched.
    RegexMatch { language: &'static str },
    /// The embedding fallback cleared the similarity threshold.
    EmbeddingMatch { similarity: f64 },
    /// Neither path fired.
    NoMatch,
}

impl InvariantSignal {
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// language → imperative/prohibitive patterns.
const LANGUAGE_RULES: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            r"(?i)\b(always|never|must(?:\s+not)?|do\s+not|don't|should\s+never)\b",
            r"(?i)^\s*critical\s*:",
        ],
    ),
    (
        "ru",
        &[r"(?i)\b(всегда|никогда|нельзя|обязательно|запрещено)\b"],
    ),
    (
        "de",
        &[r"(?i)\b(immer|niemals|muss|müssen|darf\s+nicht)\b"],
    ),
    (
        "fr",
        &[r"(?i)\b(toujours|jamais|doit|interdit|ne\s+(?:pas|jamais))\b"],
    ),
    (
        "es",
        &[r"(?i)\b(siempre|nunca|debe|prohibido|no\s+hagas)\b"],
    ),
    ("zh", &["必须", "绝不", "总是", "不要", "禁止"]),
    ("ja", &["必ず", "絶対に", "してはいけない", "しないこと", "禁止"]),
    ("ko", &["항상", "절대", "반드시", "금지"]),
];

/// Reference phrases the embedding fallback compares against.
const REFERENCE_PHRASES: &[&str] = &[
    "always do this",
    "never do this",
    "this rule must be followed",
    "do not break this constraint",
    "critical: this is a hard requirement",
];

fn compiled_rules() -> &'static Vec<(&'static str, Vec<Regex>)> {
    static RULES: OnceLock<Vec<(&'static str, Vec<Regex>)>> = OnceLock::new();
    RULES.get_or_init(|| {
        LANGUAGE_RULES
            .iter()
            .map(|(language, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("rule-table pattern is valid"))
                    .collect();
                (*language, compiled)
            })
            .collect()
    })
}

/// Pure rule-table check. Returns the first matching language.
pub fn regex_invariant_signal(content: &str) -> InvariantSignal {
    for (language, patterns) in compiled_rules() {
        if patterns.iter().any(|p| p.is_match(content)) {
            return InvariantSignal::RegexMatch { language };
        }
    }
    InvariantSignal::NoMatch
}

/// Invariant detector: rule tables first, embedding fallback second.
pub struct InvariantDetector {
    similarity_threshold: f64,
    /// Embedded reference phrases; empty when the fallback is unavailable.
    reference_embeddings: Vec<Vec<f32>>,
}

impl InvariantDetector {
    /// Rules-only detector.
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            reference_embeddings: Vec::new(),
        }
    }

    /// Detector with the embedding fallback enabled.
    ///
    /// Embeds the reference phrases up front; if the provider fails, the
    /// fallback is disabled (with a log line) and detection continues on
    /// rules alone.
    pub fn with_embedding_fallback(
        similarity_threshold: f64,
        provider: &dyn EmbeddingProvider,
    ) -> Self {
        let reference_embeddings = match provider.embed_batch(REFERENCE_PHRASES) {
            Ok(embeddings) => {
                // Provider output is validated, not trusted.
                let dimensions = provider.dimensions();
                embeddings
                    .into_iter()
                    .filter(|e| match validate_embedding(e, dimensions) {
                        Ok(()) => true,
                        Err(error) => {
                            tracing::warn!(%error, "reference embedding rejected");
                            false
                        }
                    })
                    .collect()
            }
            Err(error) => {
                tracing::warn!(%error, "reference-phrase embedding failed, fallback disabled");
                Vec::new()
            }
        };
        Self {
            similarity_threshold,
            reference_embeddings,
        }
    }

    /// Detect whether `content` states an invariant.
    ///
    /// The embedding fallback runs only when no rule fires and the memory has
    /// an embedding.
    pub fn detect(&self, content: &str, embedding: Option<&[f32]>) -> InvariantSignal {
        let rule_signal = regex_invariant_signal(content);
        if rule_signal.is_match() {
            return rule_signal;
        }

        let Some(embedding) = embedding else {
            return InvariantSignal::NoMatch;
        };
        let best = self
            .reference_embeddings
            .iter()
            .map(|reference| cosine_similarity(embedding, reference))
            .fold(f64::NEG_INFINITY, f64::max);
        if best >= self.similarity_threshold {
            return InvariantSignal::EmbeddingMatch { similarity: best };
        }
        InvariantSignal::NoMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_english_imperatives() {
        assert!(regex_invariant_signal("Always run cargo fmt before committing").is_match());
        assert!(regex_invariant_signal("never force-push to main").is_match());
        assert!(regex_invariant_signal("You must not delete migrations").is_match());
        assert!(regex_invariant_signal("do not commit secrets").is_match());
        assert!(regex_invariant_signal("CRITICAL: rotate keys quarterly").is_match());
    }

    #[test]
    fn test_english_language_tag() {
        let signal = regex_invariant_signal("always check inputs");
        assert_eq!(signal, InvariantSignal::RegexMatch { language: "en" });
    }

    #[test]
    fn test_multilingual_rules() {
        let cases = [
            ("никогда не коммить напрямую в main", "ru"),
            ("Niemals Produktionsdaten löschen", "de"),
            ("Toujours valider les entrées", "fr"),
            ("Nunca desplegar los viernes", "es"),
            ("必须先写测试", "zh"),
            ("必ずレビューを受けること", "ja"),
            ("항상 백업을 확인하세요", "ko"),
        ];
        for (content, language) in cases {
            assert_eq!(
                regex_invariant_signal(content),
                InvariantSignal::RegexMatch { language },
                "content: {content}"
            );
        }
    }

    #[test]
    fn test_plain_statement_no_match() {
        assert!(!regex_invariant_signal("the parser lives in src/parse.rs").is_match());
        assert!(!regex_invariant_signal("we chose postgres for storage").is_match());
    }

    /// Returns the same unit vector for every input, so any embedded content
    /// has similarity 1.0 with the references.
    struct ConstantProvider;

    impl EmbeddingProvider for ConstantProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; 8];
            v[0] = 1.0;
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("model not loaded")
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    #[test]
    fn test_embedding_fallback_fires_when_rules_do_not() {
        let detector = InvariantDetector::with_embedding_fallback(0.75, &ConstantProvider);
        let mut query = vec![0.0f32; 8];
        query[0] = 1.0;
        let signal = detector.detect("a statement with no imperative words", Some(&query));
        assert!(matches!(signal, InvariantSignal::EmbeddingMatch { .. }));
    }

    #[test]
    fn test_rules_take_precedence_over_embedding() {
        let detector = InvariantDetector::with_embedding_fallback(0.75, &ConstantProvider);
        let mut query = vec![0.0f32; 8];
        query[0] = 1.0;
        let signal = detector.detect("always pin dependencies", Some(&query));
        assert_eq!(signal, InvariantSignal::RegexMatch { language: "en" });
    }

    #[test]
    fn test_provider_failure_resolves_to_no_match() {
        let detector = InvariantDetector::with_embedding_fallback(0.75, &FailingProvider);
        let mut query = vec![0.0f32; 8];
        query[0] = 1.0;
        let signal = detector.detect("a statement with no imperative words", Some(&query));
        assert_eq!(signal, InvariantSignal::NoMatch);
    }

    #[test]
    fn test_no_embedding_means_no_fallback() {
        let detector = InvariantDetector::with_embedding_fallback(0.75, &ConstantProvider);
        let signal = detector.detect("a statement with no imperative words", None);
        assert_eq!(signal, InvariantSignal::NoMatch);
    }

    #[test]
    fn test_below_threshold_no_match() {
        let detector = InvariantDetector::with_embedding_fallback(0.75, &ConstantProvider);
        // Orthogonal to the reference axis.
        let mut query = vec![0.0f32; 8];
        query[3] = 1.0;
        let signal = detector.detect("a statement with no imperative words", Some(&query));
        assert_eq!(signal, InvariantSignal::NoMatch);
    }
}
