//! Per-corpus lexical indexing.
//!
//! [`bm25`] holds the inverted-index scoring core; [`registry`] owns one
//! index per corpus, loading from and persisting to the injected metadata
//! store. [`Corpus`] names the four corpora the engine maintains, and
//! [`IndexedUnit`] is the record shape the persistence collaborator supplies.

pub mod bm25;
pub mod registry;

use serde::{Deserialize, Serialize};

use crate::tokenize::{enrich_identifiers, tokenize_code, tokenize_text};

pub use bm25::Bm25Index;
pub use registry::{IndexRegistry, UnitSource};

/// The corpora the engine indexes, each with its own BM25 index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    /// Source code units — the only corpus that retains raw content for
    /// exact-match boosting.
    Code,
    /// Documentation files and fragments.
    Docs,
    /// Project-scoped memories.
    Memories,
    /// Memories shared across projects.
    GlobalMemories,
}

impl Corpus {
    /// Stable string form, used in persistence keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Docs => "docs",
            Self::Memories => "memories",
            Self::GlobalMemories => "global_memories",
        }
    }

    /// All corpora, for iteration.
    pub fn all() -> [Corpus; 4] {
        [Self::Code, Self::Docs, Self::Memories, Self::GlobalMemories]
    }

    /// Whether this corpus keeps lowercased raw content for exact-match
    /// scoring.
    pub fn retains_raw_content(&self) -> bool {
        matches!(self, Self::Code)
    }
}

impl std::fmt::Display for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Corpus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "docs" => Ok(Self::Docs),
            "memories" => Ok(Self::Memories),
            "global_memories" => Ok(Self::GlobalMemories),
            _ => Err(format!("unknown corpus: {s}")),
        }
    }
}

/// An indexable document or memory, as supplied by the persistence
/// collaborator. Identity is the storage-assigned id, unique per corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedUnit {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Tokenize a unit the way its corpus expects.
///
/// Code goes through the identifier tokenizer plus symbol-name enrichment
/// (tripled weight); everything else through the natural-language tokenizer.
pub fn unit_tokens(corpus: Corpus, unit: &IndexedUnit) -> Vec<String> {
    match corpus {
        Corpus::Code => {
            let mut tokens = tokenize_code(&unit.content);
            if unit.symbol_name.is_some() || unit.signature.is_some() {
                let identifiers: Vec<String> =
                    unit.signature.iter().cloned().collect();
                tokens.extend(enrich_identifiers(
                    &identifiers,
                    unit.symbol_name.as_deref(),
                ));
            }
            tokens
        }
        Corpus::Docs | Corpus::Memories | Corpus::GlobalMemories => {
            tokenize_text(&unit.content)
        }
    }
}

/// Tokenize a query string the way its target corpus expects.
pub fn query_tokens(corpus: Corpus, query: &str) -> Vec<String> {
    match corpus {
        Corpus::Code => tokenize_code(query),
        Corpus::Docs | Corpus::Memories | Corpus::GlobalMemories => tokenize_text(query),
    }
}
