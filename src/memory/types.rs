//! Core memory type definitions and the store contract.
//!
//! Defines [`MemoryType`] (the six knowledge categories), [`Memory`] (a full
//! record), [`SupersedesLink`] (merge lineage for history and undo), and the
//! [`MemoryStore`] trait the persistence collaborator implements.
//! [`InMemoryStore`] is the bundled plain-records implementation.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::validate_embedding;

/// The six knowledge categories, each with a different base ranking weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A decision that was made and why — the highest-value category.
    Decision,
    /// Something that went wrong and how it surfaced.
    Error,
    /// An approach that was tried and abandoned.
    DeadEnd,
    /// A recurring structure or convention in the codebase.
    Pattern,
    /// A general lesson, not tied to a single incident.
    Learning,
    /// A raw observation with no interpretation attached.
    Observation,
}

impl MemoryType {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Error => "error",
            Self::DeadEnd => "dead_end",
            Self::Pattern => "pattern",
            Self::Learning => "learning",
            Self::Observation => "observation",
        }
    }

    /// Base ranking weight for this category.
    pub fn base_weight(&self) -> f64 {
        match self {
            Self::Decision => 1.0,
            Self::Error => 0.9,
            Self::DeadEnd => 0.85,
            Self::Pattern => 0.8,
            Self::Learning => 0.7,
            Self::Observation => 0.5,
        }
    }

    /// Parse, mapping anything unrecognized to [`Self::Observation`] —
    /// external records carry free-form type strings.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::Observation)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(Self::Decision),
            "error" => Ok(Self::Error),
            "dead_end" => Ok(Self::DeadEnd),
            "pattern" => Ok(Self::Pattern),
            "learning" => Ok(Self::Learning),
            "observation" => Ok(Self::Observation),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// A memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Storage-assigned id.
    pub id: i64,
    /// The full text content of the memory.
    pub content: String,
    /// Embedding vector, when one has been computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Free-form tags; `critical`/`architecture`/`security` raise ranking weight.
    pub tags: Vec<String>,
    /// Knowledge category.
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Quality score in `[0.0, 1.0]`, assigned at ingestion. `None` when the
    /// ingesting collaborator produced no signal.
    pub quality_score: Option<f64>,
    /// Number of times this memory has been returned in retrieval results.
    pub access_count: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last recall timestamp, or `None` if never accessed.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Start of the validity window; open start when `None`.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window; open end when `None`. Set by consolidation
    /// when this memory is superseded.
    pub valid_until: Option<DateTime<Utc>>,
    /// How many times users corrected the assistant back to this memory.
    pub correction_count: u32,
    /// Whether this memory states an invariant ("always X", "never Y").
    pub is_invariant: bool,
    /// Priority score computed by the working-memory pipeline, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<f64>,
    /// Back-pointer to the memory that superseded this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<i64>,
}

impl Memory {
    /// A minimal record with the given id, content, and type; everything else
    /// at rest state. Convenient for ingestion paths and tests.
    pub fn new(id: i64, content: impl Into<String>, memory_type: MemoryType, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            content: content.into(),
            embedding: None,
            tags: Vec::new(),
            memory_type,
            quality_score: None,
            access_count: 0,
            created_at,
            last_accessed: None,
            valid_from: None,
            valid_until: None,
            correction_count: 0,
            is_invariant: false,
            priority_score: None,
            superseded_by: None,
        }
    }

    /// Whether this memory is valid at `now` (open window ends pass).
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now >= until {
                return false;
            }
        }
        true
    }
}

/// A merged→original lineage record, written by consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupersedesLink {
    /// The surviving or synthesized memory.
    pub merged_id: i64,
    /// The memory it superseded.
    pub original_id: i64,
    /// When the merge happened.
    pub merged_at: DateTime<Utc>,
    /// Whether `merged_id` was created by the merge (and should be deleted on
    /// undo) rather than being a surviving original.
    pub synthetic: bool,
}

/// Persistence contract for memory records.
///
/// The engine never hard-deletes through this trait except when undoing a
/// synthetic merge; soft-invalidation is the normal lifecycle.
pub trait MemoryStore: Send {
    fn get(&self, id: i64) -> Result<Option<Memory>>;
    /// All memories that have not been superseded.
    fn list_active(&self) -> Result<Vec<Memory>>;
    /// Insert a new record, returning its assigned id. Embeddings are
    /// validated at this boundary.
    fn insert(&mut self, memory: Memory) -> Result<i64>;
    /// Mark `id` superseded: set `valid_until` and the back-pointer.
    fn soft_invalidate(&mut self, id: i64, superseded_by: i64, at: DateTime<Utc>) -> Result<()>;
    /// Clear a soft-invalidation.
    fn restore(&mut self, id: i64) -> Result<()>;
    /// Hard-remove a record (synthetic merge artifacts only).
    fn remove(&mut self, id: i64) -> Result<()>;
    /// Record an access: bump the count, set `last_accessed`.
    fn touch(&mut self, id: i64, now: DateTime<Utc>) -> Result<()>;

    fn add_supersedes_link(&mut self, link: SupersedesLink) -> Result<()>;
    fn links_from(&self, merged_id: i64) -> Result<Vec<SupersedesLink>>;
    fn all_links(&self) -> Result<Vec<SupersedesLink>>;
    fn remove_links_from(&mut self, merged_id: i64) -> Result<()>;
}

/// Plain-records store backed by a BTreeMap. The reference implementation,
/// also used throughout the tests.
pub struct InMemoryStore {
    memories: BTreeMap<i64, Memory>,
    links: Vec<SupersedesLink>,
    next_id: i64,
    /// Expected embedding dimension, enforced on insert.
    dimensions: usize,
}

impl InMemoryStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            memories: BTreeMap::new(),
            links: Vec::new(),
            next_id: 1,
            dimensions,
        }
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

impl MemoryStore for InMemoryStore {
    fn get(&self, id: i64) -> Result<Option<Memory>> {
        Ok(self.memories.get(&id).cloned())
    }

    fn list_active(&self) -> Result<Vec<Memory>> {
        Ok(self
            .memories
            .values()
            .filter(|m| m.superseded_by.is_none())
            .cloned()
            .collect())
    }

    fn insert(&mut self, mut memory: Memory) -> Result<i64> {
        if let Some(embedding) = &memory.embedding {
            validate_embedding(embedding, self.dimensions)?;
        }
        let id = self.next_id;
        self.next_id += 1;
        memory.id = id;
        self.memories.insert(id, memory);
        Ok(id)
    }

    fn soft_invalidate(&mut self, id: i64, superseded_by: i64, at: DateTime<Utc>) -> Result<()> {
        let Some(memory) = self.memories.get_mut(&id) else {
            bail!("memory not found: {id}");
        };
        memory.valid_until = Some(at);
        memory.superseded_by = Some(superseded_by);
        Ok(())
    }

    fn restore(&mut self, id: i64) -> Result<()> {
        let Some(memory) = self.memories.get_mut(&id) else {
            bail!("memory not found: {id}");
        };
        memory.valid_until = None;
        memory.superseded_by = None;
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        if self.memories.remove(&id).is_none() {
            bail!("memory not found: {id}");
        }
        Ok(())
    }

    fn touch(&mut self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let Some(memory) = self.memories.get_mut(&id) else {
            bail!("memory not found: {id}");
        };
        memory.access_count += 1;
        memory.last_accessed = Some(now);
        Ok(())
    }

    fn add_supersedes_link(&mut self, link: SupersedesLink) -> Result<()> {
        self.links.push(link);
        Ok(())
    }

    fn links_from(&self, merged_id: i64) -> Result<Vec<SupersedesLink>> {
        Ok(self
            .links
            .iter()
            .filter(|l| l.merged_id == merged_id)
            .cloned()
            .collect())
    }

    fn all_links(&self) -> Result<Vec<SupersedesLink>> {
        Ok(self.links.clone())
    }

    fn remove_links_from(&mut self, merged_id: i64) -> Result<()> {
        self.links.retain(|l| l.merged_id != merged_id);
        Ok(())
    }
}
