//! Duplicate discovery and safe merging of memories.
//!
//! Near-duplicate pairs are found by embedding similarity, then merged either
//! through an external LLM collaborator or a deterministic quality-based
//! heuristic. Losers are soft-invalidated — `valid_until` plus a back-pointer
//! — and a supersedes link records the lineage, so every merge can be undone
//! and the full history reconstructed. Per-pair provider failures are
//! recorded in the run report and never abort the run.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ConsolidationConfig;
use crate::embedding::cosine_similarity;
use crate::memory::types::{Memory, MemoryStore, SupersedesLink};

/// Attempts per merge call, including the first.
const MERGE_ATTEMPTS: u32 = 2;
/// Base backoff between merge attempts.
const MERGE_BACKOFF_MS: u64 = 200;

/// External LLM collaborator synthesizing merged content.
pub trait MergeProvider: Send {
    fn merge(&self, content_a: &str, content_b: &str) -> Result<String>;
}

/// Summary of one consolidation run.
#[derive(Debug, Default, Serialize)]
pub struct ConsolidationReport {
    /// Candidate pairs above the similarity threshold (after the cap).
    pub candidates: usize,
    /// Merges performed.
    pub merged: usize,
    /// Memories soft-invalidated.
    pub invalidated: usize,
    /// Originals that survived as the merge target (heuristic merges).
    pub kept: usize,
    /// Per-pair failures; the run continued past each.
    pub errors: Vec<String>,
}

/// A reconstructed merge event.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationHistoryEntry {
    pub merged_memory_id: i64,
    pub original_ids: Vec<i64>,
    pub merged_at: DateTime<Utc>,
    pub merged_content: String,
}

/// Result of undoing one consolidation.
#[derive(Debug, Serialize)]
pub struct UndoResult {
    pub restored: Vec<i64>,
    /// Whether a synthetic merged memory was deleted.
    pub merged_deleted: bool,
}

/// The consolidation engine. Stateless between runs; all state lives in the
/// store.
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self { config }
    }

    /// One consolidation pass over the store.
    ///
    /// With a [`MergeProvider`], merged content is synthesized and stored as
    /// a new memory superseding both originals. Without one, the
    /// higher-quality memory of each pair survives and supersedes the other.
    pub fn run(
        &self,
        store: &mut dyn MemoryStore,
        provider: Option<&dyn MergeProvider>,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();

        let pairs = self.find_candidates(store, now)?;
        report.candidates = pairs.len();

        let mut consumed: Vec<i64> = Vec::new();
        for (a, b, similarity) in pairs {
            if consumed.contains(&a.id) || consumed.contains(&b.id) {
                continue;
            }
            tracing::debug!(a = a.id, b = b.id, similarity, "consolidating pair");

            let outcome = match provider {
                Some(provider) => self.merge_with_provider(store, provider, &a, &b, now),
                None => self.merge_heuristic(store, &a, &b, now),
            };
            match outcome {
                Ok(MergeOutcome { invalidated, kept }) => {
                    report.merged += 1;
                    report.invalidated += invalidated;
                    report.kept += kept;
                    consumed.push(a.id);
                    consumed.push(b.id);
                }
                Err(error) => {
                    report
                        .errors
                        .push(format!("pair ({}, {}): {error:#}", a.id, b.id));
                }
            }
        }

        tracing::info!(
            candidates = report.candidates,
            merged = report.merged,
            invalidated = report.invalidated,
            errors = report.errors.len(),
            "consolidation run finished"
        );
        Ok(report)
    }

    /// Active, valid, embedded memory pairs above the merge threshold,
    /// most-similar first, capped per run.
    fn find_candidates(
        &self,
        store: &dyn MemoryStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Memory, Memory, f64)>> {
        let active: Vec<Memory> = store
            .list_active()?
            .into_iter()
            .filter(|m| m.is_valid_at(now) && m.embedding.is_some())
            .collect();

        let mut pairs: Vec<(Memory, Memory, f64)> = Vec::new();
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let (a, b) = (&active[i], &active[j]);
                let similarity = cosine_similarity(
                    a.embedding.as_deref().unwrap_or_default(),
                    b.embedding.as_deref().unwrap_or_default(),
                );
                if similarity >= self.config.merge_similarity_threshold {
                    pairs.push((a.clone(), b.clone(), similarity));
                }
            }
        }

        pairs.sort_by(|x, y| {
            y.2.partial_cmp(&x.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (x.0.id, x.1.id).cmp(&(y.0.id, y.1.id)))
        });
        pairs.truncate(self.config.max_candidates_per_run);
        Ok(pairs)
    }

    /// LLM-assisted merge: synthesize content, insert a new memory, supersede
    /// both originals.
    fn merge_with_provider(
        &self,
        store: &mut dyn MemoryStore,
        provider: &dyn MergeProvider,
        a: &Memory,
        b: &Memory,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome> {
        let content = merge_with_retry(provider, &a.content, &b.content)?;

        let mut merged = Memory::new(0, content, a.memory_type, now);
        merged.embedding = average_embedding(a.embedding.as_deref(), b.embedding.as_deref());
        merged.tags = union_tags(&a.tags, &b.tags);
        merged.quality_score = match (a.quality_score, b.quality_score) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (q, None) | (None, q) => q,
        };
        merged.is_invariant = a.is_invariant || b.is_invariant;
        merged.correction_count = a.correction_count.max(b.correction_count);
        let merged_id = store.insert(merged)?;

        for original in [a, b] {
            store.soft_invalidate(original.id, merged_id, now)?;
            store.add_supersedes_link(SupersedesLink {
                merged_id,
                original_id: original.id,
                merged_at: now,
                synthetic: true,
            })?;
        }

        Ok(MergeOutcome {
            invalidated: 2,
            kept: 0,
        })
    }

    /// Deterministic merge: the higher-quality memory survives.
    fn merge_heuristic(
        &self,
        store: &mut dyn MemoryStore,
        a: &Memory,
        b: &Memory,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome> {
        let (keeper, loser) =
            if b.quality_score.unwrap_or(0.0) > a.quality_score.unwrap_or(0.0) {
                (b, a)
            } else {
                (a, b)
            };

        store.soft_invalidate(loser.id, keeper.id, now)?;
        store.add_supersedes_link(SupersedesLink {
            merged_id: keeper.id,
            original_id: loser.id,
            merged_at: now,
            synthetic: false,
        })?;

        Ok(MergeOutcome {
            invalidated: 1,
            kept: 1,
        })
    }

    /// Undo a consolidation: restore every original and delete the merged
    /// memory when it was synthesized by the merge.
    pub fn undo(&self, store: &mut dyn MemoryStore, merged_id: i64) -> Result<UndoResult> {
        let links = store.links_from(merged_id)?;
        if links.is_empty() {
            bail!("nothing to undo for memory {merged_id}");
        }

        let mut restored = Vec::with_capacity(links.len());
        for link in &links {
            store.restore(link.original_id)?;
            restored.push(link.original_id);
        }

        let merged_deleted = links.iter().any(|l| l.synthetic);
        if merged_deleted {
            store.remove(merged_id)?;
        }
        store.remove_links_from(merged_id)?;

        tracing::info!(merged_id, restored = restored.len(), "consolidation undone");
        Ok(UndoResult {
            restored,
            merged_deleted,
        })
    }

    /// Reconstruct merge history by walking supersedes links, newest first.
    pub fn history(
        &self,
        store: &dyn MemoryStore,
        limit: usize,
    ) -> Result<Vec<ConsolidationHistoryEntry>> {
        let links = store.all_links()?;

        let mut entries: Vec<ConsolidationHistoryEntry> = Vec::new();
        for link in links {
            match entries.iter_mut().find(|e| e.merged_memory_id == link.merged_id) {
                Some(entry) => {
                    entry.original_ids.push(link.original_id);
                    entry.merged_at = entry.merged_at.max(link.merged_at);
                }
                None => {
                    let merged_content = store
                        .get(link.merged_id)?
                        .map(|m| m.content)
                        .unwrap_or_default();
                    entries.push(ConsolidationHistoryEntry {
                        merged_memory_id: link.merged_id,
                        original_ids: vec![link.original_id],
                        merged_at: link.merged_at,
                        merged_content,
                    });
                }
            }
        }

        for entry in entries.iter_mut() {
            entry.original_ids.sort_unstable();
        }
        entries.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

struct MergeOutcome {
    invalidated: usize,
    kept: usize,
}

/// Call the provider with bounded retries and linear backoff.
fn merge_with_retry(provider: &dyn MergeProvider, a: &str, b: &str) -> Result<String> {
    let mut last_error = None;
    for attempt in 1..=MERGE_ATTEMPTS {
        match provider.merge(a, b) {
            Ok(content) => return Ok(content),
            Err(error) => {
                tracing::debug!(attempt, %error, "merge attempt failed");
                last_error = Some(error);
                if attempt < MERGE_ATTEMPTS {
                    std::thread::sleep(std::time::Duration::from_millis(
                        MERGE_BACKOFF_MS * u64::from(attempt),
                    ));
                }
            }
        }
    }
    Err(last_error.expect("at least one attempt ran"))
}

/// Element-wise mean of two embeddings; either one alone when the other is
/// missing or the dimensions disagree.
fn average_embedding(a: Option<&[f32]>, b: Option<&[f32]>) -> Option<Vec<f32>> {
    match (a, b) {
        (Some(a), Some(b)) if a.len() == b.len() => {
            Some(a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect())
        }
        (Some(a), _) => Some(a.to_vec()),
        (_, Some(b)) => Some(b.to_vec()),
        (None, None) => None,
    }
}

fn union_tags(a: &[String], b: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = a.to_vec();
    for tag in b {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.clone());
        }
    }
    tags
}
