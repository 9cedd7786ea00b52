//! The working-memory pipeline.
//!
//! A pure function over a candidate list, an optional separately-fetched
//! pinned list, and a point in time. No storage access, no mutation of the
//! store — callers persist whatever they want afterwards. The stages, in
//! order: validity filter → pin detection → confidence decay → tag weight →
//! priority score → ordering → cap. Aggressive filter chains are a logged
//! condition, never an error: returning nothing from a non-empty input is a
//! valid outcome.

use chrono::{DateTime, Utc};

use crate::config::WorkingMemoryConfig;
use crate::memory::invariant::InvariantDetector;
use crate::memory::types::Memory;

/// Decayed quality never drops below this fraction of the base quality.
const DECAY_FLOOR: f64 = 0.1;

/// Access counts saturate the priority term at this many accesses.
const ACCESS_NORM: f64 = 20.0;

/// Neutral quality used in the priority formula when a memory carries no
/// quality signal at all.
const NEUTRAL_QUALITY: f64 = 0.5;

/// Tags that raise a memory's weight floor regardless of type.
const PRIORITY_TAGS: [&str; 3] = ["critical", "architecture", "security"];
/// Weight floor granted by a priority tag.
const PRIORITY_TAG_FLOOR: f64 = 0.6;

/// Fraction of candidates the validity filter may drop before we log it.
const VALIDITY_DROP_WARN_RATIO: f64 = 0.1;

/// Assemble the working-memory set from ranked candidates.
///
/// `pinned` holds memories the caller fetched separately (e.g. by an
/// invariant flag in storage); they are deduplicated against the candidates
/// and surface first regardless of score. The result is capped at `limit`.
pub fn assemble_working_memory(
    candidates: Vec<Memory>,
    pinned: Vec<Memory>,
    now: DateTime<Utc>,
    limit: usize,
    config: &WorkingMemoryConfig,
    detector: Option<&InvariantDetector>,
) -> Vec<Memory> {
    let input_len = candidates.len();

    // 1. Validity filter.
    let candidates = filter_valid(candidates, now, input_len);
    let pinned: Vec<Memory> = pinned.into_iter().filter(|m| m.is_valid_at(now)).collect();

    // 2. Pin detection over the candidate list.
    let mut pinned_out: Vec<Memory> = Vec::new();
    let mut unpinned: Vec<Memory> = Vec::new();
    for mut memory in candidates {
        if is_pinned(&mut memory, config, detector) {
            pinned_out.push(memory);
        } else {
            unpinned.push(memory);
        }
    }

    // 3. Merge the separately-fetched pinned list, deduplicating by id.
    for memory in pinned {
        if !pinned_out.iter().any(|m| m.id == memory.id) {
            pinned_out.push(memory);
        }
    }

    // 4–6. Score the remaining candidates: decay, tag weight, priority.
    let all_unscored = unpinned
        .iter()
        .all(|m| m.quality_score.is_none() && m.priority_score.is_none());

    if all_unscored && !unpinned.is_empty() {
        tracing::warn!(
            count = unpinned.len(),
            "no quality signal on any candidate, falling back to recency order"
        );
        unpinned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    } else {
        for memory in unpinned.iter_mut() {
            if memory.priority_score.is_none() {
                memory.priority_score = Some(priority_score(memory, now, config));
            }
        }
        // 7. Sort by priority.
        unpinned.sort_by(|a, b| {
            let pa = a.priority_score.unwrap_or(0.0);
            let pb = b.priority_score.unwrap_or(0.0);
            pb.partial_cmp(&pa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    // 8. Pinned first, then scored candidates, capped at the limit.
    let mut result = pinned_out;
    result.truncate(limit);
    for memory in unpinned {
        if result.len() >= limit {
            break;
        }
        result.push(memory);
    }

    if result.is_empty() && input_len > 0 {
        tracing::warn!(
            input = input_len,
            "working-memory pipeline produced no results from non-empty input"
        );
    }

    result
}

/// Drop memories outside their validity window, logging heavy attrition.
fn filter_valid(candidates: Vec<Memory>, now: DateTime<Utc>, input_len: usize) -> Vec<Memory> {
    let kept: Vec<Memory> = candidates.into_iter().filter(|m| m.is_valid_at(now)).collect();
    let dropped = input_len - kept.len();
    if input_len > 0 && (dropped as f64 / input_len as f64) > VALIDITY_DROP_WARN_RATIO {
        tracing::warn!(
            dropped,
            input = input_len,
            "validity filter removed more than 10% of candidates"
        );
    }
    kept
}

/// Pin check: stored flag, detected invariant phrasing, or correction count.
///
/// Detection (when it fires) also sets `is_invariant` so downstream scoring
/// and callers see the flag.
fn is_pinned(
    memory: &mut Memory,
    config: &WorkingMemoryConfig,
    detector: Option<&InvariantDetector>,
) -> bool {
    if !memory.is_invariant {
        if let Some(detector) = detector {
            if detector
                .detect(&memory.content, memory.embedding.as_deref())
                .is_match()
            {
                memory.is_invariant = true;
            }
        }
    }
    memory.is_invariant || memory.correction_count >= config.pin_threshold
}

/// Exponential confidence decay with a floor.
///
/// `base × max(0.1, 0.5^(hours_since_access / half_life))`, using
/// `last_accessed` and falling back to `created_at`. Timestamps in the future
/// clamp to zero elapsed time — no decay, rather than a negative exponent
/// inflating the score.
pub fn compute_confidence_decay(
    base_quality: f64,
    last_accessed: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_hours: f64,
) -> f64 {
    let reference = last_accessed.unwrap_or(created_at);
    let elapsed_hours = (now - reference).num_seconds().max(0) as f64 / 3600.0;
    let decay = 0.5f64.powf(elapsed_hours / half_life_hours);
    base_quality * decay.max(DECAY_FLOOR)
}

/// Type-based weight, with a floor for priority tags.
pub fn tag_weight(memory: &Memory) -> f64 {
    let base = memory.memory_type.base_weight();
    let has_priority_tag = memory
        .tags
        .iter()
        .any(|tag| PRIORITY_TAGS.iter().any(|p| tag.eq_ignore_ascii_case(p)));
    if has_priority_tag {
        base.max(PRIORITY_TAG_FLOOR).min(1.0)
    } else {
        base
    }
}

/// The weighted priority formula. Weights come from configuration — see
/// DESIGN.md for why they are overridable.
pub fn priority_score(memory: &Memory, now: DateTime<Utc>, config: &WorkingMemoryConfig) -> f64 {
    let decayed_quality = compute_confidence_decay(
        memory.quality_score.unwrap_or(NEUTRAL_QUALITY),
        memory.last_accessed,
        memory.created_at,
        now,
        config.decay_half_life_hours,
    );
    let corrections_norm =
        (f64::from(memory.correction_count) / f64::from(config.pin_threshold.max(1))).min(1.0);
    let access_norm = (f64::from(memory.access_count) / ACCESS_NORM).min(1.0);

    config.weight_invariant * f64::from(u8::from(memory.is_invariant))
        + config.weight_quality * decayed_quality
        + config.weight_corrections * corrections_norm
        + config.weight_tags * tag_weight(memory)
        + config.weight_access * access_norm
}
