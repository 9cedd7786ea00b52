//! The memory engine: records, prioritization, and consolidation.
//!
//! - [`types`] — `Memory`, `MemoryType`, supersedes links, and the store trait
//! - [`pipeline`] — the working-memory assembly pipeline
//! - [`invariant`] — invariant detection for pinning
//! - [`diversity`] — the greedy diversity filter
//! - [`consolidate`] — duplicate discovery, merge, undo, and history

pub mod consolidate;
pub mod diversity;
pub mod invariant;
pub mod pipeline;
pub mod types;

pub use consolidate::{
    ConsolidationEngine, ConsolidationHistoryEntry, ConsolidationReport, MergeProvider,
    UndoResult,
};
pub use diversity::diversity_filter;
pub use invariant::{InvariantDetector, InvariantSignal};
pub use pipeline::{assemble_working_memory, compute_confidence_decay};
pub use types::{InMemoryStore, Memory, MemoryStore, MemoryType, SupersedesLink};
