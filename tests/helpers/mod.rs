#![allow(dead_code)]

use chrono::{DateTime, Utc};
use mnema::index::{Corpus, IndexRegistry, IndexedUnit, UnitSource};
use mnema::memory::{Memory, MemoryType};
use mnema::storage::InMemoryMetadataStore;
use mnema::vector::VectorSource;

/// Embedding dimension used across integration tests.
pub const DIM: usize = 16;

/// Generate a deterministic embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed % DIM] = 1.0;
    v
}

/// Generate an embedding similar to `base` with small perturbation.
/// The result has cosine similarity well above 0.95 with `base`.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..3 {
        v[(i * 5) % DIM] += 0.05;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// A memory with the given id, content, quality, and embedding.
pub fn test_memory(
    id: i64,
    content: &str,
    quality: Option<f64>,
    embedding: Option<Vec<f32>>,
    now: DateTime<Utc>,
) -> Memory {
    let mut m = Memory::new(id, content, MemoryType::Learning, now);
    m.quality_score = quality;
    m.embedding = embedding;
    m
}

/// Fixed-content unit source for registry tests.
pub struct VecUnitSource {
    pub units: Vec<IndexedUnit>,
}

impl UnitSource for VecUnitSource {
    fn fetch_page(
        &self,
        _corpus: Corpus,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<IndexedUnit>> {
        Ok(self.units.iter().skip(offset).take(limit).cloned().collect())
    }
}

/// Fixed row set for the brute-force vector path.
pub struct VecRows(pub Vec<(i64, Vec<f32>)>);

impl VectorSource for VecRows {
    fn row_count(&self) -> anyhow::Result<usize> {
        Ok(self.0.len())
    }

    fn scan(&self, max_rows: usize) -> anyhow::Result<Vec<(i64, Vec<f32>)>> {
        Ok(self.0.iter().take(max_rows).cloned().collect())
    }
}

/// An indexed unit with optional symbol name.
pub fn unit(id: i64, content: &str, symbol: Option<&str>) -> IndexedUnit {
    IndexedUnit {
        id,
        content: content.to_string(),
        symbol_name: symbol.map(str::to_string),
        signature: None,
    }
}

/// Registry over an in-memory metadata store and the given units.
pub fn test_registry(units: Vec<IndexedUnit>) -> IndexRegistry {
    IndexRegistry::new(
        Box::new(InMemoryMetadataStore::new()),
        Box::new(VecUnitSource { units }),
    )
}
