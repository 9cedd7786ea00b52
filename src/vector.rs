//! Vector-similarity search with a bounded brute-force fallback.
//!
//! The fast path queries an external ANN backend. When no backend is
//! configured, or the backend fails at runtime, the layer falls back to
//! brute-force cosine over a bounded number of rows. When the corpus is too
//! large even for that, the query degrades to lexical-only rather than risk
//! unbounded memory — availability over completeness, by contract with the
//! caller. Nothing in this layer surfaces ANN absence as an error.

use anyhow::Result;

use crate::embedding::cosine_similarity;

/// ANN candidates fetched per requested result.
const ANN_CANDIDATE_FACTOR: usize = 5;

/// External approximate-nearest-neighbor backend.
///
/// Returns `(id, distance)` pairs, nearest first. Distance is expected in
/// `[0, 2]` (cosine distance); similarity is computed as `1 - distance`.
pub trait AnnBackend: Send {
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(i64, f64)>>;
}

/// Row access for the brute-force fallback.
pub trait VectorSource: Send {
    /// Number of rows that would be scanned.
    fn row_count(&self) -> Result<usize>;
    /// Load up to `max_rows` `(id, embedding)` rows.
    fn scan(&self, max_rows: usize) -> Result<Vec<(i64, Vec<f32>)>>;
}

/// A scored vector hit. `score` is cosine similarity in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: i64,
    pub score: f64,
}

/// Outcome of a vector query.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorOutcome {
    /// Ranked hits, best first.
    Hits(Vec<VectorHit>),
    /// The corpus was too large to scan and no ANN backend answered —
    /// the caller should serve lexical-only results.
    Degraded,
}

/// Vector search layer: ANN fast path, brute-force fallback, bounded scan.
pub struct VectorSearch {
    ann: Option<Box<dyn AnnBackend>>,
    brute_force_max_rows: usize,
}

impl VectorSearch {
    pub fn new(ann: Option<Box<dyn AnnBackend>>, brute_force_max_rows: usize) -> Self {
        Self {
            ann,
            brute_force_max_rows,
        }
    }

    /// Query for the `limit` most similar rows at or above `threshold`.
    pub fn search(
        &self,
        source: &dyn VectorSource,
        query: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<VectorOutcome> {
        if let Some(ann) = &self.ann {
            match ann.query(query, limit * ANN_CANDIDATE_FACTOR) {
                Ok(candidates) => {
                    let mut hits: Vec<VectorHit> = candidates
                        .into_iter()
                        .map(|(id, distance)| VectorHit {
                            id,
                            score: 1.0 - distance,
                        })
                        .filter(|hit| hit.score >= threshold)
                        .collect();
                    hits.truncate(limit);
                    return Ok(VectorOutcome::Hits(hits));
                }
                Err(error) => {
                    tracing::warn!(%error, "ANN query failed, falling back to brute force");
                }
            }
        }

        self.brute_force(source, query, limit, threshold)
    }

    /// Cosine scan over at most `brute_force_max_rows` rows.
    fn brute_force(
        &self,
        source: &dyn VectorSource,
        query: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<VectorOutcome> {
        let rows = source.row_count()?;
        if rows > self.brute_force_max_rows {
            tracing::warn!(
                rows,
                cap = self.brute_force_max_rows,
                "corpus exceeds brute-force cap, degrading to lexical-only"
            );
            return Ok(VectorOutcome::Degraded);
        }

        let mut hits: Vec<VectorHit> = source
            .scan(self.brute_force_max_rows)?
            .into_iter()
            .map(|(id, embedding)| VectorHit {
                id,
                score: cosine_similarity(query, &embedding),
            })
            .filter(|hit| hit.score >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(VectorOutcome::Hits(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecRows(Vec<(i64, Vec<f32>)>);

    impl VectorSource for VecRows {
        fn row_count(&self) -> Result<usize> {
            Ok(self.0.len())
        }

        fn scan(&self, max_rows: usize) -> Result<Vec<(i64, Vec<f32>)>> {
            Ok(self.0.iter().take(max_rows).cloned().collect())
        }
    }

    struct FailingAnn;

    impl AnnBackend for FailingAnn {
        fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<(i64, f64)>> {
            anyhow::bail!("ann backend offline")
        }
    }

    struct FixedAnn(Vec<(i64, f64)>);

    impl AnnBackend for FixedAnn {
        fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<(i64, f64)>> {
            Ok(self.0.clone())
        }
    }

    fn axis(dim: usize, len: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; len];
        v[dim] = 1.0;
        v
    }

    #[test]
    fn test_brute_force_ranks_by_cosine() {
        let rows = VecRows(vec![
            (1, axis(0, 8)),
            (2, axis(1, 8)),
            (3, vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let search = VectorSearch::new(None, 10_000);
        let VectorOutcome::Hits(hits) = search.search(&rows, &axis(0, 8), 10, 0.5).unwrap()
        else {
            panic!("expected hits");
        };
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[1].id, 3);
        // id 2 is orthogonal — filtered by threshold.
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_ann_fast_path_converts_distance() {
        let search = VectorSearch::new(
            Some(Box::new(FixedAnn(vec![(5, 0.1), (6, 0.4), (7, 0.9)]))),
            10_000,
        );
        let rows = VecRows(vec![]);
        let VectorOutcome::Hits(hits) = search.search(&rows, &axis(0, 8), 2, 0.5).unwrap()
        else {
            panic!("expected hits");
        };
        // similarity = 1 - distance; 7 fails the 0.5 threshold; limit 2 keeps both others.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 5);
        assert!((hits[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_ann_failure_falls_back_silently() {
        let rows = VecRows(vec![(1, axis(0, 4))]);
        let search = VectorSearch::new(Some(Box::new(FailingAnn)), 10_000);
        let outcome = search.search(&rows, &axis(0, 4), 5, 0.5).unwrap();
        assert_eq!(
            outcome,
            VectorOutcome::Hits(vec![VectorHit { id: 1, score: 1.0 }])
        );
    }

    #[test]
    fn test_over_cap_degrades() {
        let rows = VecRows((0..20).map(|i| (i, axis(0, 4))).collect());
        let search = VectorSearch::new(None, 10);
        let outcome = search.search(&rows, &axis(0, 4), 5, 0.0).unwrap();
        assert_eq!(outcome, VectorOutcome::Degraded);
    }

    #[test]
    fn test_at_cap_still_scans() {
        let rows = VecRows((0..10).map(|i| (i, axis(0, 4))).collect());
        let search = VectorSearch::new(None, 10);
        let VectorOutcome::Hits(hits) = search.search(&rows, &axis(0, 4), 20, 0.0).unwrap()
        else {
            panic!("expected hits");
        };
        assert_eq!(hits.len(), 10);
    }

    #[test]
    fn test_empty_source() {
        let rows = VecRows(vec![]);
        let search = VectorSearch::new(None, 10_000);
        let outcome = search.search(&rows, &axis(0, 4), 5, 0.5).unwrap();
        assert_eq!(outcome, VectorOutcome::Hits(vec![]));
    }
}
