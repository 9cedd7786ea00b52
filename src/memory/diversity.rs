//! Greedy diversity filter over a ranked memory list.
//!
//! Near-duplicate memories crowd out everything else in a small working set.
//! This pass keeps the first (best) item unconditionally, then keeps each
//! subsequent item only if it is sufficiently dissimilar from everything
//! already kept. Items without an embedding are exempt — we cannot measure
//! them, and dropping them blind would be worse.

use crate::embedding::cosine_similarity;
use crate::memory::types::Memory;

/// Filter a ranked list down to pairwise-dissimilar entries.
///
/// Order is preserved; `max_similarity` is the exclusive ceiling on cosine
/// similarity between any two kept items that both carry embeddings.
pub fn diversity_filter(ranked: Vec<Memory>, max_similarity: f64) -> Vec<Memory> {
    let mut kept: Vec<Memory> = Vec::with_capacity(ranked.len());

    for memory in ranked {
        let Some(embedding) = &memory.embedding else {
            kept.push(memory);
            continue;
        };
        let too_similar = kept.iter().any(|other| {
            other
                .embedding
                .as_ref()
                .is_some_and(|o| cosine_similarity(embedding, o) >= max_similarity)
        });
        if !too_similar {
            kept.push(memory);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryType;
    use chrono::Utc;

    fn memory_with_embedding(id: i64, embedding: Option<Vec<f32>>) -> Memory {
        let mut m = Memory::new(id, format!("memory {id}"), MemoryType::Learning, Utc::now());
        m.embedding = embedding;
        m
    }

    fn axis(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        v[dim] = 1.0;
        v
    }

    #[test]
    fn test_first_item_always_kept() {
        let items = vec![
            memory_with_embedding(1, Some(axis(0))),
            memory_with_embedding(2, Some(axis(0))),
        ];
        let kept = diversity_filter(items, 0.85);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }

    #[test]
    fn test_dissimilar_items_survive() {
        let items = vec![
            memory_with_embedding(1, Some(axis(0))),
            memory_with_embedding(2, Some(axis(1))),
            memory_with_embedding(3, Some(axis(2))),
        ];
        let kept = diversity_filter(items, 0.85);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_pairwise_bound_holds() {
        let near_duplicate = {
            let mut v = axis(0);
            v[1] = 0.1;
            v
        };
        let items = vec![
            memory_with_embedding(1, Some(axis(0))),
            memory_with_embedding(2, Some(near_duplicate)),
            memory_with_embedding(3, Some(axis(1))),
        ];
        let kept = diversity_filter(items, 0.85);
        for a in &kept {
            for b in &kept {
                if a.id == b.id {
                    continue;
                }
                if let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) {
                    assert!(cosine_similarity(ea, eb) < 0.85);
                }
            }
        }
        assert!(!kept.iter().any(|m| m.id == 2));
    }

    #[test]
    fn test_missing_embedding_is_exempt() {
        let items = vec![
            memory_with_embedding(1, Some(axis(0))),
            memory_with_embedding(2, None),
            memory_with_embedding(3, None),
        ];
        let kept = diversity_filter(items, 0.85);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(diversity_filter(Vec::new(), 0.85).is_empty());
    }
}
