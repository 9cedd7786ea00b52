//! Embedding provider contract and boundary validation.
//!
//! Provides the [`EmbeddingProvider`] trait implemented by the external model
//! runtime (ONNX session, remote API, …) and [`validate_embedding`], the one
//! hard validation gate in the engine: vectors with the wrong dimension or
//! non-finite components are rejected at the boundary rather than silently
//! corrupting similarity math downstream.

use anyhow::Result;

/// Typed embedding-validation failure.
///
/// This is the only user-visible hard error the scoring paths produce —
/// callers match on it to distinguish a bad write from an operational fault.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EmbeddingError {
    /// The vector has a different dimension than the store expects.
    #[error("embedding has {actual} dimensions, expected {expected}")]
    WrongDimension { expected: usize, actual: usize },
    /// The vector contains NaN or infinite components.
    #[error("embedding contains a non-finite value at index {index}")]
    NonFinite { index: usize },
}

/// Trait for embedding text into vectors.
///
/// Implementations produce fixed-dimension vectors. All methods are
/// synchronous — callers in async contexts wrap calls in their runtime's
/// blocking facility.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Reject vectors that would corrupt similarity math.
///
/// Wrong dimension and non-finite components are hard errors; silent
/// corruption is worse than failure here.
pub fn validate_embedding(embedding: &[f32], expected_dim: usize) -> Result<(), EmbeddingError> {
    if embedding.len() != expected_dim {
        return Err(EmbeddingError::WrongDimension {
            expected: expected_dim,
            actual: embedding.len(),
        });
    }
    for (index, value) in embedding.iter().enumerate() {
        if !value.is_finite() {
            return Err(EmbeddingError::NonFinite { index });
        }
    }
    Ok(())
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for empty or mismatched inputs rather than erroring — the
/// scoring paths treat an unusable pair as "not similar".
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
