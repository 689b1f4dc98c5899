//! Voice embeddings and the extraction port.

use std::sync::Arc;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxscribeError};

/// A fixed-dimension voice embedding, unit-normalized at construction so
/// cosine similarity reduces to a dot product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wraps a vector that is already unit-norm.
    pub fn from_unit(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// L2-normalizes the vector. A zero vector is returned unchanged
    /// rather than divided by zero.
    pub fn normalized(mut values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut values {
                *v /= norm;
            }
        }
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cosine similarity. Both embeddings are unit-norm, so this is the
    /// plain dot product, clamped against accumulated float error.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let dot: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a * b)
            .sum();
        dot.clamp(-1.0, 1.0)
    }

    /// Cosine distance, `1 - similarity`.
    pub fn distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }

    /// Arithmetic mean of a non-empty set, renormalized so the centroid can
    /// be compared through [`Embedding::similarity`] like any other
    /// embedding.
    pub fn mean(embeddings: &[Embedding]) -> Option<Embedding> {
        let first = embeddings.first()?;
        let dim = first.dim();
        let mut acc = vec![0.0f32; dim];
        for e in embeddings {
            for (a, v) in acc.iter_mut().zip(e.0.iter()) {
                *a += v;
            }
        }
        let n = embeddings.len() as f32;
        for a in &mut acc {
            *a /= n;
        }
        Some(Embedding::normalized(acc))
    }
}

/// Port to the application's speaker-embedding model.
pub trait EmbeddingExtractor: Send + Sync {
    /// Produces a unit-norm embedding for a run of speech samples.
    fn embed(&self, samples: &[f32]) -> Result<Embedding>;

    /// Dimension of the embeddings this extractor produces.
    fn dim(&self) -> usize;
}

impl<T: EmbeddingExtractor + ?Sized> EmbeddingExtractor for Arc<T> {
    fn embed(&self, samples: &[f32]) -> Result<Embedding> {
        (**self).embed(samples)
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }
}

/// Deterministic extractor for tests: returns queued embeddings in order,
/// then falls back to a default, or fails every call.
pub struct MockEmbeddingExtractor {
    queued: Mutex<Vec<Embedding>>,
    default: Embedding,
    fail: bool,
}

impl MockEmbeddingExtractor {
    pub fn new(default: Embedding) -> Self {
        Self {
            queued: Mutex::new(Vec::new()),
            default,
            fail: false,
        }
    }

    pub fn failing(dim: usize) -> Self {
        Self {
            queued: Mutex::new(Vec::new()),
            default: Embedding::from_unit(vec![0.0; dim]),
            fail: true,
        }
    }

    pub fn with_queued(self, embeddings: Vec<Embedding>) -> Self {
        {
            let mut queued = self.queued.lock().unwrap_or_else(|e| e.into_inner());
            // stored reversed so pop() yields front-of-queue first
            *queued = embeddings.into_iter().rev().collect();
        }
        self
    }
}

impl EmbeddingExtractor for MockEmbeddingExtractor {
    fn embed(&self, _samples: &[f32]) -> Result<Embedding> {
        if self.fail {
            return Err(VoxscribeError::EmbeddingFailed {
                message: "mock extractor configured to fail".to_string(),
            });
        }
        let mut queued = self.queued.lock().unwrap_or_else(|e| e.into_inner());
        Ok(queued.pop().unwrap_or_else(|| self.default.clone()))
    }

    fn dim(&self) -> usize {
        self.default.dim()
    }
}
