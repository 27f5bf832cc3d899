//! Random-access vector providers.

use std::borrow::Cow;

use crate::error::{IndexError, Result};

/// Random-access provider of `ordinal -> float vector`.
///
/// A store that owns plain slices returns `Cow::Borrowed`; a store that has
/// to decode (e.g. the big-endian on-disk graph) returns `Cow::Owned`.
/// Callers that retain a vector past the call must go through
/// `into_owned`, which copies exactly when the backing memory is shared.
pub trait VectorStore: Send + Sync {
    /// Number of vectors.
    fn len(&self) -> usize;

    /// Whether the store holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of every vector.
    fn dimension(&self) -> usize;

    /// The vector stored at `ordinal`.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal >= len()`.
    fn vector(&self, ordinal: u32) -> Cow<'_, [f32]>;
}

/// In-memory vector store, flat (structure-of-arrays) layout.
#[derive(Debug, Clone, Default)]
pub struct DenseVectorStore {
    data: Vec<f32>,
    dimension: usize,
}

impl DenseVectorStore {
    /// Create an empty store for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::InvalidParameter(
                "dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            data: Vec::new(),
            dimension,
        })
    }

    /// Append a vector, returning its assigned ordinal.
    pub fn push(&mut self, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let ordinal = (self.data.len() / self.dimension) as u32;
        self.data.extend_from_slice(vector);
        Ok(ordinal)
    }

    /// Build a store from a list of equal-dimension vectors.
    pub fn from_vectors(vectors: &[Vec<f32>]) -> Result<Self> {
        let dimension = vectors.first().map(Vec::len).ok_or(IndexError::EmptyIndex)?;
        let mut store = Self::new(dimension)?;
        for v in vectors {
            store.push(v)?;
        }
        Ok(store)
    }
}

impl VectorStore for DenseVectorStore {
    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, ordinal: u32) -> Cow<'_, [f32]> {
        let start = ordinal as usize * self.dimension;
        Cow::Borrowed(&self.data[start..start + self.dimension])
    }
}
