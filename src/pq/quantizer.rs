//! Product quantizer: per-subspace codebooks trained with k-means.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::kmeans::KMeans;
use crate::simd;
use crate::store::VectorStore;

/// Codebook entries per subspace; one byte of code addresses one entry.
const MAX_CLUSTERS: usize = 256;

/// Decomposes vectors into equal-width subspaces and quantizes each
/// independently, one byte per subspace.
///
/// With `center = true` the global centroid is subtracted before chunking
/// and codebooks are trained on residuals; `decode` adds it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductQuantizer {
    dimension: usize,
    subspaces: usize,
    sub_dim: usize,
    clusters: usize,
    /// Per-subspace codebooks, each packed `clusters x sub_dim`, in
    /// residual space when centered.
    codebooks: Vec<Vec<f32>>,
    /// Per-subspace codebooks with the global centroid re-added; what a
    /// code actually reconstructs to. Identical to `codebooks` when not
    /// centered.
    decoded_codebooks: Vec<Vec<f32>>,
    /// Squared magnitude of every decoded codebook entry, packed
    /// `subspaces x clusters`. Feeds the cosine normalization pass.
    decoded_magnitudes: Vec<f32>,
    centroid: Option<Vec<f32>>,
}

impl ProductQuantizer {
    /// Train codebooks over every vector in `store`.
    ///
    /// Subspaces are independent, so their codebooks train in parallel
    /// across the rayon pool; per-subspace seeds keep the result
    /// deterministic regardless of scheduling.
    pub fn train<S: VectorStore + ?Sized>(
        store: &S,
        subspaces: usize,
        center: bool,
    ) -> Result<Self> {
        let n = store.len();
        if n == 0 {
            return Err(IndexError::EmptyIndex);
        }
        let dimension = store.dimension();
        if subspaces == 0 || dimension % subspaces != 0 {
            return Err(IndexError::InvalidParameter(format!(
                "dimension {dimension} is not divisible into {subspaces} subspaces"
            )));
        }
        let sub_dim = dimension / subspaces;
        let clusters = MAX_CLUSTERS.min(n);

        let centroid = if center {
            let mut c = vec![0.0f32; dimension];
            for i in 0..n {
                simd::add_in_place(&mut c, &store.vector(i as u32));
            }
            simd::scale(&mut c, 1.0 / n as f32);
            Some(c)
        } else {
            None
        };

        let codebooks: Vec<Vec<f32>> = (0..subspaces)
            .into_par_iter()
            .map(|m| {
                let lo = m * sub_dim;
                let hi = lo + sub_dim;

                let mut flat = Vec::with_capacity(n * sub_dim);
                for i in 0..n {
                    let v = store.vector(i as u32);
                    match &centroid {
                        Some(c) => {
                            flat.extend(v[lo..hi].iter().zip(&c[lo..hi]).map(|(x, g)| x - g))
                        }
                        None => flat.extend_from_slice(&v[lo..hi]),
                    }
                }

                let mut km = KMeans::new(sub_dim, clusters)?.with_seed(0x9e37_79b9 ^ m as u64);
                km.fit(&flat, n)?;
                Ok(km.centroids().to_vec())
            })
            .collect::<Result<_>>()?;

        let decoded_codebooks: Vec<Vec<f32>> = match &centroid {
            Some(c) => codebooks
                .iter()
                .enumerate()
                .map(|(m, book)| {
                    let chunk = &c[m * sub_dim..(m + 1) * sub_dim];
                    book.chunks_exact(sub_dim)
                        .flat_map(|entry| entry.iter().zip(chunk).map(|(e, g)| e + g))
                        .collect()
                })
                .collect(),
            None => codebooks.clone(),
        };

        let mut decoded_magnitudes = Vec::with_capacity(subspaces * clusters);
        for book in &decoded_codebooks {
            for entry in book.chunks_exact(sub_dim) {
                decoded_magnitudes.push(simd::dot(entry, entry));
            }
        }

        Ok(Self {
            dimension,
            subspaces,
            sub_dim,
            clusters,
            codebooks,
            decoded_codebooks,
            decoded_magnitudes,
            centroid,
        })
    }

    /// Quantize `vector` to one codebook index per subspace.
    pub fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut code = Vec::with_capacity(self.subspaces);
        let mut residual = vec![0.0f32; self.sub_dim];
        for m in 0..self.subspaces {
            let lo = m * self.sub_dim;
            for (d, r) in residual.iter_mut().enumerate() {
                *r = vector[lo + d]
                    - self.centroid.as_ref().map_or(0.0, |c| c[lo + d]);
            }

            let book = &self.codebooks[m];
            let mut best = 0usize;
            let mut best_dist = f32::INFINITY;
            for c in 0..self.clusters {
                let entry = &book[c * self.sub_dim..(c + 1) * self.sub_dim];
                let dist = simd::squared_distance(&residual, entry);
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            code.push(best as u8);
        }
        Ok(code)
    }

    /// Reconstruct the vector a code represents (centroid re-added).
    #[must_use]
    pub fn decode(&self, code: &[u8]) -> Vec<f32> {
        debug_assert_eq!(code.len(), self.subspaces);
        let mut out = Vec::with_capacity(self.dimension);
        for (m, &c) in code.iter().enumerate() {
            let book = &self.decoded_codebooks[m];
            out.extend_from_slice(&book[c as usize * self.sub_dim..(c as usize + 1) * self.sub_dim]);
        }
        out
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of subspaces (bytes per compressed vector).
    #[must_use]
    pub fn subspaces(&self) -> usize {
        self.subspaces
    }

    #[must_use]
    pub fn sub_dim(&self) -> usize {
        self.sub_dim
    }

    /// Codebook entries per subspace (256, or the corpus size if smaller).
    #[must_use]
    pub fn clusters(&self) -> usize {
        self.clusters
    }

    /// Residual-space codebook for subspace `m`, packed `clusters x sub_dim`.
    #[must_use]
    pub fn codebook(&self, m: usize) -> &[f32] {
        &self.codebooks[m]
    }

    /// Decoded codebook for subspace `m` (centroid re-added).
    #[must_use]
    pub(crate) fn decoded_codebook(&self, m: usize) -> &[f32] {
        &self.decoded_codebooks[m]
    }

    /// Squared magnitudes of decoded entries, packed `subspaces x clusters`.
    #[must_use]
    pub(crate) fn decoded_magnitudes(&self) -> &[f32] {
        &self.decoded_magnitudes
    }
}
