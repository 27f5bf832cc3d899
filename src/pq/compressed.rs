//! Compressed vectors and asymmetric distance computation.
//!
//! Queries stay uncompressed; corpus vectors are PQ codes. A per-query
//! table of partial scores (one row per subspace, one entry per codebook
//! cluster) turns scoring a code into a handful of table lookups.

use rayon::prelude::*;

use crate::error::{IndexError, Result};
use crate::pq::ProductQuantizer;
use crate::similarity::VectorSimilarity;
use crate::simd;
use crate::store::VectorStore;

/// Lanes per tile in bulk scoring; the SIMD shuffle kernel's natural width.
const BULK_LANES: usize = 32;

const NORM_EPSILON: f32 = 1e-9;

/// PQ-coded corpus: one `subspaces`-byte code per ordinal.
#[derive(Debug, Clone)]
pub struct CompressedVectors {
    quantizer: ProductQuantizer,
    codes: Vec<u8>,
    count: usize,
}

impl CompressedVectors {
    /// Encode every vector in `store` with `quantizer`, in parallel across
    /// the rayon pool.
    pub fn encode<S: VectorStore + ?Sized>(quantizer: ProductQuantizer, store: &S) -> Result<Self> {
        if store.dimension() != quantizer.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: quantizer.dimension(),
                actual: store.dimension(),
            });
        }
        let count = store.len();
        let per_vector: Vec<Vec<u8>> = (0..count as u32)
            .into_par_iter()
            .map(|i| quantizer.encode(&store.vector(i)))
            .collect::<Result<_>>()?;
        let mut codes = Vec::with_capacity(count * quantizer.subspaces());
        for code in per_vector {
            codes.extend(code);
        }
        Ok(Self {
            quantizer,
            codes,
            count,
        })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn quantizer(&self) -> &ProductQuantizer {
        &self.quantizer
    }

    /// The code of `ordinal`.
    #[must_use]
    pub fn code(&self, ordinal: u32) -> &[u8] {
        let s = self.quantizer.subspaces();
        &self.codes[ordinal as usize * s..(ordinal as usize + 1) * s]
    }

    /// Precompute the asymmetric distance table for `query`.
    pub fn adc_table(&self, query: &[f32], similarity: VectorSimilarity) -> Result<AdcTable> {
        AdcTable::new(&self.quantizer, query, similarity)
    }

    /// Approximate score function over this corpus for one query; feed it
    /// to the searcher, rerank with the exact function.
    pub fn approximate_scorer<'a>(
        &'a self,
        query: &[f32],
        similarity: VectorSimilarity,
    ) -> Result<impl Fn(u32) -> f32 + Send + use<'a>> {
        let table = self.adc_table(query, similarity)?;
        Ok(move |ordinal: u32| table.score(self.code(ordinal)))
    }

    /// Score the whole corpus into `out` through the bulk-shuffle kernel,
    /// one tile of [`BULK_LANES`] codes at a time.
    pub fn score_all(
        &self,
        query: &[f32],
        similarity: VectorSimilarity,
        out: &mut [f32],
    ) -> Result<()> {
        if out.len() != self.count {
            return Err(IndexError::InvalidParameter(format!(
                "output length {} != corpus size {}",
                out.len(),
                self.count
            )));
        }
        let table = self.adc_table(query, similarity)?;
        let s = self.quantizer.subspaces();
        let clusters = self.quantizer.clusters();

        let mut tile = vec![0u8; s * BULK_LANES];
        let mut sums = vec![0.0f32; BULK_LANES];
        let mut mag_sums = vec![0.0f32; BULK_LANES];

        let mut base = 0usize;
        while base < self.count {
            let lanes = BULK_LANES.min(self.count - base);
            // Transpose the next `lanes` codes into subspace-major order.
            for lane in 0..lanes {
                let code = self.code((base + lane) as u32);
                for (m, &c) in code.iter().enumerate() {
                    tile[m * lanes + lane] = c;
                }
            }
            let tile = &tile[..s * lanes];
            simd::bulk_shuffle_sum(tile, s, clusters, &table.partials, &mut sums[..lanes]);
            if let Some(m) = table.magnitudes.as_deref() {
                simd::bulk_shuffle_sum(tile, s, clusters, m, &mut mag_sums[..lanes]);
            }
            let has_mags = table.magnitudes.is_some();
            for lane in 0..lanes {
                let mag = has_mags.then(|| mag_sums[lane]);
                out[base + lane] = table.combine(sums[lane], mag);
            }
            base += lanes;
        }
        Ok(())
    }
}

/// Per-query table of partial scores against every decoded codebook entry.
#[derive(Debug, Clone)]
pub struct AdcTable {
    similarity: VectorSimilarity,
    clusters: usize,
    /// `subspaces x clusters`: squared distances for Euclidean, dots for
    /// DotProduct and Cosine.
    partials: Vec<f32>,
    /// `subspaces x clusters` squared magnitudes, Cosine only.
    magnitudes: Option<Vec<f32>>,
    query_norm: f32,
}

impl AdcTable {
    pub fn new(
        quantizer: &ProductQuantizer,
        query: &[f32],
        similarity: VectorSimilarity,
    ) -> Result<Self> {
        if query.len() != quantizer.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: quantizer.dimension(),
                actual: query.len(),
            });
        }
        let subspaces = quantizer.subspaces();
        let sub_dim = quantizer.sub_dim();
        let clusters = quantizer.clusters();

        let mut partials = vec![0.0f32; subspaces * clusters];
        for m in 0..subspaces {
            let q_sub = &query[m * sub_dim..(m + 1) * sub_dim];
            let row = &mut partials[m * clusters..(m + 1) * clusters];
            match similarity {
                VectorSimilarity::Euclidean => {
                    simd::squared_distance_multi(q_sub, quantizer.decoded_codebook(m), row);
                }
                VectorSimilarity::DotProduct | VectorSimilarity::Cosine => {
                    simd::dot_multi(q_sub, quantizer.decoded_codebook(m), row);
                }
            }
        }

        let magnitudes = matches!(similarity, VectorSimilarity::Cosine)
            .then(|| quantizer.decoded_magnitudes().to_vec());

        Ok(Self {
            similarity,
            clusters,
            partials,
            magnitudes,
            query_norm: simd::norm(query),
        })
    }

    /// Approximate similarity of `code` to the table's query.
    #[must_use]
    pub fn score(&self, code: &[u8]) -> f32 {
        let sum = simd::assemble_and_sum(&self.partials, self.clusters, code);
        let mag = self
            .magnitudes
            .as_deref()
            .map(|m| simd::assemble_and_sum(m, self.clusters, code));
        self.combine(sum, mag)
    }

    fn combine(&self, sum: f32, magnitude_sum: Option<f32>) -> f32 {
        match self.similarity {
            VectorSimilarity::Euclidean => 1.0 / (1.0 + sum),
            VectorSimilarity::DotProduct => (1.0 + sum) / 2.0,
            VectorSimilarity::Cosine => {
                let denom = self.query_norm * magnitude_sum.unwrap_or(0.0).sqrt();
                let cos = if denom > NORM_EPSILON {
                    (sum / denom).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
                (1.0 + cos) / 2.0
            }
        }
    }
}
