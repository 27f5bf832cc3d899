//! Lloyd's k-means with k-means++ seeding.
//!
//! Used for product-quantization codebook training; clusters in squared
//! Euclidean space over flat (structure-of-arrays) input.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{IndexError, Result};
use crate::simd;

/// Iteration cap for Lloyd refinement.
const MAX_ITERATIONS: usize = 25;

/// Convergence threshold on squared centroid movement.
const MOVEMENT_EPSILON: f32 = 1e-6;

/// k-means clustering over flat vector storage.
pub struct KMeans {
    /// Centroids packed `k x dimension`.
    centroids: Vec<f32>,
    dimension: usize,
    k: usize,
    seed: Option<u64>,
}

impl KMeans {
    pub fn new(dimension: usize, k: usize) -> Result<Self> {
        if dimension == 0 || k == 0 {
            return Err(IndexError::InvalidParameter(
                "dimension and k must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            centroids: Vec::new(),
            dimension,
            k,
            seed: None,
        })
    }

    /// Configure a deterministic seed for k-means++ initialization.
    ///
    /// When set, repeated `fit(...)` calls on the same inputs produce
    /// identical results.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Train on `num_vectors` vectors packed contiguously in `vectors`.
    pub fn fit(&mut self, vectors: &[f32], num_vectors: usize) -> Result<()> {
        if vectors.len() < num_vectors * self.dimension {
            return Err(IndexError::InvalidParameter(
                "insufficient vector data for the stated count".to_string(),
            ));
        }
        if num_vectors < self.k {
            return Err(IndexError::InvalidParameter(format!(
                "cannot fit {} clusters to {num_vectors} vectors",
                self.k
            )));
        }

        self.centroids = self.kmeans_plus_plus(vectors, num_vectors);

        for _iteration in 0..MAX_ITERATIONS {
            let assignments = self.assign_clusters(vectors, num_vectors);
            let new_centroids = self.update_centroids(vectors, num_vectors, &assignments);

            let mut max_movement = 0.0f32;
            for c in 0..self.k {
                let old = &self.centroids[c * self.dimension..(c + 1) * self.dimension];
                let new = &new_centroids[c * self.dimension..(c + 1) * self.dimension];
                max_movement = max_movement.max(simd::squared_distance(old, new));
            }

            self.centroids = new_centroids;
            if max_movement < MOVEMENT_EPSILON {
                break;
            }
        }

        Ok(())
    }

    /// Index of the centroid nearest to `vector` by squared distance.
    #[must_use]
    pub fn nearest(&self, vector: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for c in 0..self.k {
            let centroid = &self.centroids[c * self.dimension..(c + 1) * self.dimension];
            let dist = simd::squared_distance(vector, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }

    /// Assign each vector to its nearest cluster.
    #[must_use]
    pub fn assign_clusters(&self, vectors: &[f32], num_vectors: usize) -> Vec<usize> {
        (0..num_vectors)
            .map(|i| self.nearest(self.get_vector(vectors, i)))
            .collect()
    }

    fn update_centroids(
        &self,
        vectors: &[f32],
        num_vectors: usize,
        assignments: &[usize],
    ) -> Vec<f32> {
        let mut sums = vec![0.0f32; self.k * self.dimension];
        let mut counts = vec![0usize; self.k];

        for (i, &cluster) in assignments.iter().enumerate().take(num_vectors) {
            counts[cluster] += 1;
            let vec = self.get_vector(vectors, i);
            simd::add_in_place(
                &mut sums[cluster * self.dimension..(cluster + 1) * self.dimension],
                vec,
            );
        }

        let mut new_centroids = vec![0.0f32; self.k * self.dimension];
        for c in 0..self.k {
            let dst = &mut new_centroids[c * self.dimension..(c + 1) * self.dimension];
            if counts[c] > 0 {
                let sum = &sums[c * self.dimension..(c + 1) * self.dimension];
                for (d, s) in dst.iter_mut().zip(sum.iter()) {
                    *d = s / counts[c] as f32;
                }
            } else {
                // Empty cluster: keep the previous centroid.
                dst.copy_from_slice(&self.centroids[c * self.dimension..(c + 1) * self.dimension]);
            }
        }

        new_centroids
    }

    /// k-means++ seeding: first centroid uniform, the rest sampled
    /// proportional to the distance to the nearest chosen centroid.
    fn kmeans_plus_plus(&self, vectors: &[f32], num_vectors: usize) -> Vec<f32> {
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut centroids = Vec::with_capacity(self.k * self.dimension);

        let first = rng.random_range(0..num_vectors);
        centroids.extend_from_slice(self.get_vector(vectors, first));

        let mut min_dists = vec![f32::INFINITY; num_vectors];
        while centroids.len() < self.k * self.dimension {
            let latest = &centroids[centroids.len() - self.dimension..];
            let mut total = 0.0f64;
            for i in 0..num_vectors {
                let d = simd::squared_distance(self.get_vector(vectors, i), latest);
                if d < min_dists[i] {
                    min_dists[i] = d;
                }
                total += min_dists[i] as f64;
            }

            let mut chosen = num_vectors - 1;
            if total > 0.0 {
                let threshold = rng.random::<f64>() * total;
                let mut cumulative = 0.0f64;
                for (i, &d) in min_dists.iter().enumerate() {
                    cumulative += d as f64;
                    if cumulative >= threshold {
                        chosen = i;
                        break;
                    }
                }
            } else {
                // All points coincide with a centroid; any pick works.
                chosen = rng.random_range(0..num_vectors);
            }
            centroids.extend_from_slice(self.get_vector(vectors, chosen));
        }

        centroids
    }

    fn get_vector<'v>(&self, vectors: &'v [f32], idx: usize) -> &'v [f32] {
        &vectors[idx * self.dimension..(idx + 1) * self.dimension]
    }

    /// Centroids packed `k x dimension`.
    #[must_use]
    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn separates_two_obvious_clusters() {
        let mut data = Vec::new();
        for i in 0..8 {
            data.extend_from_slice(&[i as f32 * 0.01, 0.0]);
        }
        for i in 0..8 {
            data.extend_from_slice(&[10.0 + i as f32 * 0.01, 0.0]);
        }
        let mut km = KMeans::new(2, 2).unwrap().with_seed(7);
        km.fit(&data, 16).unwrap();
        let assignments = km.assign_clusters(&data, 16);
        assert!(assignments[..8].iter().all(|&a| a == assignments[0]));
        assert!(assignments[8..].iter().all(|&a| a == assignments[8]));
        assert_ne!(assignments[0], assignments[8]);
    }

    #[test]
    fn rejects_more_clusters_than_points() {
        let mut km = KMeans::new(2, 4).unwrap();
        assert!(km.fit(&[0.0, 0.0, 1.0, 1.0], 2).is_err());
    }

    proptest! {
        #[test]
        fn fit_is_deterministic_given_seed(
            seed in any::<u64>(),
            dimension in 1usize..8,
            num_vectors in 2usize..48,
            k in 1usize..8,
            raw in proptest::collection::vec(-1.0f32..1.0f32, 2usize..(48 * 8)),
        ) {
            prop_assume!(k <= num_vectors);
            let needed = num_vectors * dimension;
            prop_assume!(raw.len() >= needed);
            let vectors = &raw[..needed];

            let mut km1 = KMeans::new(dimension, k).unwrap().with_seed(seed);
            let mut km2 = KMeans::new(dimension, k).unwrap().with_seed(seed);
            km1.fit(vectors, num_vectors).unwrap();
            km2.fit(vectors, num_vectors).unwrap();

            prop_assert_eq!(
                km1.assign_clusters(vectors, num_vectors),
                km2.assign_clusters(vectors, num_vectors)
            );
        }
    }
}
