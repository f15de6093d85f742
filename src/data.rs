//! Classification Datasets and Mini-Batching
//!
//! A [`Dataset`] is a fixed `[N, F]` input matrix with one integer class id per
//! row. Training draws a fresh random permutation of the row indices every
//! epoch and walks it in contiguous chunks:
//!
//! ```text
//! N = 7, batch_size = 3
//! permutation: [4, 0, 6, 2, 5, 1, 3]
//! batches:     [4, 0, 6] [2, 5, 1] [3]     <- last batch is short
//! ```
//!
//! ## Example
//!
//! ```rust
//! use handprop::Dataset;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let data = Dataset::random(7, 4, 3, 1).unwrap();
//! let mut rng = StdRng::seed_from_u64(0);
//! let sizes: Vec<usize> = data.shuffled_batches(3, &mut rng).map(|b| b.len()).collect();
//! assert_eq!(sizes, vec![3, 3, 1]);
//! ```

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};

/// Inputs plus integer class labels
#[derive(Clone, Debug)]
pub struct Dataset {
    inputs: Tensor,
    labels: Vec<usize>,
}

impl Dataset {
    /// Pair an `[N, F]` input matrix with `N` class ids
    pub fn new(inputs: Tensor, labels: Vec<usize>) -> Result<Self> {
        if inputs.shape.len() != 2 {
            return Err(Error::InvalidConfig(format!(
                "dataset inputs must be a matrix, got shape {:?}",
                inputs.shape
            )));
        }
        if inputs.rows() != labels.len() {
            return Err(Error::ShapeMismatch {
                context: "dataset label count",
                expected: inputs.rows(),
                actual: labels.len(),
            });
        }
        Ok(Self { inputs, labels })
    }

    /// Build a dataset from one-hot (or score-like) label rows
    ///
    /// Each label is the index of the row maximum.
    pub fn from_one_hot(inputs: Tensor, one_hot: &Tensor) -> Result<Self> {
        Self::new(inputs, one_hot.argmax_rows())
    }

    /// Standard-normal inputs with uniformly drawn labels
    ///
    /// There is no relation between inputs and labels, so a network can only
    /// fit this data by memorizing it.
    pub fn random(n: usize, features: usize, classes: usize, seed: u64) -> Result<Self> {
        check_generator_args(n, features, classes)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let inputs = (0..n * features)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();
        let labels = (0..n).map(|_| rng.gen_range(0..classes)).collect();
        Self::new(Tensor::new(inputs, vec![n, features]), labels)
    }

    /// Balanced Gaussian clusters, one per class
    ///
    /// Row `i` belongs to class `i % classes`. Class centres are drawn from a
    /// standard normal; each sample is its centre plus N(0, spread²) noise.
    pub fn gaussian_blobs(
        n: usize,
        features: usize,
        classes: usize,
        spread: f64,
        seed: u64,
    ) -> Result<Self> {
        check_generator_args(n, features, classes)?;
        let noise = Normal::new(0.0, spread)
            .map_err(|e| Error::InvalidConfig(format!("blob spread: {}", e)))?;
        let mut rng = StdRng::seed_from_u64(seed);

        let centres: Vec<Vec<f64>> = (0..classes)
            .map(|_| (0..features).map(|_| StandardNormal.sample(&mut rng)).collect())
            .collect();

        let labels: Vec<usize> = (0..n).map(|i| i % classes).collect();
        let mut inputs = Vec::with_capacity(n * features);
        for &label in &labels {
            for &c in &centres[label] {
                inputs.push(c + noise.sample(&mut rng));
            }
        }
        Self::new(Tensor::new(inputs, vec![n, features]), labels)
    }

    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.inputs.cols()
    }

    /// Number of classes implied by the labels (largest label + 1)
    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |&m| m + 1)
    }

    /// Gather the rows at `indices` into a batch
    pub fn batch(&self, indices: &[usize]) -> (Tensor, Vec<usize>) {
        let inputs = self.inputs.select_rows(indices);
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        (inputs, labels)
    }

    /// One shuffled pass over the dataset, as index batches of `batch_size`
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn shuffled_batches<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> BatchIter {
        assert!(batch_size > 0, "batch_size must be positive");
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);
        BatchIter {
            indices,
            batch_size,
            position: 0,
        }
    }
}

fn check_generator_args(n: usize, features: usize, classes: usize) -> Result<()> {
    if n == 0 || features == 0 || classes == 0 {
        return Err(Error::InvalidConfig(format!(
            "synthetic dataset needs positive sizes, got n={} features={} classes={}",
            n, features, classes
        )));
    }
    Ok(())
}

/// Iterator over contiguous chunks of a shuffled index permutation
pub struct BatchIter {
    indices: Vec<usize>,
    batch_size: usize,
    position: usize,
}

impl Iterator for BatchIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.indices.len() {
            return None;
        }
        let end = (self.position + self.batch_size).min(self.indices.len());
        let batch = self.indices[self.position..end].to_vec();
        self.position = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_row_count() {
        let inputs = Tensor::zeros(vec![3, 2]);
        assert!(matches!(
            Dataset::new(inputs, vec![0, 1]),
            Err(Error::ShapeMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_from_one_hot() {
        let inputs = Tensor::zeros(vec![3, 2]);
        let one_hot = Tensor::from_rows(&[
            vec![0.0, 0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ]);
        let data = Dataset::from_one_hot(inputs, &one_hot).unwrap();
        assert_eq!(data.labels(), &[2, 0, 3]);
        assert_eq!(data.num_classes(), 4);
    }

    #[test]
    fn test_shuffled_batches_cover_every_row_once() {
        let data = Dataset::random(23, 3, 4, 9).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let batches: Vec<Vec<usize>> = data.shuffled_batches(5, &mut rng).collect();

        assert_eq!(batches.len(), 5);
        assert!(batches[..4].iter().all(|b| b.len() == 5));
        assert_eq!(batches[4].len(), 3);

        let mut seen: Vec<usize> = batches.concat();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_gathers_rows_and_labels() {
        let inputs = Tensor::from_rows(&[vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]]);
        let data = Dataset::new(inputs, vec![0, 1, 2]).unwrap();
        let (x, y) = data.batch(&[2, 0]);
        assert_eq!(x.data, vec![3.0, 3.0, 1.0, 1.0]);
        assert_eq!(y, vec![2, 0]);
    }

    #[test]
    fn test_generators_are_seeded() {
        let a = Dataset::random(10, 4, 3, 11).unwrap();
        let b = Dataset::random(10, 4, 3, 11).unwrap();
        assert_eq!(a.inputs(), b.inputs());
        assert_eq!(a.labels(), b.labels());
        assert!(a.labels().iter().all(|&l| l < 3));

        let blobs = Dataset::gaussian_blobs(100, 10, 4, 0.5, 3).unwrap();
        for class in 0..4 {
            assert_eq!(blobs.labels().iter().filter(|&&l| l == class).count(), 25);
        }
    }

    #[test]
    fn test_generators_reject_zero_sizes() {
        assert!(Dataset::random(0, 4, 3, 1).is_err());
        assert!(Dataset::gaussian_blobs(10, 0, 3, 0.5, 1).is_err());
    }
}
