//! Dense Matrix Operations
//!
//! This module provides the small numeric kernel the trainer runs on: a dense,
//! row-major matrix of `f64` values. Activations, gradients, weights and biases
//! are all `Tensor`s of rank 1 or 2.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f64>` storing all elements in row-major order
//! - **Shape**: `[rows, cols]` for matrices, `[len]` for vectors
//!
//! A rank-1 tensor behaves like a single row wherever a row count is needed.
//!
//! ## Example
//!
//! ```rust
//! use handprop::Tensor;
//!
//! let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let c = a.matmul(&b);
//! assert_eq!(c.shape, vec![2, 2]);
//! assert_eq!(c.data, vec![4.0, 5.0, 10.0, 11.0]);
//! ```
//!
//! ## Performance
//!
//! Element-wise operations and large matrix products go through Rayon. The
//! training loop itself stays sequential; parallelism lives only inside a
//! single operation.
//!
//! Shape misuse here is a programming error and panics with a descriptive
//! message. User-facing validation (batch width, label range) happens in
//! [`Mlp`](crate::Mlp) and returns [`Error`](crate::Error) instead.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A dense row-major matrix (or vector) of `f64` values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Flat storage of all elements
    pub data: Vec<f64>,
    /// `[rows, cols]` or `[len]`
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the shape has rank 0 or above 2, or if the product of shape
    /// dimensions doesn't equal the data length.
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Self {
        assert!(
            (1..=2).contains(&shape.len()),
            "Only rank 1 and rank 2 tensors are supported, got shape {:?}",
            shape
        );
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );
        Self { data, shape }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Build a `[rows.len(), cols]` matrix from equally sized rows
    ///
    /// # Example
    ///
    /// ```rust
    /// # use handprop::Tensor;
    /// let t = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
    /// assert_eq!(t.shape, vec![2, 2]);
    /// ```
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), cols, "Row {} has length {}, expected {}", i, row.len(), cols);
            data.extend_from_slice(row);
        }
        Self::new(data, vec![rows.len(), cols])
    }

    /// Number of rows (1 for a vector)
    pub fn rows(&self) -> usize {
        if self.shape.len() == 2 {
            self.shape[0]
        } else {
            1
        }
    }

    /// Number of columns (the length for a vector)
    pub fn cols(&self) -> usize {
        *self.shape.last().unwrap_or(&0)
    }

    /// Borrow row `i` as a slice
    pub fn row(&self, i: usize) -> &[f64] {
        let cols = self.cols();
        &self.data[i * cols..(i + 1) * cols]
    }

    /// Computes: result[j] += a_val * b[j] for all j
    #[inline(always)]
    fn matmul_inner(a_val: f64, b: &[f64], result: &mut [f64]) {
        for (r, &b_val) in result.iter_mut().zip(b.iter()) {
            *r += a_val * b_val;
        }
    }

    /// Matrix multiplication
    ///
    /// For `A @ B` where `A` is `[m, k]` and `B` is `[k, n]` the result is
    /// `[m, n]`, with `C[i,j] = sum(A[i,l] * B[l,j])`.
    ///
    /// Products under 1K multiply-adds run sequentially; larger ones use the
    /// parallel cache-blocked kernel.
    ///
    /// # Panics
    ///
    /// Panics if the inner dimensions disagree.
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let m = self.rows();
        let k = self.cols();
        let n = other.cols();
        assert_eq!(
            k,
            other.rows(),
            "Matrix dimensions incompatible: [{}, {}] @ [{}, {}]",
            m,
            k,
            other.rows(),
            n
        );

        if m * n * k >= 1_000 {
            return self.matmul_parallel_blocked(other, m, n, k);
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for l in 0..k {
                let a_val = self.data[i * k + l];
                Self::matmul_inner(
                    a_val,
                    &other.data[l * n..(l + 1) * n],
                    &mut result[i * n..(i + 1) * n],
                );
            }
        }
        Tensor::new(result, vec![m, n])
    }

    /// Parallel cache-blocked matrix multiplication
    ///
    /// Splits the output into 8-row blocks processed across cores, and walks
    /// the column and inner dimensions in 8-wide tiles so each tile stays in
    /// L1 cache.
    fn matmul_parallel_blocked(&self, other: &Tensor, m: usize, n: usize, k: usize) -> Tensor {
        const BLOCK_SIZE: usize = 8;

        let mut result = vec![0.0; m * n];

        result
            .par_chunks_mut(BLOCK_SIZE * n)
            .enumerate()
            .for_each(|(block_i, result_block)| {
                let i_start = block_i * BLOCK_SIZE;
                let i_end = (i_start + BLOCK_SIZE).min(m);

                for j_start in (0..n).step_by(BLOCK_SIZE) {
                    let j_end = (j_start + BLOCK_SIZE).min(n);

                    for k_start in (0..k).step_by(BLOCK_SIZE) {
                        let k_end = (k_start + BLOCK_SIZE).min(k);

                        for i in i_start..i_end {
                            let row_offset = (i - i_start) * n;
                            for k_idx in k_start..k_end {
                                Self::matmul_inner(
                                    self.data[i * k + k_idx],
                                    &other.data[k_idx * n + j_start..k_idx * n + j_end],
                                    &mut result_block[row_offset + j_start..row_offset + j_end],
                                );
                            }
                        }
                    }
                }
            });

        Tensor::new(result, vec![m, n])
    }

    /// Matrix transpose (`[r, c]` → `[c, r]`); a vector becomes a column
    pub fn transpose(&self) -> Tensor {
        let rows = self.rows();
        let cols = self.cols();
        let mut result = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                result[j * rows + i] = self.data[i * cols + j];
            }
        }
        Tensor::new(result, vec![cols, rows])
    }

    /// Element-wise addition with row broadcasting
    ///
    /// Supports:
    ///
    /// 1. **Exact match**: same shape
    /// 2. **Row broadcast**: `[rows, n] + [1, n]` or `[rows, n] + [n]` (bias addition)
    ///
    /// # Example
    ///
    /// ```rust
    /// # use handprop::Tensor;
    /// let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// let b = Tensor::new(vec![10.0, 20.0], vec![1, 2]);
    /// assert_eq!(x.add(&b).data, vec![11.0, 22.0, 13.0, 24.0]);
    /// ```
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        let cols = self.cols();
        if other.data.len() == cols && other.rows() == 1 {
            let result = self
                .data
                .par_iter()
                .enumerate()
                .map(|(i, a)| a + other.data[i % cols])
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        panic!(
            "Unsupported broadcast for add: {:?} + {:?}",
            self.shape, other.shape
        );
    }

    /// Divide all elements by scalar
    pub fn div_scalar(&self, scalar: f64) -> Tensor {
        let result = self.data.par_iter().map(|&x| x / scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Element-wise hyperbolic tangent
    pub fn tanh(&self) -> Tensor {
        let result = self.data.par_iter().map(|&x| x.tanh()).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Row-wise softmax
    ///
    /// Uses the numerically stable form
    ///
    /// ```text
    /// softmax(x)[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    /// ```
    ///
    /// computed independently for every row, in parallel.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use handprop::Tensor;
    /// let p = Tensor::new(vec![1.0, 2.0, 3.0], vec![1, 3]).softmax_rows();
    /// assert!((p.data.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    /// ```
    pub fn softmax_rows(&self) -> Tensor {
        let cols = self.cols();
        let result: Vec<f64> = (0..self.rows())
            .into_par_iter()
            .flat_map_iter(|i| {
                let row = &self.data[i * cols..(i + 1) * cols];
                let max = row.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let exp_values: Vec<f64> = row.iter().map(|&x| (x - max).exp()).collect();
                let sum: f64 = exp_values.iter().sum();
                exp_values.into_iter().map(move |v| v / sum)
            })
            .collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Column sums over the row axis, shape `[1, cols]`
    pub fn sum_rows(&self) -> Tensor {
        let rows = self.rows();
        let cols = self.cols();
        let result = (0..cols)
            .map(|j| (0..rows).map(|i| self.data[i * cols + j]).sum())
            .collect();
        Tensor::new(result, vec![1, cols])
    }

    /// Gather rows by index into a new `[indices.len(), cols]` matrix
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn select_rows(&self, indices: &[usize]) -> Tensor {
        let cols = self.cols();
        let mut data = Vec::with_capacity(indices.len() * cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Tensor::new(data, vec![indices.len(), cols])
    }

    /// Index of the largest element in every row (first wins on ties)
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.rows())
            .map(|i| {
                self.row(i)
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best_j, best), (j, &v)| {
                        if v > best {
                            (j, v)
                        } else {
                            (best_j, best)
                        }
                    })
                    .0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_small() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], vec![2, 2]);
        assert_eq!(a.matmul(&b).data, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_blocked_matches_naive() {
        // 20 x 15 @ 15 x 11 crosses the parallel threshold
        let a = Tensor::new((0..300).map(|i| (i % 7) as f64 - 3.0).collect(), vec![20, 15]);
        let b = Tensor::new((0..165).map(|i| (i % 5) as f64 * 0.5).collect(), vec![15, 11]);
        let c = a.matmul(&b);

        for i in 0..20 {
            for j in 0..11 {
                let expected: f64 = (0..15).map(|l| a.data[i * 15 + l] * b.data[l * 11 + j]).sum();
                assert!((c.data[i * 11 + j] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    #[should_panic(expected = "Matrix dimensions incompatible")]
    fn test_matmul_shape_mismatch() {
        let a = Tensor::zeros(vec![2, 3]);
        let b = Tensor::zeros(vec![2, 3]);
        let _ = a.matmul(&b);
    }

    #[test]
    fn test_transpose() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let tt = t.transpose();
        assert_eq!(tt.shape, vec![3, 2]);
        assert_eq!(tt.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_add_broadcasts_rank1_bias() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let b = Tensor::new(vec![0.5, -0.5], vec![2]);
        assert_eq!(x.add(&b).data, vec![1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let t = Tensor::new(vec![1000.0, 1001.0, 1002.0, -5.0, 0.0, 5.0], vec![2, 3]);
        let p = t.softmax_rows();
        for i in 0..2 {
            let sum: f64 = p.row(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        assert!(p.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_sum_rows() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2]);
        let s = t.sum_rows();
        assert_eq!(s.shape, vec![1, 2]);
        assert_eq!(s.data, vec![9.0, 12.0]);
    }

    #[test]
    fn test_select_rows_and_argmax() {
        let t = Tensor::from_rows(&[vec![0.1, 0.9], vec![0.7, 0.3], vec![0.2, 0.2]]);
        let picked = t.select_rows(&[2, 0]);
        assert_eq!(picked.data, vec![0.2, 0.2, 0.1, 0.9]);
        assert_eq!(t.argmax_rows(), vec![1, 0, 0]);
    }
}
