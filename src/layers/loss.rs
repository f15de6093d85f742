//! Softmax Cross-Entropy Loss Head
//!
//! Converts raw class scores into probabilities and a scalar loss, and
//! produces the gradient that starts the backward sweep.
//!
//! ## Forward
//!
//! ```text
//! p[i, :] = softmax(scores[i, :])
//! loss    = mean_i( -ln p[i, label_i] )
//! ```
//!
//! ## Gradient
//!
//! Softmax followed by cross-entropy has a closed-form gradient with respect
//! to the scores, so the softmax Jacobian never has to be built:
//!
//! ```text
//! grad = (p - one_hot(labels)) / batch
//! ```
//!
//! `batch` is always the row count of the scores actually passed in, so the
//! short final batch of an epoch is averaged correctly.
//!
//! ## Zero Probabilities
//!
//! By default `-ln p` is evaluated unclamped: a true-class probability that
//! underflows to exactly 0 makes the loss `+inf`. The step is flagged as
//! degenerate and a warning is logged, but training carries on. Setting a
//! `probability_floor` evaluates `-ln(max(p, floor))` instead; the gradient is
//! the same either way.

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Softmax + cross-entropy loss head
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SoftmaxCrossEntropy {
    /// Lower bound applied to the true-class probability before the log
    pub probability_floor: Option<f64>,
}

/// Output of the loss head for one batch
#[derive(Clone, Debug)]
pub struct LossOutput {
    /// Mean negative log-likelihood over the batch
    pub loss: f64,
    /// Gradient of `loss` with respect to the scores, `[batch, classes]`
    pub grad: Tensor,
    /// Softmax probabilities, `[batch, classes]`
    pub probs: Tensor,
    /// True when some true-class probability was exactly zero
    pub degenerate: bool,
}

impl SoftmaxCrossEntropy {
    /// Unclamped loss head
    pub fn new() -> Self {
        Self::default()
    }

    /// Loss head that clamps probabilities to at least `floor` before the log
    pub fn with_probability_floor(floor: f64) -> Self {
        Self {
            probability_floor: Some(floor),
        }
    }

    /// Row-wise softmax of the scores
    ///
    /// Independent of the probability floor, which only affects the loss.
    pub fn softmax(scores: &Tensor) -> Tensor {
        scores.softmax_rows()
    }

    /// Compute loss, score gradient and probabilities for a batch
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBatch`] if the scores have no rows
    /// - [`Error::ShapeMismatch`] if `labels.len()` differs from the score rows
    /// - [`Error::LabelOutOfRange`] if any label is not below the class count
    pub fn compute(&self, scores: &Tensor, labels: &[usize]) -> Result<LossOutput> {
        let batch_size = scores.rows();
        let num_classes = scores.cols();

        if batch_size == 0 {
            return Err(Error::EmptyBatch);
        }
        if labels.len() != batch_size {
            return Err(Error::ShapeMismatch {
                context: "label count",
                expected: batch_size,
                actual: labels.len(),
            });
        }
        if let Some((index, &label)) = labels.iter().enumerate().find(|(_, &l)| l >= num_classes) {
            return Err(Error::LabelOutOfRange {
                index,
                label,
                num_classes,
            });
        }

        let probs = Self::softmax(scores);

        let mut total = 0.0;
        let mut degenerate = false;
        let mut grad = probs.clone();
        for (i, &label) in labels.iter().enumerate() {
            let p = probs.data[i * num_classes + label];
            if p == 0.0 {
                degenerate = true;
            }
            let p = match self.probability_floor {
                Some(floor) => p.max(floor),
                None => p,
            };
            total -= p.ln();
            grad.data[i * num_classes + label] -= 1.0;
        }

        if degenerate {
            tracing::warn!(
                clamped = self.probability_floor.is_some(),
                "true-class probability underflowed to zero; batch loss is unreliable"
            );
        }

        Ok(LossOutput {
            loss: total / batch_size as f64,
            grad: grad.div_scalar(batch_size as f64),
            probs,
            degenerate,
        })
    }
}
