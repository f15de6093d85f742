//! Multi-Layer Perceptron (MLP)
//!
//! The network is an alternating chain of linear and tanh layers, finished by
//! a linear layer whose raw scores feed the softmax cross-entropy head.
//!
//! ## Architecture
//!
//! For layer sizes `[L0, L1, ..., Lk]`:
//!
//! ```text
//! x [B, L0] → Linear(L0→L1) → Tanh → Linear(L1→L2) → Tanh → ... → Linear(Lk-1→Lk) → scores [B, Lk]
//! ```
//!
//! `k` linear layers interleaved with `k - 1` tanh layers; there is no
//! activation after the last linear layer.
//!
//! ## One Training Step
//!
//! ```text
//! 1. forward (training mode)          scores = f(x)
//! 2. loss head                        (loss, grad) = CE(scores, labels)
//! 3. reverse sweep                    grad = layer.backward(grad) for each layer, last → first
//! 4. update                           θ -= lr * grad_θ for every linear layer
//! ```
//!
//! Steps 1-3 live in [`Mlp::compute_gradients`] and never touch a parameter.
//! Step 4 lives in [`Mlp::apply_gradients`]. Errors can only happen in steps
//! 1-3, so a failed [`Mlp::train_step`] leaves the network unchanged.
//!
//! ## Example
//!
//! ```rust
//! use handprop::{Mlp, Tensor};
//!
//! let mut mlp = Mlp::new(&[10, 10, 8, 8, 4], 1).unwrap();
//! let x = Tensor::zeros(vec![5, 10]);
//! let loss = mlp.train_step(&x, &[0, 1, 2, 3, 0], 1e-2).unwrap();
//! assert!(loss > 0.0);
//! assert_eq!(mlp.forward(&x).unwrap().shape, vec![5, 4]);
//! ```

use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::layers::{
    Layer, LinearLayer, LossOutput, ParamGradients, SoftmaxCrossEntropy, TanhLayer,
};
use crate::optimizer::sgd_update;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Feed-forward classifier with hand-derived backpropagation
pub struct Mlp {
    layers: Vec<Box<dyn Layer>>,
    loss: SoftmaxCrossEntropy,
    layer_sizes: Vec<usize>,
}

/// Parameter gradients for a whole network, indexed like [`Mlp::layers`]
///
/// Entries for parameter-free layers are `None`.
pub struct MlpGradients {
    pub layers: Vec<Option<ParamGradients>>,
}

/// Owned snapshot of one linear layer's parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearParameters {
    pub weights: Tensor,
    pub bias: Tensor,
}

impl Mlp {
    /// Build a network for `layer_sizes` with weights drawn from a seeded RNG
    pub fn new(layer_sizes: &[usize], seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::with_rng(layer_sizes, &mut rng)
    }

    /// Build a network for `layer_sizes` drawing weights from `rng`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if fewer than two sizes are given or any size
    /// is zero.
    pub fn with_rng<R: Rng + ?Sized>(layer_sizes: &[usize], rng: &mut R) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "need at least input and output sizes, got {:?}",
                layer_sizes
            )));
        }

        let num_linear = layer_sizes.len() - 1;
        let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(2 * num_linear - 1);
        for (i, pair) in layer_sizes.windows(2).enumerate() {
            layers.push(Box::new(LinearLayer::new(pair[0], pair[1], rng)?));
            if i + 1 < num_linear {
                layers.push(Box::new(TanhLayer::new()));
            }
        }

        Ok(Self {
            layers,
            loss: SoftmaxCrossEntropy::new(),
            layer_sizes: layer_sizes.to_vec(),
        })
    }

    /// Rebuild a network around existing linear layers (checkpoint loading)
    ///
    /// Consecutive layers must chain: each layer's output size is the next
    /// layer's input size.
    pub fn from_linear_layers(linears: Vec<LinearLayer>) -> Result<Self> {
        let first = linears
            .first()
            .ok_or_else(|| Error::InvalidConfig("network needs at least one linear layer".into()))?;
        let mut layer_sizes = vec![first.input_size()];
        for linear in &linears {
            let expected = *layer_sizes.last().unwrap_or(&0);
            if linear.input_size() != expected {
                return Err(Error::ShapeMismatch {
                    context: "linear layer chain",
                    expected,
                    actual: linear.input_size(),
                });
            }
            layer_sizes.push(linear.output_size());
        }

        let num_linear = linears.len();
        let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(2 * num_linear - 1);
        for (i, linear) in linears.into_iter().enumerate() {
            layers.push(Box::new(linear));
            if i + 1 < num_linear {
                layers.push(Box::new(TanhLayer::new()));
            }
        }

        Ok(Self {
            layers,
            loss: SoftmaxCrossEntropy::new(),
            layer_sizes,
        })
    }

    /// Replace the loss head (e.g. to enable a probability floor)
    pub fn with_loss(mut self, loss: SoftmaxCrossEntropy) -> Self {
        self.loss = loss;
        self
    }

    pub fn set_loss(&mut self, loss: SoftmaxCrossEntropy) {
        self.loss = loss;
    }

    pub fn loss_head(&self) -> &SoftmaxCrossEntropy {
        &self.loss
    }

    /// Width chain `[L0, ..., Lk]`
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    // Every constructor rejects chains shorter than two, so both ends exist.
    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    pub fn num_classes(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.layers
            .iter()
            .filter_map(|l| l.parameters())
            .map(|p| p.weight.data.len() + p.bias.data.len())
            .sum()
    }

    /// Switch every layer between training and evaluation mode
    pub fn set_training(&mut self, training: bool) {
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    pub fn is_training(&self) -> bool {
        self.layers.iter().all(|l| l.is_training())
    }

    /// Forward pass through every layer, returning raw class scores
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if `x` does not have `L0` columns.
    pub fn forward(&mut self, x: &Tensor) -> Result<Tensor> {
        if x.cols() != self.input_size() {
            return Err(Error::ShapeMismatch {
                context: "input width",
                expected: self.input_size(),
                actual: x.cols(),
            });
        }
        let mut out = x.clone();
        for layer in &mut self.layers {
            out = layer.forward(&out);
        }
        Ok(out)
    }

    /// Predicted class id for every row of `x`
    ///
    /// Runs in evaluation mode and restores the previous mode afterwards.
    pub fn predict(&mut self, x: &Tensor) -> Result<Vec<usize>> {
        let was_training = self.is_training();
        self.set_training(false);
        let scores = self.forward(x);
        self.set_training(was_training);
        Ok(scores?.argmax_rows())
    }

    /// Fraction of rows in `dataset` whose predicted class matches the label
    pub fn accuracy(&mut self, dataset: &Dataset) -> Result<f64> {
        if dataset.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let predictions = self.predict(dataset.inputs())?;
        let correct = predictions
            .iter()
            .zip(dataset.labels())
            .filter(|(p, l)| p == l)
            .count();
        Ok(correct as f64 / dataset.len() as f64)
    }

    /// Forward pass, loss and full backward sweep, without updating anything
    ///
    /// Puts the network in training mode so every layer caches its input.
    pub fn compute_gradients(
        &mut self,
        x: &Tensor,
        labels: &[usize],
    ) -> Result<(LossOutput, MlpGradients)> {
        if x.rows() == 0 {
            return Err(Error::EmptyBatch);
        }
        if labels.len() != x.rows() {
            return Err(Error::ShapeMismatch {
                context: "label count",
                expected: x.rows(),
                actual: labels.len(),
            });
        }

        self.set_training(true);
        let scores = self.forward(x)?;
        let output = self.loss.compute(&scores, labels)?;

        let mut grads: Vec<Option<ParamGradients>> = Vec::with_capacity(self.layers.len());
        let mut grad = output.grad.clone();
        for layer in self.layers.iter().rev() {
            let layer_grads = layer.backward(&grad)?;
            grad = layer_grads.input;
            grads.push(layer_grads.params);
        }
        grads.reverse();

        Ok((output, MlpGradients { layers: grads }))
    }

    /// Apply one SGD step with previously computed gradients
    ///
    /// # Panics
    ///
    /// Panics if `grads` was not produced by this network.
    pub fn apply_gradients(&mut self, grads: &MlpGradients, learning_rate: f64) {
        assert_eq!(
            grads.layers.len(),
            self.layers.len(),
            "Gradients cover {} layers, network has {}",
            grads.layers.len(),
            self.layers.len()
        );
        for (layer, layer_grads) in self.layers.iter_mut().zip(&grads.layers) {
            if let (Some(params), Some(g)) = (layer.parameters_mut(), layer_grads) {
                sgd_update(params, g, learning_rate);
            }
        }
    }

    /// One full training step: forward, loss, backward, SGD update
    ///
    /// Returns the batch loss.
    pub fn train_step(&mut self, x: &Tensor, labels: &[usize], learning_rate: f64) -> Result<f64> {
        let (output, grads) = self.compute_gradients(x, labels)?;
        self.apply_gradients(&grads, learning_rate);
        Ok(output.loss)
    }

    /// Snapshot of every linear layer's weights and bias, first to last
    pub fn linear_parameters(&self) -> Vec<LinearParameters> {
        self.layers
            .iter()
            .filter_map(|l| l.parameters())
            .map(|p| LinearParameters {
                weights: p.weight.clone(),
                bias: p.bias.clone(),
            })
            .collect()
    }
}
