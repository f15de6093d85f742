//! Neural Network Layers
//!
//! This module contains the layer implementations for the trainable MLP.
//! Each layer provides both a forward and a hand-derived backward pass.
//!
//! ## Layers
//!
//! - **linear**: Affine transform `y = x @ W + b`
//! - **activation**: Element-wise `tanh`
//! - **loss**: Softmax cross-entropy head (terminal, not a [`Layer`])
//!
//! ## Design Pattern
//!
//! Every layer implements the same contract:
//!
//! ```rust,ignore
//! impl Layer for SomeLayer {
//!     fn forward(&mut self, x: &Tensor) -> Tensor { }          // caches x while training
//!     fn backward(&self, grad_y: &Tensor) -> Result<LayerGradients> { }
//!     fn set_training(&mut self, training: bool) { }
//! }
//! ```
//!
//! `backward` always returns the gradient with respect to the layer input.
//! Layers that own parameters also return a [`ParamGradients`]; layers that
//! don't return `None`. The caller can therefore run one uniform update loop
//! without knowing which concrete layer it is looking at.

pub mod activation;
pub mod linear;
pub mod loss;

use crate::error::Result;
use crate::tensor::Tensor;

pub use activation::TanhLayer;
pub use linear::LinearLayer;
pub use loss::{LossOutput, SoftmaxCrossEntropy};

/// Forward/backward/mode contract shared by every layer of the network
pub trait Layer: Send {
    /// Short human-readable layer name, used in errors and logs
    fn name(&self) -> &'static str;

    /// Compute the layer output. Caches `x` when in training mode.
    fn forward(&mut self, x: &Tensor) -> Tensor;

    /// Back-propagate `grad_y` (gradient w.r.t. this layer's output).
    ///
    /// Fails with [`Error::NoCachedInput`](crate::Error::NoCachedInput) unless
    /// a training-mode `forward` has run.
    fn backward(&self, grad_y: &Tensor) -> Result<LayerGradients>;

    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    /// Read access to trainable parameters, if the layer has any
    fn parameters(&self) -> Option<Parameters<'_>> {
        None
    }

    /// Write access to trainable parameters, if the layer has any
    fn parameters_mut(&mut self) -> Option<ParametersMut<'_>> {
        None
    }
}

/// Result of a layer's backward pass
pub struct LayerGradients {
    /// Gradient with respect to the layer input, passed to the previous layer
    pub input: Tensor,
    /// Parameter gradients (`None` for parameter-free layers)
    pub params: Option<ParamGradients>,
}

/// Gradients for a weight matrix and its bias row
#[derive(Clone, Debug)]
pub struct ParamGradients {
    pub weight: Tensor,
    pub bias: Tensor,
}

/// Borrowed view of a layer's parameters
pub struct Parameters<'a> {
    pub weight: &'a Tensor,
    pub bias: &'a Tensor,
}

/// Mutable view of a layer's parameters, used only by the update phase
pub struct ParametersMut<'a> {
    pub weight: &'a mut Tensor,
    pub bias: &'a mut Tensor,
}
