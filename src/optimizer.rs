//! Stochastic Gradient Descent
//!
//! The trainer uses plain mini-batch SGD with no momentum, no weight decay
//! and no gradient clipping:
//!
//! ```text
//! θ = θ - lr * grad_θ
//! ```
//!
//! ## Update Ordering
//!
//! Updates are only applied after the backward sweep has produced gradients
//! for *every* layer. [`Mlp::compute_gradients`](crate::Mlp::compute_gradients)
//! returns owned gradients for the whole network before [`sgd_update`] is
//! given mutable access to any parameter, so no layer's backward pass can
//! observe post-update weights.

use crate::layers::{ParamGradients, ParametersMut};
use crate::tensor::Tensor;
use rayon::prelude::*;

/// In-place `param -= grad * lr`
fn descend(param: &mut Tensor, grad: &Tensor, learning_rate: f64) {
    assert_eq!(
        param.shape, grad.shape,
        "Gradient shape {:?} doesn't match parameter shape {:?}",
        grad.shape, param.shape
    );
    param
        .data
        .par_iter_mut()
        .zip(&grad.data)
        .for_each(|(p, &g)| *p -= g * learning_rate);
}

/// Apply one SGD step to a layer's weight and bias
///
/// # Arguments
///
/// * `params` - Mutable view of the layer parameters
/// * `grads` - Gradients computed by the layer's backward pass
/// * `learning_rate` - Step size
pub fn sgd_update(params: ParametersMut<'_>, grads: &ParamGradients, learning_rate: f64) {
    descend(params.weight, &grads.weight, learning_rate);
    descend(params.bias, &grads.bias, learning_rate);
}
