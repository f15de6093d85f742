//! Activation Functions
//!
//! ## Tanh
//!
//! The hidden layers of the MLP use the hyperbolic tangent:
//!
//! ```text
//! tanh(x) = (e^x - e^-x) / (e^x + e^-x)
//! ```
//!
//! Its derivative is expressed through the function itself:
//!
//! ```text
//! d/dx tanh(x) = 1 - tanh(x)²
//! ```
//!
//! so the backward pass only needs the cached input:
//!
//! ```text
//! grad_x = (1 - tanh(x)²) * grad_y
//! ```

use super::{Layer, LayerGradients};
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Element-wise tanh activation. Has no trainable parameters.
#[derive(Default)]
pub struct TanhLayer {
    last_input: Option<Tensor>,
    training: bool,
}

impl TanhLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The input cached by the last training-mode forward, if any
    pub fn last_input(&self) -> Option<&Tensor> {
        self.last_input.as_ref()
    }
}

impl Layer for TanhLayer {
    fn name(&self) -> &'static str {
        "tanh"
    }

    fn forward(&mut self, x: &Tensor) -> Tensor {
        if self.training {
            self.last_input = Some(x.clone());
        }
        x.tanh()
    }

    fn backward(&self, grad_y: &Tensor) -> Result<LayerGradients> {
        let x = self
            .last_input
            .as_ref()
            .ok_or(Error::NoCachedInput { layer: self.name() })?;

        let grad_data = x
            .data
            .par_iter()
            .zip(&grad_y.data)
            .map(|(&x_val, &grad_val)| {
                let t = x_val.tanh();
                (1.0 - t * t) * grad_val
            })
            .collect();

        Ok(LayerGradients {
            input: Tensor::new(grad_data, x.shape.clone()),
            params: None,
        })
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_forward_values() {
        let mut layer = TanhLayer::new();
        let y = layer.forward(&Tensor::new(vec![0.0, 1.0, -1.0], vec![1, 3]));
        assert_abs_diff_eq!(y.data[0], 0.0);
        assert_abs_diff_eq!(y.data[1], 1.0_f64.tanh());
        assert_abs_diff_eq!(y.data[2], -(1.0_f64.tanh()));
    }

    #[test]
    fn test_no_parameters() {
        let mut layer = TanhLayer::new();
        assert!(layer.parameters().is_none());
        assert!(layer.parameters_mut().is_none());

        layer.set_training(true);
        let x = Tensor::new(vec![0.3, -0.2], vec![1, 2]);
        layer.forward(&x);
        let grads = layer.backward(&Tensor::new(vec![1.0, 1.0], vec![1, 2])).unwrap();
        assert!(grads.params.is_none());
    }

    #[test]
    fn test_backward_requires_cached_input() {
        let layer = TanhLayer::new();
        let result = layer.backward(&Tensor::zeros(vec![1, 2]));
        assert!(matches!(result, Err(Error::NoCachedInput { layer: "tanh" })));
    }

    #[test]
    fn test_eval_mode_keeps_previous_cache() {
        let mut layer = TanhLayer::new();
        layer.set_training(true);
        let first = Tensor::new(vec![0.5], vec![1, 1]);
        layer.forward(&first);

        layer.set_training(false);
        layer.forward(&Tensor::new(vec![-2.0], vec![1, 1]));
        assert_eq!(layer.last_input(), Some(&first));
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let x = Tensor::new(vec![-1.5, -0.3, 0.0, 0.4, 0.9, 2.2], vec![2, 3]);
        let r = Tensor::new(vec![0.7, -1.1, 0.2, 1.3, -0.4, 0.5], vec![2, 3]);

        let mut layer = TanhLayer::new();
        layer.set_training(true);
        layer.forward(&x);
        let grads = layer.backward(&r).unwrap();

        let h = 1e-6;
        for i in 0..x.data.len() {
            let numeric = ((x.data[i] + h).tanh() - (x.data[i] - h).tanh()) / (2.0 * h) * r.data[i];
            assert_abs_diff_eq!(grads.input.data[i], numeric, epsilon = 1e-5);
        }
    }
}
