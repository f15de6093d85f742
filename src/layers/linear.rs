//! Linear Layer (Fully Connected)
//!
//! The linear layer performs an affine transformation: y = x @ W + b
//!
//! ## Forward Pass
//!
//! ```text
//! Input:  x [batch, input_size]
//! Weight: W [input_size, output_size]
//! Bias:   b [1, output_size]
//! Output: y = x @ W + b [batch, output_size]
//! ```
//!
//! ## Backward Pass
//!
//! Using the chain rule:
//! ```text
//! grad_W = x^T @ grad_y
//! grad_b = sum(grad_y, axis=0)
//! grad_x = grad_y @ W^T
//! ```
//!
//! - **grad_W**: Each weight W[i,j] affects output y[*,j] through input x[*,i]
//! - **grad_b**: Each bias b[j] affects all outputs y[*,j] equally
//! - **grad_x**: Needed to backprop to the previous layer
//!
//! ## Implementation Notes
//!
//! - He initialization: W ~ N(0, 2/input_size)
//! - Bias initialized to zero
//! - Input is cached only while the layer is in training mode

use super::{Layer, LayerGradients, ParamGradients, Parameters, ParametersMut};
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Linear layer (fully connected)
pub struct LinearLayer {
    pub weights: Tensor,
    pub bias: Tensor,
    input_size: usize,
    output_size: usize,
    last_input: Option<Tensor>,
    training: bool,
}

impl LinearLayer {
    /// Create a new linear layer with He initialization
    ///
    /// # Arguments
    ///
    /// * `input_size` - Input dimension
    /// * `output_size` - Output dimension
    /// * `rng` - Source of randomness for the weight draw
    ///
    /// Weights are drawn once from N(0, σ²) with σ = √(2/input_size).
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "linear layer dimensions must be positive, got {} -> {}",
                input_size, output_size
            )));
        }

        let std_dev = (2.0 / input_size as f64).sqrt();
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| Error::InvalidConfig(format!("weight distribution: {}", e)))?;
        let weights = (0..input_size * output_size)
            .map(|_| normal.sample(rng))
            .collect();

        Ok(Self::from_parameters(
            Tensor::new(weights, vec![input_size, output_size]),
            Tensor::zeros(vec![1, output_size]),
        ))
    }

    /// Build a layer around existing parameters (used when loading checkpoints)
    ///
    /// # Panics
    ///
    /// Panics if `weights` is not `[in, out]` or `bias` is not `[1, out]`.
    pub fn from_parameters(weights: Tensor, bias: Tensor) -> Self {
        assert_eq!(weights.shape.len(), 2, "Weights must be a matrix");
        let (input_size, output_size) = (weights.shape[0], weights.shape[1]);
        assert_eq!(
            bias.shape,
            vec![1, output_size],
            "Bias shape must be [1, {}]",
            output_size
        );
        Self {
            weights,
            bias,
            input_size,
            output_size,
            last_input: None,
            training: false,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// The input cached by the last training-mode forward, if any
    pub fn last_input(&self) -> Option<&Tensor> {
        self.last_input.as_ref()
    }
}

impl Layer for LinearLayer {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn forward(&mut self, x: &Tensor) -> Tensor {
        if self.training {
            self.last_input = Some(x.clone());
        }
        x.matmul(&self.weights).add(&self.bias)
    }

    fn backward(&self, grad_y: &Tensor) -> Result<LayerGradients> {
        let x = self
            .last_input
            .as_ref()
            .ok_or(Error::NoCachedInput { layer: self.name() })?;

        let grad_bias = grad_y.sum_rows();
        let grad_weight = x.transpose().matmul(grad_y);
        let grad_x = grad_y.matmul(&self.weights.transpose());

        Ok(LayerGradients {
            input: grad_x,
            params: Some(ParamGradients {
                weight: grad_weight,
                bias: grad_bias,
            }),
        })
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn parameters(&self) -> Option<Parameters<'_>> {
        Some(Parameters {
            weight: &self.weights,
            bias: &self.bias,
        })
    }

    fn parameters_mut(&mut self) -> Option<ParametersMut<'_>> {
        Some(ParametersMut {
            weight: &mut self.weights,
            bias: &mut self.bias,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Scalar objective L = sum(y * r), so dL/dy = r
    fn objective(layer: &mut LinearLayer, x: &Tensor, r: &Tensor) -> f64 {
        let y = layer.forward(x);
        y.data.iter().zip(&r.data).map(|(a, b)| a * b).sum()
    }

    fn random_tensor(rng: &mut StdRng, shape: Vec<usize>) -> Tensor {
        let size = shape.iter().product();
        Tensor::new((0..size).map(|_| rng.gen_range(-1.0..1.0)).collect(), shape)
    }

    #[test]
    fn test_forward_shape_and_bias_broadcast() {
        let mut layer = LinearLayer::from_parameters(
            Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]),
            Tensor::new(vec![0.5, -0.5], vec![1, 2]),
        );
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let y = layer.forward(&x);
        assert_eq!(y.shape, vec![2, 2]);
        assert_eq!(y.data, vec![4.5, 4.5, 10.5, 10.5]);
    }

    #[test]
    fn test_he_initialization() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = LinearLayer::new(200, 100, &mut rng).unwrap();

        assert!(layer.bias.data.iter().all(|&b| b == 0.0));
        assert_eq!(layer.bias.shape, vec![1, 100]);

        let n = layer.weights.data.len() as f64;
        let mean = layer.weights.data.iter().sum::<f64>() / n;
        let var = layer.weights.data.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;
        // σ² = 2/200 = 0.01
        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.005);
        assert_abs_diff_eq!(var, 0.01, epsilon = 0.001);
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            LinearLayer::new(0, 4, &mut rng),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_backward_without_training_forward_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = LinearLayer::new(3, 2, &mut rng).unwrap();
        let x = Tensor::zeros(vec![4, 3]);

        // Eval-mode forward does not cache
        layer.forward(&x);
        assert!(layer.last_input().is_none());
        let err = layer.backward(&Tensor::zeros(vec![4, 2])).err();
        assert!(matches!(err, Some(Error::NoCachedInput { layer: "linear" })));

        layer.set_training(true);
        layer.forward(&x);
        assert!(layer.last_input().is_some());
        assert!(layer.backward(&Tensor::zeros(vec![4, 2])).is_ok());
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut layer = LinearLayer::new(4, 3, &mut rng).unwrap();
        layer.bias = random_tensor(&mut rng, vec![1, 3]);
        layer.set_training(true);

        let x = random_tensor(&mut rng, vec![5, 4]);
        let r = random_tensor(&mut rng, vec![5, 3]);

        layer.forward(&x);
        let grads = layer.backward(&r).unwrap();
        let params = grads.params.unwrap();
        assert_eq!(grads.input.shape, vec![5, 4]);
        assert_eq!(params.weight.shape, vec![4, 3]);
        assert_eq!(params.bias.shape, vec![1, 3]);

        let h = 1e-6;

        for i in 0..layer.weights.data.len() {
            let orig = layer.weights.data[i];
            layer.weights.data[i] = orig + h;
            let plus = objective(&mut layer, &x, &r);
            layer.weights.data[i] = orig - h;
            let minus = objective(&mut layer, &x, &r);
            layer.weights.data[i] = orig;
            assert_abs_diff_eq!(params.weight.data[i], (plus - minus) / (2.0 * h), epsilon = 1e-5);
        }

        for i in 0..layer.bias.data.len() {
            let orig = layer.bias.data[i];
            layer.bias.data[i] = orig + h;
            let plus = objective(&mut layer, &x, &r);
            layer.bias.data[i] = orig - h;
            let minus = objective(&mut layer, &x, &r);
            layer.bias.data[i] = orig;
            assert_abs_diff_eq!(params.bias.data[i], (plus - minus) / (2.0 * h), epsilon = 1e-5);
        }

        let mut x_probe = x.clone();
        for i in 0..x.data.len() {
            x_probe.data[i] = x.data[i] + h;
            let plus = objective(&mut layer, &x_probe, &r);
            x_probe.data[i] = x.data[i] - h;
            let minus = objective(&mut layer, &x_probe, &r);
            x_probe.data[i] = x.data[i];
            assert_abs_diff_eq!(grads.input.data[i], (plus - minus) / (2.0 * h), epsilon = 1e-5);
        }
    }
}
