//! Handprop: A Multilayer Perceptron with Hand-Derived Backpropagation
//!
//! A small feed-forward classifier trained with mini-batch SGD. Every
//! gradient is derived by hand and computed explicitly in each layer's
//! `backward`; there is no automatic differentiation.
//!
//! # Modules
//!
//! - [`tensor`] - Row-major f64 matrices and the operations the layers need
//! - [`layers`] - Linear, tanh and softmax cross-entropy building blocks
//! - [`mlp`] - The network: forward, backward sweep and SGD update
//! - [`optimizer`] - Plain stochastic gradient descent
//! - [`data`] - Datasets, synthetic generators and shuffled batching
//! - [`train`] - The epoch loop with periodic loss reporting
//! - [`training_logger`] - CSV loss telemetry
//! - [`checkpoint`] - Binary save/load of trained parameters
//!
//! # Example
//!
//! ```rust
//! use handprop::{train, Dataset, Mlp, TrainingConfig};
//!
//! let config = TrainingConfig {
//!     epochs: 20,
//!     dump_parameters: false,
//!     ..TrainingConfig::default()
//! };
//! let data = Dataset::gaussian_blobs(100, 10, 4, 0.5, 42).unwrap();
//! let mut mlp = Mlp::new(&config.layer_sizes, 1).unwrap();
//!
//! let report = train(&mut mlp, &data, &config).unwrap();
//! assert_eq!(report.steps, 20 * 10);
//! assert_eq!(report.samples.len(), 50);
//! ```

pub mod checkpoint;
pub mod data;
pub mod error;
pub mod layers;
pub mod mlp;
pub mod optimizer;
pub mod tensor;
pub mod train;
pub mod training_logger;

// Re-export main types for convenience
pub use data::Dataset;
pub use error::{Error, Result};
pub use layers::{Layer, LinearLayer, LossOutput, ParamGradients, SoftmaxCrossEntropy, TanhLayer};
pub use mlp::{LinearParameters, Mlp, MlpGradients};
pub use tensor::Tensor;
pub use train::{train, train_with_logger, LossSample, TrainingConfig, TrainingReport};
pub use training_logger::TrainingLogger;
