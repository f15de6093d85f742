//! Training Loop
//!
//! Fixed-length mini-batch SGD over an in-memory [`Dataset`]:
//!
//! ```text
//! for epoch in 0..epochs:
//!     permutation = shuffle(0..N)
//!     for batch in chunks(permutation, batch_size):     # last chunk may be short
//!         loss = mlp.train_step(batch, lr)
//!         accumulate loss
//!         every `reporting_interval` global steps:
//!             record average, reset accumulator
//! ```
//!
//! The step counter and accumulator run across epoch boundaries. Losses from a
//! trailing window shorter than `reporting_interval` are not reported.
//!
//! There is no validation split, convergence check or early stopping.
//!
//! ## Example
//!
//! ```rust
//! use handprop::{train, Dataset, Mlp, TrainingConfig};
//!
//! let config = TrainingConfig {
//!     layer_sizes: vec![4, 6, 3],
//!     epochs: 5,
//!     dump_parameters: false,
//!     ..TrainingConfig::default()
//! };
//! let data = Dataset::gaussian_blobs(30, 4, 3, 0.5, 7).unwrap();
//! let mut mlp = Mlp::new(&config.layer_sizes, config.seed).unwrap();
//!
//! let report = train(&mut mlp, &data, &config).unwrap();
//! assert_eq!(report.steps, 5 * 3);
//! ```

use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::layers::SoftmaxCrossEntropy;
use crate::mlp::{LinearParameters, Mlp};
use crate::training_logger::TrainingLogger;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Training configuration
///
/// The defaults reproduce the reference experiment: a `[10, 10, 8, 8, 4]`
/// network trained for 1100 epochs with learning rate 0.01 and batches of 10,
/// reporting the average loss every 4 steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Width chain including input and output dimensions
    pub layer_sizes: Vec<usize>,
    /// Number of passes through the dataset
    pub epochs: usize,
    /// SGD step size
    pub learning_rate: f64,
    /// Rows per mini-batch
    pub batch_size: usize,
    /// Record an averaged loss every N steps
    pub reporting_interval: usize,
    /// Seed for the per-epoch shuffles
    pub seed: u64,
    /// Clamp true-class probabilities before the log (`None` = unclamped)
    pub probability_floor: Option<f64>,
    /// Log every linear layer's parameters when training finishes
    pub dump_parameters: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![10, 10, 8, 8, 4],
            epochs: 1100,
            learning_rate: 1e-2,
            batch_size: 10,
            reporting_interval: 4,
            seed: 1,
            probability_floor: None,
            dump_parameters: true,
        }
    }
}

impl TrainingConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option is in range
    pub fn validate(&self) -> Result<()> {
        if self.layer_sizes.len() < 2 || self.layer_sizes.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "layer_sizes must list at least two positive widths, got {:?}",
                self.layer_sizes
            )));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.reporting_interval == 0 {
            return Err(Error::InvalidConfig("reporting_interval must be > 0".into()));
        }
        if let Some(floor) = self.probability_floor {
            if !(floor > 0.0 && floor < 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "probability_floor must be in (0, 1), got {}",
                    floor
                )));
            }
        }
        Ok(())
    }

    /// Loss head matching `probability_floor`
    pub fn loss_head(&self) -> SoftmaxCrossEntropy {
        SoftmaxCrossEntropy {
            probability_floor: self.probability_floor,
        }
    }

    /// Build a freshly initialized network for this configuration
    pub fn build_model(&self, init_seed: u64) -> Result<Mlp> {
        self.validate()?;
        Ok(Mlp::new(&self.layer_sizes, init_seed)?.with_loss(self.loss_head()))
    }
}

/// One averaged-loss telemetry point
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossSample {
    /// Global step at which the window closed (1-based)
    pub step: usize,
    /// Epoch the closing step belonged to (0-based)
    pub epoch: usize,
    /// Mean loss over the last `reporting_interval` steps
    pub average_loss: f64,
}

/// Outcome of a training run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: Vec<LossSample>,
    pub final_parameters: Vec<LinearParameters>,
    pub steps: usize,
    pub epochs: usize,
}

impl TrainingReport {
    /// Averaged losses in order, ready for plotting
    pub fn loss_history(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.average_loss).collect()
    }
}

/// Train `mlp` on `dataset` according to `config`
pub fn train(mlp: &mut Mlp, dataset: &Dataset, config: &TrainingConfig) -> Result<TrainingReport> {
    train_with_logger(mlp, dataset, config, None)
}

/// Train `mlp`, additionally writing every loss sample to a CSV logger
///
/// The network's loss head is replaced by the one `config` describes.
///
/// # Errors
///
/// Invalid configuration, a network whose layer chain differs from
/// `config.layer_sizes`, a dataset that doesn't fit the network, or any
/// error from a training step aborts the run.
pub fn train_with_logger(
    mlp: &mut Mlp,
    dataset: &Dataset,
    config: &TrainingConfig,
    mut logger: Option<&mut TrainingLogger>,
) -> Result<TrainingReport> {
    config.validate()?;
    if mlp.layer_sizes() != config.layer_sizes.as_slice() {
        return Err(Error::InvalidConfig(format!(
            "network has layer sizes {:?}, config expects {:?}",
            mlp.layer_sizes(),
            config.layer_sizes
        )));
    }
    check_dataset(mlp, dataset)?;
    mlp.set_loss(config.loss_head());

    tracing::info!(
        layers = ?mlp.layer_sizes(),
        parameters = mlp.num_parameters(),
        samples = dataset.len(),
        epochs = config.epochs,
        learning_rate = config.learning_rate,
        batch_size = config.batch_size,
        "starting training"
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut samples = Vec::new();
    let mut global_step = 0;
    let mut accum_loss = 0.0;

    mlp.set_training(true);
    for epoch in 0..config.epochs {
        for batch_indices in dataset.shuffled_batches(config.batch_size, &mut rng) {
            let (inputs, labels) = dataset.batch(&batch_indices);
            let loss = mlp.train_step(&inputs, &labels, config.learning_rate)?;
            global_step += 1;
            accum_loss += loss;

            if global_step % config.reporting_interval == 0 {
                let sample = LossSample {
                    step: global_step,
                    epoch,
                    average_loss: accum_loss / config.reporting_interval as f64,
                };
                accum_loss = 0.0;

                tracing::info!(
                    step = sample.step,
                    epoch = sample.epoch,
                    loss = sample.average_loss,
                    last_batch_loss = loss,
                    "training"
                );
                if let Some(logger) = logger.as_deref_mut() {
                    logger.log(&sample, config.learning_rate)?;
                }
                samples.push(sample);
            }
        }
        tracing::debug!(epoch, step = global_step, "epoch complete");
    }

    let final_parameters = mlp.linear_parameters();
    if config.dump_parameters {
        for (i, params) in final_parameters.iter().enumerate() {
            tracing::info!(layer = i, shape = ?params.weights.shape, weights = ?params.weights.data, "final weights");
            tracing::info!(layer = i, bias = ?params.bias.data, "final bias");
        }
    }

    Ok(TrainingReport {
        samples,
        final_parameters,
        steps: global_step,
        epochs: config.epochs,
    })
}

/// Verify the dataset's width and labels fit the network before any step runs
fn check_dataset(mlp: &Mlp, dataset: &Dataset) -> Result<()> {
    if dataset.is_empty() {
        return Err(Error::EmptyBatch);
    }
    if dataset.num_features() != mlp.input_size() {
        return Err(Error::ShapeMismatch {
            context: "dataset width",
            expected: mlp.input_size(),
            actual: dataset.num_features(),
        });
    }
    let num_classes = mlp.num_classes();
    if let Some((index, &label)) = dataset
        .labels()
        .iter()
        .enumerate()
        .find(|(_, &l)| l >= num_classes)
    {
        return Err(Error::LabelOutOfRange {
            index,
            label,
            num_classes,
        });
    }
    Ok(())
}
