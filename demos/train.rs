//! Train an MLP Classifier from the Command Line
//!
//! Runs the reference experiment by default: a `[10, 10, 8, 8, 4]` network
//! trained on 100 random samples for 1100 epochs, printing the averaged loss
//! every 4 steps.
//!
//! ## Usage
//!
//! ```bash
//! # Reference experiment
//! cargo run --release --example train
//!
//! # Learnable data, shorter run, CSV log and checkpoint
//! cargo run --release --example train -- --dataset blobs --epochs 300 \
//!     --log-csv loss.csv --save model.ckpt
//!
//! # Start from a JSON config and override a field
//! cargo run --release --example train -- --config run.json --lr 0.05
//!
//! # More detail (per-epoch progress)
//! RUST_LOG=debug cargo run --release --example train -- --epochs 5
//! ```

use clap::{Parser, ValueEnum};
use handprop::{checkpoint, train_with_logger, Dataset, TrainingConfig, TrainingLogger};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DatasetKind {
    /// Standard-normal inputs, uniformly random labels
    Random,
    /// One Gaussian cluster per class
    Blobs,
}

#[derive(Parser)]
#[command(
    name = "train",
    about = "Train a multilayer perceptron with hand-derived backpropagation"
)]
struct Args {
    /// JSON training configuration (flags below override its fields)
    #[arg(long)]
    config: Option<String>,

    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Rows per mini-batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Report the averaged loss every N steps
    #[arg(long)]
    report_every: Option<usize>,

    /// Seed for initialization, data generation and shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated layer widths, e.g. 10,10,8,8,4
    #[arg(long, value_delimiter = ',')]
    layers: Option<Vec<usize>>,

    /// Clamp true-class probabilities to at least this value before the log
    #[arg(long)]
    probability_floor: Option<f64>,

    /// Synthetic dataset to train on
    #[arg(long, value_enum, default_value = "random")]
    dataset: DatasetKind,

    /// Number of samples to generate
    #[arg(long, default_value = "100")]
    samples: usize,

    /// Write loss samples to this CSV file
    #[arg(long)]
    log_csv: Option<String>,

    /// Save the trained parameters to this checkpoint file
    #[arg(long)]
    save: Option<String>,

    /// Don't log the final parameters
    #[arg(long)]
    quiet_params: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // ========================================================================
    // Resolve configuration from file + CLI overrides
    // ========================================================================
    let mut config = match args.config {
        Some(ref path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(lr) = args.lr {
        config.learning_rate = lr;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(interval) = args.report_every {
        config.reporting_interval = interval;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(layers) = args.layers {
        config.layer_sizes = layers;
    }
    if args.probability_floor.is_some() {
        config.probability_floor = args.probability_floor;
    }
    if args.quiet_params {
        config.dump_parameters = false;
    }
    config.validate()?;

    let features = config.layer_sizes[0];
    let classes = config.layer_sizes[config.layer_sizes.len() - 1];

    println!("\n{}", "=".repeat(70));
    println!("  Training MLP {:?}", config.layer_sizes);
    println!("{}", "=".repeat(70));
    println!();

    // ========================================================================
    // 1. Data
    // ========================================================================
    let dataset = match args.dataset {
        DatasetKind::Random => Dataset::random(args.samples, features, classes, config.seed)?,
        DatasetKind::Blobs => {
            Dataset::gaussian_blobs(args.samples, features, classes, 0.5, config.seed)?
        }
    };
    println!(
        "Dataset: {:?}, {} samples, {} features, {} classes",
        args.dataset,
        dataset.len(),
        dataset.num_features(),
        classes
    );

    // ========================================================================
    // 2. Model
    // ========================================================================
    let mut mlp = config.build_model(config.seed)?;
    println!("Parameters: {}", mlp.num_parameters());
    println!(
        "Epochs: {}, learning rate: {}, batch size: {}, report every {} steps",
        config.epochs, config.learning_rate, config.batch_size, config.reporting_interval
    );
    println!();

    // ========================================================================
    // 3. Train
    // ========================================================================
    let mut logger = match args.log_csv {
        Some(ref path) => Some(TrainingLogger::new(path)?),
        None => None,
    };
    let report = train_with_logger(&mut mlp, &dataset, &config, logger.as_mut())?;

    // ========================================================================
    // 4. Summary
    // ========================================================================
    let history = report.loss_history();
    println!("\n{}", "=".repeat(70));
    println!("Steps: {}", report.steps);
    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        println!("Average loss: {:.4} -> {:.4}", first, last);
    }
    println!("Training accuracy: {:.1}%", mlp.accuracy(&dataset)? * 100.0);

    if let Some(ref path) = args.save {
        checkpoint::save(&mlp, path)?;
        println!("Saved checkpoint: {}", path);
    }
    if let Some(ref path) = args.log_csv {
        println!("Loss log: {}", path);
    }

    Ok(())
}
