//! Training Logger
//!
//! Writes averaged-loss samples to a CSV file so loss curves can be plotted
//! after (or during) a run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use handprop::{LossSample, TrainingLogger};
//!
//! let mut logger = TrainingLogger::new("training_log.csv")?;
//! logger.log(&LossSample { step: 4, epoch: 0, average_loss: 1.38 }, 1e-2)?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ## CSV Format
//!
//! - `step`: Global step that closed the reporting window
//! - `epoch`: Epoch of that step
//! - `elapsed_seconds`: Time since the logger was created
//! - `learning_rate`: Step size in use
//! - `average_loss`: Mean loss over the window

use crate::train::LossSample;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// CSV sink for loss telemetry
pub struct TrainingLogger {
    log_file: BufWriter<File>,
    start_time: Instant,
}

impl TrainingLogger {
    /// Create the CSV file and write its header
    pub fn new<P: AsRef<Path>>(log_path: P) -> std::io::Result<Self> {
        let mut log_file = BufWriter::new(File::create(log_path)?);
        writeln!(log_file, "step,epoch,elapsed_seconds,learning_rate,average_loss")?;
        log_file.flush()?;

        Ok(Self {
            log_file,
            start_time: Instant::now(),
        })
    }

    /// Append one sample and flush, so a crashed run keeps its history
    pub fn log(&mut self, sample: &LossSample, learning_rate: f64) -> std::io::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        writeln!(
            self.log_file,
            "{},{},{:.3},{},{:.6}",
            sample.step, sample.epoch, elapsed, learning_rate, sample.average_loss
        )?;
        self.log_file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_header_and_rows() {
        let path = std::env::temp_dir().join(format!("handprop_log_{}.csv", std::process::id()));
        {
            let mut logger = TrainingLogger::new(&path).unwrap();
            logger
                .log(&LossSample { step: 4, epoch: 0, average_loss: 1.25 }, 0.01)
                .unwrap();
            logger
                .log(&LossSample { step: 8, epoch: 1, average_loss: 0.5 }, 0.01)
                .unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "step,epoch,elapsed_seconds,learning_rate,average_loss");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("4,0,"));
        assert!(lines[1].ends_with(",0.01,1.250000"));
        assert!(lines[2].ends_with(",0.01,0.500000"));
    }
}
