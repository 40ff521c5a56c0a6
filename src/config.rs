use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Result;
use crate::types::SplitRatios;

/// Split a folder-per-class image dataset into train/validation/test trees.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing one sub-directory of images per category
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    /// Directory that receives train/, validation/, test/ and the manifest
    #[arg(short = 'd', long = "destination")]
    pub destination: PathBuf,

    /// Proportion of each category used for training
    #[arg(long = "train-ratio", default_value_t = 0.7, value_parser = validate_ratio)]
    pub train_ratio: f64,

    /// Proportion of each category used for validation
    #[arg(long = "val-ratio", default_value_t = 0.2, value_parser = validate_ratio)]
    pub val_ratio: f64,

    /// Proportion of each category used for testing
    #[arg(long = "test-ratio", default_value_t = 0.1, value_parser = validate_ratio)]
    pub test_ratio: f64,

    /// Categories with fewer images than this are left out entirely
    #[arg(long = "min-samples", default_value_t = 10)]
    pub min_samples: usize,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Number of copy workers (0 = one per core)
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,

    /// Scan and plan the split without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl Args {
    /// Validate the ratio triple and build the library-level configuration.
    pub fn to_split_config(&self) -> Result<SplitConfig> {
        Ok(SplitConfig {
            ratios: SplitRatios::new(self.train_ratio, self.val_ratio, self.test_ratio)?,
            min_samples: self.min_samples,
            seed: self.seed,
            workers: self.workers,
            dry_run: self.dry_run,
        })
    }
}

/// Settings for one `prepare_splits` run.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub ratios: SplitRatios,
    pub min_samples: usize,
    pub seed: u64,
    pub workers: usize,
    pub dry_run: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ratios: SplitRatios::default(),
            min_samples: 10,
            seed: 42,
            workers: 0,
            dry_run: false,
        }
    }
}

// Validate that a single ratio is between 0.0 and 1.0
pub fn validate_ratio(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}
