//! Folder-per-class image dataset splitter
//!
//! This library turns `source/<category>/<image>` into reproducible
//! `train/`, `validation/` and `test/` trees plus a `class_indices.json`
//! manifest for classifier training.

pub mod config;
pub mod copy;
pub mod dataset;
pub mod error;
pub mod io;
pub mod manifest;
pub mod pipeline;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, SplitConfig};
pub use dataset::{analyze_dataset, filter_categories, plan_splits, scan_categories, split_category};
pub use error::{Result, SplitError};
pub use manifest::{ClassManifest, DatasetInfo, CLASS_INDICES_FILE, DATASET_INFO_FILE};
pub use pipeline::prepare_splits;
pub use types::{
    Category, DatasetStats, ExcludedCategory, FileCopyFailure, ImageRecord, Split,
    SplitAssignment, SplitCounts, SplitRatios, SplitSummary,
};
