use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Result, SplitError};
use crate::manifest::ClassManifest;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Whether `path` carries one of the supported image extensions (any case).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

const RATIO_SUM_TOLERANCE: f64 = 1e-6;
// Absorbs float noise such as 10 * (0.7 + 0.2) == 8.999999999999998.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// One of the three output partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Train/validation/test proportions. Always non-negative and summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            validation: 0.2,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, validation: f64, test: f64) -> Result<Self> {
        for (name, value) in [("train", train), ("validation", validation), ("test", test)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SplitError::InvalidConfiguration(format!(
                    "{} ratio must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        let sum = train + validation + test;
        if (sum - 1.0).abs() > RATIO_SUM_TOLERANCE {
            return Err(SplitError::InvalidConfiguration(format!(
                "ratios must sum to 1.0, got {} + {} + {} = {}",
                train, validation, test, sum
            )));
        }
        Ok(Self {
            train,
            validation,
            test,
        })
    }

    /// Cut points into a shuffled list of `count` items.
    ///
    /// Returns `(floor(count * train), floor(count * (train + validation)))`.
    /// Everything past the second cut is test, so the test split absorbs the
    /// rounding remainder and may be empty for small categories.
    ///
    /// Both cuts are floored on the cumulative ratio, so the validation size
    /// is `floor(count * (train + validation)) - floor(count * train)`, which
    /// can be one more than `floor(count * validation)`: 5 items at
    /// 0.5/0.3/0.2 give 2/2/1, not 2/1/2. A zero test ratio therefore always
    /// leaves test empty (12 items at 0.8/0.2/0.0 give 9/3/0).
    pub fn boundaries(&self, count: usize) -> (usize, usize) {
        let n = count as f64;
        let cut = |ratio: f64| ((n * ratio + BOUNDARY_EPSILON).floor() as usize).min(count);
        let train_end = cut(self.train);
        let val_end = cut(self.train + self.validation).max(train_end);
        (train_end, val_end)
    }
}

/// A reference to one source image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub category: String,
}

impl ImageRecord {
    /// The original file name, kept unchanged in the output tree.
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

/// A class of food, discovered from one source sub-directory.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub images: Vec<ImageRecord>,
}

impl Category {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// The three disjoint partitions of one category's images.
#[derive(Debug, Clone)]
pub struct SplitAssignment {
    pub category: String,
    pub train: Vec<ImageRecord>,
    pub validation: Vec<ImageRecord>,
    pub test: Vec<ImageRecord>,
}

impl SplitAssignment {
    pub fn records(&self, split: Split) -> &[ImageRecord] {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn counts(&self) -> SplitCounts {
        SplitCounts {
            train: self.train.len(),
            validation: self.validation.len(),
            test: self.test.len(),
        }
    }
}

/// Number of images per split for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

/// A category dropped for having fewer than `min_samples` images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedCategory {
    pub name: String,
    pub count: usize,
}

/// A file that could not be copied into its split.
#[derive(Debug, Clone)]
pub struct FileCopyFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

// Struct to hold the outcome of a split run
#[derive(Debug, Clone)]
pub struct SplitSummary {
    pub counts: BTreeMap<String, SplitCounts>,
    pub excluded: Vec<ExcludedCategory>,
    pub skipped_files: Vec<FileCopyFailure>,
    pub manifest: ClassManifest,
    pub dry_run: bool,
}

impl SplitSummary {
    pub fn split_total(&self, split: Split) -> usize {
        self.counts
            .values()
            .map(|c| match split {
                Split::Train => c.train,
                Split::Validation => c.validation,
                Split::Test => c.test,
            })
            .sum()
    }

    pub fn print_summary(&self) {
        log::info!("=== Split Summary ===");
        for (name, c) in &self.counts {
            log::info!(
                "{}: {} train, {} validation, {} test",
                name,
                c.train,
                c.validation,
                c.test
            );
        }
        log::info!("Classes retained: {}", self.manifest.num_classes);
        log::info!(
            "Images: {} train, {} validation, {} test",
            self.split_total(Split::Train),
            self.split_total(Split::Validation),
            self.split_total(Split::Test)
        );

        if !self.excluded.is_empty() {
            let names: Vec<String> = self
                .excluded
                .iter()
                .map(|e| format!("{} ({})", e.name, e.count))
                .collect();
            log::warn!(
                "Excluded {} categories: {}",
                self.excluded.len(),
                names.join(", ")
            );
        }
        if !self.skipped_files.is_empty() {
            log::warn!("Skipped {} files that failed to copy", self.skipped_files.len());
        }
        if self.dry_run {
            log::info!("Dry run: nothing was written.");
        }
    }
}

/// Image counts of a source tree, before any filtering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetStats {
    pub category_counts: BTreeMap<String, usize>,
    pub total_images: usize,
}

impl DatasetStats {
    pub fn num_categories(&self) -> usize {
        self.category_counts.len()
    }

    pub fn average_per_category(&self) -> f64 {
        if self.category_counts.is_empty() {
            0.0
        } else {
            self.total_images as f64 / self.category_counts.len() as f64
        }
    }

    pub fn smallest(&self) -> Option<(&str, usize)> {
        self.category_counts
            .iter()
            .min_by_key(|(_, count)| **count)
            .map(|(name, count)| (name.as_str(), *count))
    }

    pub fn largest(&self) -> Option<(&str, usize)> {
        self.category_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(name, count)| (name.as_str(), *count))
    }

    pub fn print_summary(&self) {
        log::info!("=== Dataset Statistics ===");
        log::info!("Total categories: {}", self.num_categories());
        log::info!("Total images: {}", self.total_images);
        log::info!("Average images per category: {:.1}", self.average_per_category());
        if let (Some((min_name, min)), Some((max_name, max))) = (self.smallest(), self.largest()) {
            log::info!("Smallest category: {} ({} images)", min_name, min);
            log::info!("Largest category: {} ({} images)", max_name, max);
        }
        for (name, count) in &self.category_counts {
            log::debug!("  {}: {} images", name, count);
        }
    }
}

// Struct to hold the paths of the output tree and its staging area
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub staging: PathBuf,
    pub previous: PathBuf,
}

impl OutputDirs {
    pub fn staged_split_dir(&self, split: Split) -> PathBuf {
        self.staging.join(split.dir_name())
    }

    pub fn staged_category_dir(&self, split: Split, category: &str) -> PathBuf {
        self.staged_split_dir(split).join(category)
    }
}
