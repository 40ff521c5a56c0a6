//! Manifest files written next to the split trees.
//!
//! `class_indices.json` is the category -> index mapping consumed by the
//! training and model-conversion steps. `dataset_info.json` records how the
//! split was produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{IoContext, Result};
use crate::types::{ExcludedCategory, Split, SplitCounts, SplitRatios};

pub const CLASS_INDICES_FILE: &str = "class_indices.json";
pub const DATASET_INFO_FILE: &str = "dataset_info.json";

/// Sorted category names and their contiguous indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassManifest {
    pub classes: Vec<String>,
    pub num_classes: usize,
    pub class_to_idx: BTreeMap<String, usize>,
}

impl ClassManifest {
    /// Build a manifest from retained category names in any order.
    pub fn from_categories<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = names.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();

        let class_to_idx = classes
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        Self {
            num_classes: classes.len(),
            classes,
            class_to_idx,
        }
    }

    pub fn index_of(&self, class: &str) -> Option<usize> {
        self.class_to_idx.get(class).copied()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_pretty_json(path, self)
    }

    /// Read a manifest produced by an earlier run.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).io_context(|| format!("failed to open {}", path.display()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Provenance of a split run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub classes: Vec<String>,
    pub num_classes: usize,
    pub splits: Vec<Split>,
    pub seed: u64,
    pub ratios: SplitRatios,
    pub min_samples: usize,
    pub counts: BTreeMap<String, SplitCounts>,
    pub excluded: BTreeMap<String, usize>,
}

impl DatasetInfo {
    pub fn new(
        manifest: &ClassManifest,
        counts: &BTreeMap<String, SplitCounts>,
        excluded: &[ExcludedCategory],
        ratios: SplitRatios,
        seed: u64,
        min_samples: usize,
    ) -> Self {
        Self {
            classes: manifest.classes.clone(),
            num_classes: manifest.num_classes,
            splits: Split::ALL.to_vec(),
            seed,
            ratios,
            min_samples,
            counts: counts.clone(),
            excluded: excluded
                .iter()
                .map(|e| (e.name.clone(), e.count))
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_pretty_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).io_context(|| format!("failed to open {}", path.display()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).io_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .io_context(|| format!("failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
