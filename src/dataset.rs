use glob::{glob_with, MatchOptions, Pattern};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

use crate::error::{Result, SplitError};
use crate::types::{
    is_image_file, Category, DatasetStats, ExcludedCategory, ImageRecord, SplitAssignment,
    SplitRatios,
};

// `*` never matches a leading dot, so hidden entries are skipped.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// List the non-hidden children of `dir`, sorted by path.
fn list_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir_str = dir.to_str().ok_or_else(|| {
        SplitError::InvalidConfiguration(format!(
            "path is not valid UTF-8: {}",
            dir.display()
        ))
    })?;
    let escaped = Pattern::escape(dir_str);
    let pattern = format!("{}/*", escaped.trim_end_matches('/'));
    let entries = glob_with(&pattern, MATCH_OPTIONS).map_err(|e| {
        SplitError::InvalidConfiguration(format!("bad path {}: {}", dir.display(), e))
    })?;

    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .collect();
    children.sort();
    Ok(children)
}

/// Discover one category per immediate sub-directory of `source_dir`.
///
/// Each category's images are the regular files directly inside it with a
/// supported extension. Categories and images are both sorted, so discovery
/// order never depends on the filesystem.
pub fn scan_categories(source_dir: &Path) -> Result<Vec<Category>> {
    if !source_dir.is_dir() {
        return Err(SplitError::NotFound {
            path: source_dir.to_path_buf(),
        });
    }

    let mut categories = Vec::new();
    for dir in list_children(source_dir)?.into_iter().filter(|p| p.is_dir()) {
        let name = match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                warn!("Skipping category with a non UTF-8 name: {:?}", dir);
                continue;
            }
        };

        let images: Vec<ImageRecord> = list_children(&dir)?
            .into_iter()
            .filter(|p| p.is_file() && is_image_file(p))
            .map(|path| ImageRecord {
                path,
                category: name.clone(),
            })
            .collect();

        debug!("Found category {} with {} images", name, images.len());
        categories.push(Category { name, images });
    }

    Ok(categories)
}

/// Count images per category without filtering or splitting anything.
pub fn analyze_dataset(source_dir: &Path) -> Result<DatasetStats> {
    let categories = scan_categories(source_dir)?;
    Ok(stats_for(&categories))
}

pub(crate) fn stats_for(categories: &[Category]) -> DatasetStats {
    DatasetStats {
        category_counts: categories
            .iter()
            .map(|c| (c.name.clone(), c.len()))
            .collect(),
        total_images: categories.iter().map(Category::len).sum(),
    }
}

/// Separate categories with at least `min_samples` images from the rest.
pub fn filter_categories(
    categories: Vec<Category>,
    min_samples: usize,
) -> (Vec<Category>, Vec<ExcludedCategory>) {
    let mut retained = Vec::new();
    let mut excluded = Vec::new();

    for category in categories {
        if category.len() < min_samples {
            warn!(
                "Excluding category {}: only {} images (minimum {})",
                category.name,
                category.len(),
                min_samples
            );
            excluded.push(ExcludedCategory {
                name: category.name,
                count: category.images.len(),
            });
        } else {
            retained.push(category);
        }
    }

    (retained, excluded)
}

/// Shuffle one category with `rng` and cut it at the ratio boundaries.
pub fn split_category<R: Rng + ?Sized>(
    category: &Category,
    ratios: &SplitRatios,
    rng: &mut R,
) -> SplitAssignment {
    let mut images = category.images.clone();
    images.shuffle(rng);

    let (train_end, val_end) = ratios.boundaries(images.len());
    let test = images.split_off(val_end);
    let validation = images.split_off(train_end);

    SplitAssignment {
        category: category.name.clone(),
        train: images,
        validation,
        test,
    }
}

/// Split every category, drawing from one RNG in sorted-name order.
pub fn plan_splits<R: Rng + ?Sized>(
    categories: &[Category],
    ratios: &SplitRatios,
    rng: &mut R,
) -> Vec<SplitAssignment> {
    let mut ordered: Vec<&Category> = categories.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    ordered
        .into_iter()
        .map(|category| split_category(category, ratios, rng))
        .collect()
}
