use log::{info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result, SplitError};
use crate::manifest::{CLASS_INDICES_FILE, DATASET_INFO_FILE};
use crate::types::{OutputDirs, Split};
use crate::utils::{create_output_directory, remove_path};

pub const STAGING_DIR: &str = ".food-splitter-staging";
pub const PREVIOUS_DIR: &str = ".food-splitter-previous";

/// Entries of the destination root owned by the splitter. Anything else in
/// the destination is left alone.
pub const PUBLISHED_ENTRIES: &[&str] = &[
    "train",
    "validation",
    "test",
    CLASS_INDICES_FILE,
    DATASET_INFO_FILE,
];

/// Reject destinations that would overwrite or be scanned as the source.
pub fn check_paths(source_dir: &Path, destination_root: &Path) -> Result<()> {
    let source = normalize(source_dir);
    let destination = normalize(destination_root);

    if destination.starts_with(&source) {
        return Err(SplitError::InvalidConfiguration(format!(
            "destination {} must not be inside source {}",
            destination_root.display(),
            source_dir.display()
        )));
    }
    for entry in PUBLISHED_ENTRIES {
        if source.starts_with(destination.join(entry)) {
            return Err(SplitError::InvalidConfiguration(format!(
                "source {} lies inside output entry {} and would be replaced",
                source_dir.display(),
                destination.join(entry).display()
            )));
        }
    }
    Ok(())
}

// Absolute, symlink-resolved form of a path that may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    if let Ok(canonical) = fs::canonicalize(&absolute) {
        return canonical;
    }
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => normalize(parent).join(name),
        _ => absolute,
    }
}

/// Create a fresh staging tree with one directory per split and category.
pub fn setup_output_directories(destination_root: &Path, classes: &[String]) -> Result<OutputDirs> {
    fs::create_dir_all(destination_root)
        .io_context(|| format!("failed to create {}", destination_root.display()))?;

    let staging = create_output_directory(&destination_root.join(STAGING_DIR))
        .io_context(|| "failed to prepare the staging directory".to_string())?;
    let output_dirs = OutputDirs {
        root: destination_root.to_path_buf(),
        staging,
        previous: destination_root.join(PREVIOUS_DIR),
    };

    for split in Split::ALL {
        let split_dir = output_dirs.staged_split_dir(split);
        fs::create_dir_all(&split_dir)
            .io_context(|| format!("failed to create {}", split_dir.display()))?;
        for class in classes {
            let dir = split_dir.join(class);
            fs::create_dir(&dir).io_context(|| format!("failed to create {}", dir.display()))?;
        }
    }

    Ok(output_dirs)
}

/// Swap the staged entries into the destination root.
///
/// Existing entries are parked in the previous-run directory first, so the
/// only window where a reader sees a mix is between individual renames.
/// On failure the run is rolled back with [`rollback_publish`].
pub fn publish_outputs(output_dirs: &OutputDirs) -> Result<()> {
    let previous = create_output_directory(&output_dirs.previous)
        .io_context(|| "failed to prepare the previous-run directory".to_string())?;

    let mut parked = Vec::new();
    for entry in PUBLISHED_ENTRIES {
        let target = output_dirs.root.join(entry);
        if fs::symlink_metadata(&target).is_ok() {
            if let Err(source) = fs::rename(&target, previous.join(entry)) {
                rollback_publish(output_dirs, &parked, &[]);
                return Err(SplitError::Io {
                    context: format!("failed to move aside {}", target.display()),
                    source,
                });
            }
            parked.push(*entry);
        }
    }

    let mut published = Vec::new();
    for entry in PUBLISHED_ENTRIES {
        let staged = output_dirs.staging.join(entry);
        if fs::symlink_metadata(&staged).is_err() {
            continue;
        }
        let target = output_dirs.root.join(entry);
        if let Err(source) = fs::rename(&staged, &target) {
            rollback_publish(output_dirs, &parked, &published);
            return Err(SplitError::Io {
                context: format!("failed to publish {}", target.display()),
                source,
            });
        }
        published.push(*entry);
    }

    remove_path(&output_dirs.previous)
        .io_context(|| format!("failed to remove {}", output_dirs.previous.display()))?;
    remove_path(&output_dirs.staging)
        .io_context(|| format!("failed to remove {}", output_dirs.staging.display()))?;
    info!("Published splits to {}", output_dirs.root.display());
    Ok(())
}

/// Undo a partial publish: drop the `published` entries from the destination
/// root and move the `parked` ones back from the previous-run directory.
///
/// Best effort. An entry that cannot be restored is logged and left as is,
/// so the destination may still be a mix of both runs afterwards.
pub fn rollback_publish(output_dirs: &OutputDirs, parked: &[&str], published: &[&str]) {
    for entry in published {
        let target = output_dirs.root.join(entry);
        if let Err(e) = remove_path(&target) {
            warn!("Failed to withdraw {}: {}", target.display(), e);
        }
    }
    for entry in parked {
        let target = output_dirs.root.join(entry);
        if let Err(e) = remove_path(&target)
            .and_then(|_| fs::rename(output_dirs.previous.join(entry), &target))
        {
            warn!("Failed to restore {}: {}", target.display(), e);
        }
    }
    if let Err(e) = remove_path(&output_dirs.previous) {
        warn!(
            "Failed to remove {}: {}",
            output_dirs.previous.display(),
            e
        );
    }
}

/// Remove a staging tree left behind by an interrupted run.
pub fn discard_staging(output_dirs: &OutputDirs) {
    if let Err(e) = remove_path(&output_dirs.staging) {
        warn!(
            "Failed to remove staging directory {}: {}",
            output_dirs.staging.display(),
            e
        );
    }
}
