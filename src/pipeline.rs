use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::SplitConfig;
use crate::copy::{copy_files_in_parallel, copy_jobs_for_split};
use crate::dataset::{filter_categories, plan_splits, scan_categories, stats_for};
use crate::error::{Result, SplitError};
use crate::io::{check_paths, discard_staging, publish_outputs, setup_output_directories};
use crate::manifest::{ClassManifest, DatasetInfo, CLASS_INDICES_FILE, DATASET_INFO_FILE};
use crate::types::{OutputDirs, Split, SplitAssignment, SplitRatios, SplitSummary};
use crate::utils::{create_io_thread_pool, create_progress_bar};

/// Split `source_dir` into `destination_root/{train,validation,test}` plus
/// `class_indices.json` and `dataset_info.json`.
///
/// Configuration problems, a missing source and an empty result are all
/// detected before anything is written. Per-file copy failures do not stop
/// the run and are listed in the returned summary.
pub fn prepare_splits(
    source_dir: &Path,
    destination_root: &Path,
    config: &SplitConfig,
) -> Result<SplitSummary> {
    let ratios = SplitRatios::new(
        config.ratios.train,
        config.ratios.validation,
        config.ratios.test,
    )?;
    if !source_dir.is_dir() {
        return Err(SplitError::NotFound {
            path: source_dir.to_path_buf(),
        });
    }
    check_paths(source_dir, destination_root)?;

    info!("Scanning {}...", source_dir.display());
    let categories = scan_categories(source_dir)?;
    stats_for(&categories).print_summary();

    let scanned = categories.len();
    let (retained, excluded) = filter_categories(categories, config.min_samples);
    if retained.is_empty() {
        return Err(SplitError::EmptyResult {
            min_samples: config.min_samples,
            scanned,
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let assignments = plan_splits(&retained, &ratios, &mut rng);
    let manifest = ClassManifest::from_categories(assignments.iter().map(|a| a.category.clone()));
    let counts: BTreeMap<_, _> = assignments
        .iter()
        .map(|a| (a.category.clone(), a.counts()))
        .collect();

    let mut summary = SplitSummary {
        counts,
        excluded,
        skipped_files: Vec::new(),
        manifest,
        dry_run: config.dry_run,
    };
    if config.dry_run {
        return Ok(summary);
    }

    let output_dirs = setup_output_directories(destination_root, &summary.manifest.classes)?;
    if let Err(e) = stage_outputs(&output_dirs, &assignments, &mut summary, &ratios, config) {
        discard_staging(&output_dirs);
        return Err(e);
    }
    if let Err(e) = publish_outputs(&output_dirs) {
        discard_staging(&output_dirs);
        return Err(e);
    }

    Ok(summary)
}

fn stage_outputs(
    output_dirs: &OutputDirs,
    assignments: &[SplitAssignment],
    summary: &mut SplitSummary,
    ratios: &SplitRatios,
    config: &SplitConfig,
) -> Result<()> {
    let pool = create_io_thread_pool(config.workers).map_err(|e| {
        SplitError::InvalidConfiguration(format!(
            "cannot start {} copy workers: {}",
            config.workers, e
        ))
    })?;

    for split in Split::ALL {
        let jobs = copy_jobs_for_split(assignments, split, output_dirs);
        if jobs.is_empty() {
            continue;
        }
        let label = match split {
            Split::Train => "Train",
            Split::Validation => "Validation",
            Split::Test => "Test",
        };
        let pb = create_progress_bar(jobs.len() as u64, label);
        summary
            .skipped_files
            .extend(copy_files_in_parallel(&jobs, &pool, &pb));
        pb.finish_with_message(format!("{} copy complete", label));
    }

    summary
        .manifest
        .write(&output_dirs.staging.join(CLASS_INDICES_FILE))?;
    DatasetInfo::new(
        &summary.manifest,
        &summary.counts,
        &summary.excluded,
        *ratios,
        config.seed,
        config.min_samples,
    )
    .write(&output_dirs.staging.join(DATASET_INFO_FILE))?;

    Ok(())
}
