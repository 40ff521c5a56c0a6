use indicatif::ProgressBar;
use log::error;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fs::copy;
use std::path::PathBuf;

use crate::types::{FileCopyFailure, OutputDirs, Split, SplitAssignment};

/// One source image and where it lands in the staged tree.
#[derive(Debug, Clone)]
pub struct CopyJob {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Copy jobs for `split`, in category order then shuffled order.
pub fn copy_jobs_for_split(
    assignments: &[SplitAssignment],
    split: Split,
    output_dirs: &OutputDirs,
) -> Vec<CopyJob> {
    assignments
        .iter()
        .flat_map(|assignment| {
            let category_dir = output_dirs.staged_category_dir(split, &assignment.category);
            assignment
                .records(split)
                .iter()
                .map(move |record| CopyJob {
                    source: record.path.clone(),
                    destination: category_dir.join(record.file_name()),
                })
        })
        .collect()
}

/// Copy a batch of files on `pool`. Failures are logged and returned in job
/// order; they never stop the batch.
pub fn copy_files_in_parallel(
    jobs: &[CopyJob],
    pool: &ThreadPool,
    pb: &ProgressBar,
) -> Vec<FileCopyFailure> {
    pool.install(|| {
        jobs.par_iter()
            .filter_map(|job| {
                let outcome = copy_file(job);
                pb.inc(1);
                outcome.err()
            })
            .collect()
    })
}

/// Copy a single file, keeping its name.
pub fn copy_file(job: &CopyJob) -> Result<(), FileCopyFailure> {
    copy(&job.source, &job.destination).map(|_| ()).map_err(|e| {
        error!(
            "Failed to copy {} to {}: {}",
            job.source.display(),
            job.destination.display(),
            e
        );
        FileCopyFailure {
            source: job.source.clone(),
            destination: job.destination.clone(),
            reason: e.to_string(),
        }
    })
}
