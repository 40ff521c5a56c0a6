use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Per-category exclusions and per-file copy failures are not
/// errors; they are reported through [`crate::types::SplitSummary`].
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("path not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no category has at least {min_samples} images ({scanned} scanned)")]
    EmptyResult { min_samples: usize, scanned: usize },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("manifest JSON error: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SplitError>;

pub(crate) trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        self.map_err(|source| SplitError::Io {
            context: context(),
            source,
        })
    }
}
