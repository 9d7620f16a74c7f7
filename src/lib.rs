pub mod annotate;
pub mod classify;
pub mod filter;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod summary;

use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline failures. Malformed records and incomplete annotations are
/// expected data conditions and are counted/skipped, never raised as errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing input file: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("cannot derive a sample id from '{}'", .0.display())]
    BadSampleName(PathBuf),
    #[error("failed to publish {}: {}", .path.display(), .source)]
    Publish {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}
