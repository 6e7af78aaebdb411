use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the host collaborators.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot spawn {}: {source}", image.display())]
    Spawn { image: PathBuf, source: io::Error },

    #[error("waiting for {image} failed: {source}")]
    Wait { image: String, source: io::Error },

    #[error("{}: {source}", path.display())]
    Fs { path: PathBuf, source: io::Error },

    #[error("{} is not inside {}", name.display(), dir.display())]
    OutsideDir { name: PathBuf, dir: PathBuf },

    #[error("allocation tracker command failed: {0}")]
    Tracker(io::Error),

    #[error("no allocation tracker is configured")]
    NoTracker,

    #[error("writing console output failed: {0}")]
    Output(#[from] io::Error),
}

pub type HostResult<T> = Result<T, HostError>;
