use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where test images live and how they are run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Directory holding the program images.
    pub bin_dir: PathBuf,
    /// Scratch directory handed to children as `tmpdir`.
    pub tmp_dir: PathBuf,
    /// Command file of the allocation tracker, if the system has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alloc_tracker: Option<PathBuf>,
    /// Socket of the network daemon, handed to children as `networkd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkd: Option<PathBuf>,
    /// Thread count hint for the unit tests.
    pub nthreads: u32,
    /// Pause between repeated unit test runs.
    pub iteration_delay_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("."),
            tmp_dir: std::env::temp_dir(),
            alloc_tracker: None,
            networkd: None,
            nthreads: 1,
            iteration_delay_ms: 5000,
        }
    }
}

impl HostConfig {
    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }
}
