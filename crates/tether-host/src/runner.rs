//! Orchestration of test image runs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info};

use crate::alloc_track::AllocTracker;
use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::paths::entry_path;
use crate::process::{Capabilities, Capability, ExitStatus, Spawner};
use crate::rmtree::remove_tree;

/// Image holding the unit tests.
pub const UNITTESTS_IMAGE: &str = "unittests";

/// Standalone test binaries run by [`TestRunner::run_tests`], in order.
pub const TEST_BINARIES: [&str; 8] = [
    "pipe_test",
    "concur_test",
    "time_test",
    "tmptest",
    "mmap_test",
    "unixsock_test",
    "udptest",
    "tcptest",
];

/// Running totals of repeated unit test runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationTally {
    pub successes: u64,
    pub failures: u64,
}

impl IterationTally {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }
}

/// Runs test images through a [`Spawner`].
pub struct TestRunner<S: Spawner> {
    spawner: S,
    config: HostConfig,
    tracker: Option<AllocTracker>,
}

impl<S: Spawner> TestRunner<S> {
    pub fn new(spawner: S, config: HostConfig) -> Self {
        let tracker = config.alloc_tracker.clone().map(AllocTracker::new);
        Self {
            spawner,
            config,
            tracker,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Spawn `image` from the bin dir, wait for it and release it.
    pub fn run_image(
        &mut self,
        image: &str,
        capabilities: &Capabilities,
        out: &mut dyn Write,
    ) -> HostResult<ExitStatus> {
        let path = entry_path(&self.config.bin_dir, Path::new(image))?;
        let mut handle = self.spawner.spawn(&path, capabilities)?;
        let status = self.spawner.wait(&mut handle, out);
        self.spawner.close(handle);
        let status = status?;
        debug!(image, code = ?status.code, "image finished");
        Ok(status)
    }

    /// Run the unit tests in a fresh `unittests` scratch directory.
    pub fn run_unittests(&mut self, out: &mut dyn Write) -> HostResult<ExitStatus> {
        let scratch = self.fresh_scratch_dir(out)?;
        let capabilities = Capabilities::from([
            ("logfile".to_string(), Capability::ConsoleOutput),
            ("tmpdir".to_string(), Capability::Path(scratch)),
            (
                "nthreads".to_string(),
                Capability::Int(i64::from(self.config.nthreads)),
            ),
        ]);
        self.run_image(UNITTESTS_IMAGE, &capabilities, out)
    }

    fn fresh_scratch_dir(&self, out: &mut dyn Write) -> HostResult<PathBuf> {
        remove_tree(&self.config.tmp_dir, UNITTESTS_IMAGE, out)?;
        let scratch = self.config.tmp_dir.join(UNITTESTS_IMAGE);
        fs::create_dir(&scratch).map_err(|source| HostError::Fs {
            path: scratch.clone(),
            source,
        })?;
        Ok(scratch)
    }

    /// Run the unit tests `count` times, or forever when `count` is 0,
    /// reporting every iteration to `out`.
    pub fn run_unittests_count(
        &mut self,
        count: u64,
        out: &mut dyn Write,
    ) -> HostResult<IterationTally> {
        let mut tally = IterationTally::default();
        while count == 0 || tally.total() < count {
            let status = self.run_unittests(out)?;
            let verdict = if status.passed() {
                tally.successes += 1;
                "succeeded"
            } else {
                tally.failures += 1;
                "FAILED"
            };
            writeln!(
                out,
                "== Unittest iteration {} {verdict}. Total {} successes, {} failures.",
                tally.total(),
                tally.successes,
                tally.failures
            )?;
            out.flush()?;
            if count == 0 || tally.total() < count {
                thread::sleep(self.config.iteration_delay());
            }
        }
        info!(?tally, "unit test iterations finished");
        Ok(tally)
    }

    /// Run one standalone test binary with its output on the console.
    pub fn run_binary(&mut self, name: &str, out: &mut dyn Write) -> HostResult<ExitStatus> {
        let mut capabilities = Capabilities::from([
            ("stdout".to_string(), Capability::ConsoleOutput),
            (
                "tmpdir".to_string(),
                Capability::Path(self.config.tmp_dir.clone()),
            ),
        ]);
        if let Some(networkd) = &self.config.networkd {
            capabilities.insert("networkd".to_string(), Capability::Path(networkd.clone()));
        }
        self.run_image(name, &capabilities, out)
    }

    /// Run every [`TEST_BINARIES`] entry, then the unit tests.
    ///
    /// Returns each image with its status, unit tests last.
    pub fn run_tests(&mut self, out: &mut dyn Write) -> HostResult<Vec<(String, ExitStatus)>> {
        let mut results = Vec::with_capacity(TEST_BINARIES.len() + 1);
        for name in TEST_BINARIES {
            let status = self.run_binary(name, out)?;
            results.push((name.to_string(), status));
        }
        let status = self.run_unittests(out)?;
        results.push((UNITTESTS_IMAGE.to_string(), status));
        Ok(results)
    }

    /// One warm-up run, two tracked runs, one more run, then a report.
    pub fn run_leak_analysis(&mut self, out: &mut dyn Write) -> HostResult<()> {
        let tracker = self.tracker.clone().ok_or(HostError::NoTracker)?;
        self.run_unittests(out)?;
        {
            let _tracking = tracker.track()?;
            self.run_unittests(out)?;
            self.run_unittests(out)?;
        }
        self.run_unittests(out)?;
        tracker.report()
    }
}
