//! The allocation tracker's single-byte command channel.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{HostError, HostResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCommand {
    Start,
    Stop,
    Report,
}

impl TrackerCommand {
    pub fn byte(self) -> u8 {
        match self {
            Self::Start => b'1',
            Self::Stop => b'0',
            Self::Report => b'R',
        }
    }
}

/// Sends commands to the tracker's command file.
#[derive(Debug, Clone)]
pub struct AllocTracker {
    command_file: PathBuf,
}

impl AllocTracker {
    pub fn new(command_file: impl Into<PathBuf>) -> Self {
        Self {
            command_file: command_file.into(),
        }
    }

    pub fn command_file(&self) -> &Path {
        &self.command_file
    }

    /// Write one command byte. The file is opened per command and never
    /// created.
    pub fn send(&self, command: TrackerCommand) -> HostResult<()> {
        debug!(?command, file = %self.command_file.display(), "allocation tracker command");
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.command_file)
            .map_err(HostError::Tracker)?;
        file.write_all(&[command.byte()]).map_err(HostError::Tracker)
    }

    /// Start tracking until the returned guard is dropped.
    pub fn track(&self) -> HostResult<TrackingGuard<'_>> {
        self.send(TrackerCommand::Start)?;
        Ok(TrackingGuard { tracker: self })
    }

    pub fn report(&self) -> HostResult<()> {
        self.send(TrackerCommand::Report)
    }
}

/// Tracking is active while this lives.
#[must_use = "tracking stops as soon as the guard is dropped"]
pub struct TrackingGuard<'a> {
    tracker: &'a AllocTracker,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.tracker.send(TrackerCommand::Stop) {
            warn!(%err, "could not stop allocation tracking");
        }
    }
}
