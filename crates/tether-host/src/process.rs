//! Spawning program images with a capability table.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{HostError, HostResult};

/// Prefix of the environment variables capabilities are passed in.
pub const CAPABILITY_ENV_PREFIX: &str = "TETHER_CAP_";

/// One entry of the table handed to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Path(PathBuf),
    Int(i64),
    /// The child's output is forwarded to the console.
    ConsoleOutput,
}

/// Capability name to value, e.g. `tmpdir`, `nthreads`, `logfile`.
pub type Capabilities = BTreeMap<String, Capability>;

/// How a child finished. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Zero exit status is a pass.
    pub fn passed(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Starts program images and collects their exit status.
pub trait Spawner {
    type Handle;

    fn spawn(&mut self, image: &Path, capabilities: &Capabilities) -> HostResult<Self::Handle>;

    /// Block until the child exits, forwarding its console output to `out`.
    fn wait(&mut self, handle: &mut Self::Handle, out: &mut dyn Write) -> HostResult<ExitStatus>;

    /// Release the handle; a child still running is killed.
    fn close(&mut self, handle: Self::Handle);
}

/// [`Spawner`] backed by [`std::process::Command`].
///
/// Capabilities become `TETHER_CAP_<NAME>` environment variables: paths
/// and integers as text, the console output as `stdout`, in which case the
/// child's standard output is captured and forwarded.
#[derive(Debug, Default)]
pub struct CommandSpawner;

/// A running child and the image it came from.
#[derive(Debug)]
pub struct ChildHandle {
    image: String,
    child: Child,
}

impl Spawner for CommandSpawner {
    type Handle = ChildHandle;

    fn spawn(&mut self, image: &Path, capabilities: &Capabilities) -> HostResult<ChildHandle> {
        let mut command = Command::new(image);
        command.stdin(Stdio::null());
        for (name, capability) in capabilities {
            let key = format!("{CAPABILITY_ENV_PREFIX}{}", name.to_ascii_uppercase());
            match capability {
                Capability::Path(path) => command.env(key, path),
                Capability::Int(n) => command.env(key, n.to_string()),
                Capability::ConsoleOutput => command.env(key, "stdout").stdout(Stdio::piped()),
            };
        }
        debug!(image = %image.display(), ?capabilities, "spawning");
        let child = command.spawn().map_err(|source| HostError::Spawn {
            image: image.to_path_buf(),
            source,
        })?;
        Ok(ChildHandle {
            image: image.display().to_string(),
            child,
        })
    }

    fn wait(&mut self, handle: &mut ChildHandle, out: &mut dyn Write) -> HostResult<ExitStatus> {
        if let Some(mut stdout) = handle.child.stdout.take() {
            io::copy(&mut stdout, out)?;
            out.flush()?;
        }
        let status = handle.child.wait().map_err(|source| HostError::Wait {
            image: handle.image.clone(),
            source,
        })?;
        Ok(status.into())
    }

    fn close(&mut self, mut handle: ChildHandle) {
        if let Ok(None) = handle.child.try_wait() {
            if let Err(err) = handle.child.kill() {
                warn!(image = %handle.image, %err, "could not kill child");
            }
            // Reap the killed child.
            if let Err(err) = handle.child.wait() {
                warn!(image = %handle.image, %err, "could not reap child");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_pass() {
        assert!(ExitStatus::from_code(0).passed());
        assert!(!ExitStatus::from_code(2).passed());
        assert!(!ExitStatus { code: None }.passed());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_spawner_passes_capabilities_and_forwards_output() {
        let mut caps = Capabilities::new();
        caps.insert("stdout".into(), Capability::ConsoleOutput);
        caps.insert("nthreads".into(), Capability::Int(3));

        // `env` prints its environment to the captured stdout.
        let mut spawner = CommandSpawner;
        let mut handle = spawner.spawn(Path::new("/usr/bin/env"), &caps).unwrap();
        let mut out = Vec::new();
        let status = spawner.wait(&mut handle, &mut out).unwrap();
        spawner.close(handle);

        assert!(status.passed());
        let out = String::from_utf8_lossy(&out);
        assert!(out.contains("TETHER_CAP_NTHREADS=3"));
        assert!(out.contains("TETHER_CAP_STDOUT=stdout"));
    }

    #[test]
    fn test_spawn_missing_image_fails() {
        let mut spawner = CommandSpawner;
        let err = spawner
            .spawn(Path::new("/nonexistent/tether-image"), &Capabilities::new())
            .unwrap_err();
        assert!(matches!(err, HostError::Spawn { .. }));
    }
}
