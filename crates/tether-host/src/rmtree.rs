//! Recursive removal that reports failures instead of stopping.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use tracing::warn;

use crate::error::HostResult;
use crate::paths::entry_path;

/// Remove `name` under `dir`: a file directly, a directory with everything
/// below it.
///
/// A missing entry counts as removed. A failure is written to `out` as
/// `Failed to recursively remove <name>: <error>` and removal of the
/// remaining entries continues. Only a failure to write that report is
/// returned, along with a `name` that would reach outside `dir`.
pub fn remove_tree(dir: &Path, name: impl AsRef<Path>, out: &mut dyn Write) -> HostResult<()> {
    let name = name.as_ref();
    let path = entry_path(dir, name)?;
    remove_entry(&path, name, out)?;
    Ok(())
}

fn remove_entry(path: &Path, name: &Path, out: &mut dyn Write) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return report(out, name, &err),
    };
    let removed = if metadata.is_dir() {
        remove_children(path, out).and_then(|()| fs::remove_dir(path))
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => report(out, name, &err),
    }
}

fn remove_children(dir: &Path, out: &mut dyn Write) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        remove_entry(&dir.join(&name), Path::new(&name), out)?;
    }
    Ok(())
}

fn report(out: &mut dyn Write, name: &Path, err: &io::Error) -> io::Result<()> {
    warn!(name = %name.display(), %err, "recursive remove failed");
    writeln!(out, "Failed to recursively remove {}: {err}", name.display())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        remove_tree(dir.path(), "absent", &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_removes_single_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), b"x").unwrap();
        let mut out = Vec::new();
        remove_tree(dir.path(), "f", &mut out).unwrap();
        assert!(!dir.path().join("f").exists());
        assert!(out.is_empty());
    }

    #[test]
    fn test_names_outside_dir_are_refused() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("scratch");
        fs::create_dir(&scratch).unwrap();
        let victim = root.path().join("victim");
        fs::write(&victim, b"keep").unwrap();

        let mut out = Vec::new();
        assert!(remove_tree(&scratch, "../victim", &mut out).is_err());
        assert!(remove_tree(&scratch, &victim, &mut out).is_err());
        assert!(victim.exists());
        assert!(out.is_empty());
    }
}
