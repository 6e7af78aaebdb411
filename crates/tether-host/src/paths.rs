//! Names resolved under a directory handle.

use std::path::{Component, Path, PathBuf};

use crate::error::{HostError, HostResult};

/// `dir/name`, provided `name` stays inside `dir`: relative, with at least
/// one normal component and no `..`.
pub fn entry_path(dir: &Path, name: &Path) -> HostResult<PathBuf> {
    let mut named = false;
    for component in name.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside(dir, name));
            }
        }
    }
    if !named {
        return Err(outside(dir, name));
    }
    Ok(dir.join(name))
}

fn outside(dir: &Path, name: &Path) -> HostError {
    HostError::OutsideDir {
        name: name.to_path_buf(),
        dir: dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_resolve() {
        let dir = Path::new("/tmp/scratch");
        assert_eq!(entry_path(dir, Path::new("a")).unwrap(), dir.join("a"));
        assert_eq!(entry_path(dir, Path::new("a/b")).unwrap(), dir.join("a/b"));
        assert_eq!(entry_path(dir, Path::new("./a")).unwrap(), dir.join("./a"));
    }

    #[test]
    fn test_escaping_names_are_rejected() {
        let dir = Path::new("/tmp/scratch");
        for name in ["../victim", "a/../../victim", "/etc/passwd", "", "."] {
            let err = entry_path(dir, Path::new(name)).unwrap_err();
            assert!(matches!(err, HostError::OutsideDir { .. }), "{name}");
        }
    }
}
