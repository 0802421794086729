//! Storage seam for artifacts and their marker files.

use std::fmt::Debug;
use std::io;
use std::path::Path;

use super::{MarkerKind, MarkerSet};

/// Filesystem operations the marker protocol needs.
///
/// Presence, not content, of a marker is meaningful; markers are written
/// empty.
pub trait MarkerStore: Debug + Send + Sync {
    fn write_artifact(&self, dir: &Path, name: &str, content: &[u8]) -> io::Result<()>;

    /// Returns `true` if something was removed.
    fn remove_artifact(&self, dir: &Path, name: &str) -> io::Result<bool>;

    fn create_marker(&self, dir: &Path, name: &str, kind: MarkerKind) -> io::Result<()>;

    /// Returns `true` if the marker existed.
    fn remove_marker(&self, dir: &Path, name: &str, kind: MarkerKind) -> io::Result<bool>;

    fn observe(&self, dir: &Path, name: &str) -> io::Result<MarkerSet>;
}

/// Marker store backed by a real deployment directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMarkerStore;

impl FsMarkerStore {
    pub fn new() -> Self {
        Self
    }
}

impl MarkerStore for FsMarkerStore {
    fn write_artifact(&self, dir: &Path, name: &str, content: &[u8]) -> io::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(name), content)
    }

    fn remove_artifact(&self, dir: &Path, name: &str) -> io::Result<bool> {
        remove_if_exists(&dir.join(name))
    }

    fn create_marker(&self, dir: &Path, name: &str, kind: MarkerKind) -> io::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(kind.file_name(name)), b"")
    }

    fn remove_marker(&self, dir: &Path, name: &str, kind: MarkerKind) -> io::Result<bool> {
        remove_if_exists(&dir.join(kind.file_name(name)))
    }

    fn observe(&self, dir: &Path, name: &str) -> io::Result<MarkerSet> {
        let mut set = MarkerSet {
            artifact: dir.join(name).try_exists()?,
            ..Default::default()
        };
        for kind in MarkerKind::ALL {
            set.set(kind, dir.join(kind.file_name(name)).try_exists()?);
        }
        Ok(set)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(true),
        // The watcher may have deleted it between the stat and the remove.
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
