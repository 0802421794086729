//! Archive and tree-copy collaborator used while assembling.

use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;

pub trait ArchiveOps: Debug + Send + Sync {
    /// Extract `archive` into `dest_dir`.
    fn unpack(&self, archive: &Path, dest_dir: &Path) -> anyhow::Result<()>;

    /// Copy the contents of `src` into `dest`, overwriting existing files.
    fn copy_tree(&self, src: &Path, dest: &Path) -> anyhow::Result<()>;
}

/// `zip`-backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveOps;

impl ArchiveOps for ZipArchiveOps {
    fn unpack(&self, archive: &Path, dest_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("Failed to create extract directory: {}", dest_dir.display()))?;

        let file = File::open(archive)
            .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file)
            .with_context(|| format!("Failed to read zip archive: {}", archive.display()))?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .with_context(|| format!("Failed to read zip entry {}", i))?;

            // Entries escaping dest_dir are skipped
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let outpath = dest_dir.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath).with_context(|| {
                    format!("Failed to create directory: {}", outpath.display())
                })?;
                continue;
            }
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directory: {}", parent.display())
                })?;
            }
            let mut outfile = File::create(&outpath)
                .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
            io::copy(&mut entry, &mut outfile)
                .with_context(|| format!("Failed to extract: {}", outpath.display()))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    let permissions = std::fs::Permissions::from_mode(mode);
                    if let Err(err) = std::fs::set_permissions(&outpath, permissions) {
                        tracing::debug!(
                            path = %outpath.display(),
                            mode = %format!("{mode:o}"),
                            error = %err,
                            "could not restore file mode"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn copy_tree(&self, src: &Path, dest: &Path) -> anyhow::Result<()> {
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
            let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
            let target = dest.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target).with_context(|| {
                    format!("Failed to create directory: {}", target.display())
                })?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create parent directory: {}", parent.display())
                    })?;
                }
                std::fs::copy(entry.path(), &target).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        entry.path().display(),
                        target.display()
                    )
                })?;
            }
        }
        Ok(())
    }
}
