//! Build a deployable zip archive from an application root.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub root: PathBuf,
    pub output: PathBuf,
    /// Regular expressions matched against the whole `/`-separated path
    /// relative to `root`. A matching directory is skipped with its contents.
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub entries: usize,
}

/// Write the archive described by `options`.
///
/// On any error after the output file is created, the partial archive is
/// removed again.
pub fn create_archive(options: &ArchiveOptions) -> anyhow::Result<ArchiveReport> {
    let excludes = compile_excludes(&options.excludes)?;
    let root = std::fs::canonicalize(&options.root)
        .with_context(|| format!("Application root not found: {}", options.root.display()))?;
    let file = File::create(&options.output)
        .with_context(|| format!("Failed to create archive: {}", options.output.display()))?;

    let entries = match write_entries(file, &root, &options.output, &excludes) {
        Ok(entries) => entries,
        Err(err) => {
            if let Err(remove_err) = std::fs::remove_file(&options.output) {
                tracing::debug!(
                    archive = %options.output.display(),
                    error = %remove_err,
                    "could not remove partial archive"
                );
            }
            return Err(err);
        }
    };
    tracing::info!(archive = %options.output.display(), entries, "archive created");

    Ok(ArchiveReport {
        path: options.output.clone(),
        entries,
    })
}

fn write_entries(
    file: File,
    root: &Path,
    output: &Path,
    excludes: &[Regex],
) -> anyhow::Result<usize> {
    // The output may live inside root; never archive it into itself.
    let output_abs = std::fs::canonicalize(output)
        .with_context(|| format!("Failed to resolve archive path: {}", output.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let file_options = SimpleFileOptions::default();
    let mut entries = 0usize;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let rel = relative_name(root, entry.path());
            !excludes.iter().any(|re| re.is_match(&rel))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let path = entry.path();
        if path == output_abs {
            continue;
        }
        let rel = relative_name(root, path);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{rel}/"), file_options)
                .with_context(|| format!("Failed to add directory: {rel}"))?;
        } else if entry.file_type().is_file() {
            zip.start_file(rel.as_str(), file_options)
                .with_context(|| format!("Failed to add file: {rel}"))?;
            let mut source = File::open(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            io::copy(&mut source, &mut zip)
                .with_context(|| format!("Failed to write archive entry: {rel}"))?;
        } else {
            continue;
        }
        entries += 1;
    }

    let mut file = zip.finish().context("Failed to finish archive")?;
    file.flush().context("Failed to flush archive")?;
    Ok(entries)
}

fn compile_excludes(patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$"))
                .with_context(|| format!("Invalid exclude pattern: {pattern}"))
        })
        .collect()
}

fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
