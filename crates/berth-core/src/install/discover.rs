//! Discover built module directories.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::component::Component;

/// Find `<modules_dir>/*/target/*<suffix>` directories.
///
/// Each match becomes a component named by its basename with `suffix`
/// stripped and then `prefix` removed (`torquebox-web-module` -> `web`).
/// Results are sorted by path, so discovery order is stable across runs.
pub fn discover_components(
    modules_dir: &Path,
    prefix: &str,
    suffix: &str,
) -> anyhow::Result<Vec<Component>> {
    let mut found: Vec<PathBuf> = Vec::new();
    for module in sorted_entries(modules_dir)? {
        let target = module.join("target");
        if !target.is_dir() {
            continue;
        }
        for candidate in sorted_entries(&target)? {
            let matches = candidate
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(suffix));
            if matches && candidate.is_dir() {
                found.push(candidate);
            }
        }
    }
    found.sort();

    let components = found
        .into_iter()
        .filter_map(|path| {
            let base = path.file_name()?.to_str()?;
            let name = component_name(base, prefix, suffix);
            Some(Component::new(name, path))
        })
        .collect::<Vec<_>>();
    tracing::debug!(count = components.len(), dir = %modules_dir.display(), "discovered components");
    Ok(components)
}

fn component_name(base: &str, prefix: &str, suffix: &str) -> String {
    let trimmed = base.strip_suffix(suffix).unwrap_or(base);
    trimmed.replacen(prefix, "", 1)
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_suffix() {
        assert_eq!(component_name("torquebox-web-module", "torquebox-", "-module"), "web");
        assert_eq!(component_name("bootstrap-module", "torquebox-", "-module"), "bootstrap");
    }
}
