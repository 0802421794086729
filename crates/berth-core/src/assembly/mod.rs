//! Assemble a runtime tree from prebuilt distributions and built modules.
//!
//! Only the sequencing lives here. Archive handling goes through
//! [`ArchiveOps`]; component order comes from [`crate::install::resolve`].

pub mod archive;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::config::{BerthConfig, DistributionEntry};
use crate::error::ResolveError;
use crate::install::{
    Component, InstallReport, InstallationBatch, Installer, discover_components, install_batch,
    resolve,
};

pub use archive::{ArchiveOps, ZipArchiveOps};

/// Installs a component by copying its directory to `<dest_root>/<name>`.
#[derive(Debug, Clone)]
pub struct DirectoryInstaller {
    ops: Arc<dyn ArchiveOps>,
    dest_root: PathBuf,
}

impl DirectoryInstaller {
    pub fn new(ops: Arc<dyn ArchiveOps>, dest_root: PathBuf) -> Self {
        Self { ops, dest_root }
    }
}

impl Installer for DirectoryInstaller {
    fn install(&mut self, component: &Component) -> anyhow::Result<()> {
        let dest = self.dest_root.join(&component.name);
        self.ops
            .copy_tree(&component.source, &dest)
            .with_context(|| format!("Failed to install module {}", component.name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub laid_down: Vec<String>,
    /// Distributions whose destination already existed
    pub skipped: Vec<String>,
    pub resources_copied: bool,
    pub installed: InstallReport,
}

#[derive(Debug, Clone)]
pub struct Assembler {
    config: BerthConfig,
    ops: Arc<dyn ArchiveOps>,
}

impl Assembler {
    pub fn new(config: BerthConfig, ops: Arc<dyn ArchiveOps>) -> Self {
        Self { config, ops }
    }

    pub fn with_zip(config: BerthConfig) -> Self {
        Self::new(config, Arc::new(ZipArchiveOps))
    }

    pub fn build_dir(&self) -> &Path {
        &self.config.assembly.build_dir
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.config.assembly.runtime_dir()
    }

    /// Run every step in order.
    pub fn assemble(&self) -> anyhow::Result<AssemblyReport> {
        let mut report = AssemblyReport::default();
        self.prepare()?;
        for dist in &self.config.assembly.distributions {
            if self.lay_down(dist)? {
                report.laid_down.push(dist.name.clone());
            } else {
                report.skipped.push(dist.name.clone());
            }
        }
        report.resources_copied = self.copy_resources()?;
        report.installed = self.install_components()?;
        Ok(report)
    }

    pub fn clean(&self) -> anyhow::Result<()> {
        let build_dir = self.build_dir();
        if build_dir.exists() {
            tracing::info!(dir = %build_dir.display(), "removing build directory");
            std::fs::remove_dir_all(build_dir)
                .with_context(|| format!("Failed to remove {}", build_dir.display()))?;
        }
        Ok(())
    }

    /// The runtime directory itself is left to [`Assembler::lay_down`].
    pub fn prepare(&self) -> anyhow::Result<()> {
        let build_dir = self.build_dir();
        std::fs::create_dir_all(build_dir)
            .with_context(|| format!("Failed to create {}", build_dir.display()))
    }

    /// Unpack a distribution and move its top-level directory to `dest`.
    /// Returns `false` when `dest` already exists.
    pub fn lay_down(&self, dist: &DistributionEntry) -> anyhow::Result<bool> {
        let dest = if dist.dest.is_absolute() {
            dist.dest.clone()
        } else {
            self.build_dir().join(&dist.dest)
        };
        if dest.exists() {
            tracing::debug!(distribution = %dist.name, "already laid down");
            return Ok(false);
        }
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid destination: {}", dest.display()))?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        tracing::info!(distribution = %dist.name, archive = %dist.archive.display(), "laying down");
        let before = list_names(parent)?;
        self.ops.unpack(&dist.archive, parent)?;

        let mut unpacked: Vec<String> = list_names(parent)?
            .into_iter()
            .filter(|name| !before.contains(name) && name.starts_with(&dist.prefix))
            .collect();
        unpacked.sort();
        let Some(top) = unpacked.first() else {
            anyhow::bail!(
                "Archive {} has no top-level entry starting with '{}'",
                dist.archive.display(),
                dist.prefix
            );
        };
        let unpacked_dir = parent.join(top);
        if unpacked_dir != dest {
            std::fs::rename(&unpacked_dir, &dest).with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    unpacked_dir.display(),
                    dest.display()
                )
            })?;
        }
        Ok(true)
    }

    pub fn copy_resources(&self) -> anyhow::Result<bool> {
        let Some(resources) = &self.config.assembly.resources_dir else {
            return Ok(false);
        };
        tracing::info!(from = %resources.display(), "copying resources");
        self.ops.copy_tree(resources, &self.runtime_dir())?;
        Ok(true)
    }

    /// Discovered components with manifest overrides applied.
    pub fn batch(&self) -> anyhow::Result<InstallationBatch> {
        let assembly = &self.config.assembly;
        let Some(modules_dir) = &assembly.modules_dir else {
            return Ok(InstallationBatch::default());
        };
        let components =
            discover_components(modules_dir, &assembly.module_prefix, &assembly.module_suffix)?;
        let mut batch = InstallationBatch::new(components)
            .with_declared_order(self.config.install.order.iter().cloned());

        for (name, entry) in &self.config.components {
            if !batch.add_pins(name, &entry.pins) {
                return Err(ResolveError::UnknownDeclared(name.clone()).into());
            }
            if let Some(kind) = entry.kind {
                for component in batch.components.iter_mut().filter(|c| &c.name == name) {
                    component.kind = kind;
                }
            }
        }
        Ok(batch)
    }

    /// Resolved order without installing anything.
    pub fn plan(&self) -> anyhow::Result<Vec<Component>> {
        Ok(resolve(&self.batch()?)?)
    }

    pub fn install_components(&self) -> anyhow::Result<InstallReport> {
        let batch = self.batch()?;
        let mut installer =
            DirectoryInstaller::new(self.ops.clone(), self.runtime_dir().join("modules"));
        Ok(install_batch(&batch, &mut installer)?)
    }
}

fn list_names(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
