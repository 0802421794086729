//! Walk a resolved order and install each component.

use serde::Serialize;

use crate::error::{BatchError, InstallError};

use super::component::{Component, InstallationBatch};
use super::resolver::resolve;

/// Per-component installer collaborator.
pub trait Installer {
    fn install(&mut self, component: &Component) -> anyhow::Result<()>;
}

impl<F> Installer for F
where
    F: FnMut(&Component) -> anyhow::Result<()>,
{
    fn install(&mut self, component: &Component) -> anyhow::Result<()> {
        self(component)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub installed: Vec<String>,
}

/// Install `order` front to back, stopping at the first failure.
///
/// Nothing is retried or rolled back: components installed before the
/// failure are listed in the error and left in place.
pub fn install_in_order<I>(
    order: &[Component],
    installer: &mut I,
) -> Result<InstallReport, InstallError>
where
    I: Installer + ?Sized,
{
    let mut report = InstallReport::default();
    for component in order {
        tracing::info!(component = %component.name, kind = ?component.kind, "installing component");
        if let Err(source) = installer.install(component) {
            tracing::warn!(component = %component.name, error = %source, "install failed, aborting batch");
            return Err(InstallError {
                component: component.name.clone(),
                installed: report.installed,
                source,
            });
        }
        report.installed.push(component.name.clone());
    }
    Ok(report)
}

/// Resolve and install a batch. Resolution errors surface before any
/// installer call.
pub fn install_batch<I>(
    batch: &InstallationBatch,
    installer: &mut I,
) -> Result<InstallReport, BatchError>
where
    I: Installer + ?Sized,
{
    let order = resolve(batch)?;
    Ok(install_in_order(&order, installer)?)
}
