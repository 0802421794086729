//! Deploy and undeploy artifacts and wait for the watcher to confirm.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::markers::{
    DeploymentMarkerProtocol, DeploymentReport, DeploymentRequest, FsMarkerStore, MarkerSet,
    MarkerStore,
};

use super::descriptor::AppDeployment;

#[derive(Debug, Clone)]
pub struct DeploymentClient {
    protocol: DeploymentMarkerProtocol,
    deploy_dir: PathBuf,
    descriptor_suffix: String,
    archive_extension: String,
}

impl DeploymentClient {
    pub fn new(config: &DeployConfig, deploy_dir: PathBuf) -> Self {
        Self::with_store(config, deploy_dir, Arc::new(FsMarkerStore::new()))
    }

    pub fn with_store(
        config: &DeployConfig,
        deploy_dir: PathBuf,
        store: Arc<dyn MarkerStore>,
    ) -> Self {
        let protocol = DeploymentMarkerProtocol::new(store, config.poll_settings())
            .with_write_attempts(config.write_retries);
        Self {
            protocol,
            deploy_dir,
            descriptor_suffix: config.descriptor_suffix.clone(),
            archive_extension: config.archive_extension.clone(),
        }
    }

    pub fn deploy_dir(&self) -> &Path {
        &self.deploy_dir
    }

    /// Artifact name of the descriptor for application `app_name`.
    pub fn descriptor_name(&self, app_name: &str) -> String {
        format!("{app_name}{}", self.descriptor_suffix)
    }

    /// Artifact name of the archive for application `app_name`.
    pub fn archive_name(&self, app_name: &str) -> String {
        format!("{app_name}.{}", self.archive_extension)
    }

    pub fn status(&self, artifact: &str) -> anyhow::Result<MarkerSet> {
        self.protocol
            .observe(&DeploymentRequest::deploy(artifact, &self.deploy_dir))
            .with_context(|| format!("Failed to read markers for {artifact}"))
    }

    /// Deploy `content` as artifact `artifact` and wait for the outcome.
    ///
    /// Rejected with [`DeployError::AlreadyRequested`] while an earlier
    /// request for the same artifact is pending or confirmed.
    pub fn deploy(&self, artifact: &str, content: &[u8]) -> anyhow::Result<DeploymentReport> {
        let req = DeploymentRequest::deploy(artifact, &self.deploy_dir);
        let current = self
            .protocol
            .observe(&req)
            .with_context(|| format!("Failed to read markers for {artifact}"))?;
        if current.is_active() {
            return Err(DeployError::AlreadyRequested(artifact.to_string()).into());
        }
        Ok(self.protocol.deploy(&req, content)?)
    }

    /// Write a descriptor pointing at an application directory.
    pub fn deploy_app(&self, app: &AppDeployment) -> anyhow::Result<DeploymentReport> {
        let name = self.descriptor_name(&app.app_name()?);
        let yaml = app.descriptor()?.to_yaml()?;
        self.deploy(&name, yaml.as_bytes())
    }

    /// Copy a prebuilt archive into the deployment directory.
    pub fn deploy_archive(&self, archive: &Path) -> anyhow::Result<DeploymentReport> {
        let name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid archive path: {}", archive.display()))?;
        let bytes = std::fs::read(archive)
            .with_context(|| format!("Failed to read archive: {}", archive.display()))?;
        self.deploy(name, &bytes)
    }

    pub fn undeploy(&self, artifact: &str) -> anyhow::Result<DeploymentReport> {
        let req = DeploymentRequest::undeploy(artifact, &self.deploy_dir);
        Ok(self.protocol.undeploy(&req)?)
    }
}
