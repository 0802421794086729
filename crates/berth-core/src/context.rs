//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assembly::Assembler;
use crate::config::BerthConfig;
use crate::deploy::DeploymentClient;
use crate::server::{HttpManagementChannel, ManagementChannel, ServerLifecycleClient};

/// Configuration plus the working directory, resolved once by the frontend
/// and used to build every client.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: BerthConfig,
    work_dir: PathBuf,
}

impl AppContext {
    pub fn new(config: BerthConfig, work_dir: PathBuf) -> Self {
        Self { config, work_dir }
    }

    pub fn config(&self) -> &BerthConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BerthConfig {
        &mut self.config
    }

    /// Directory relative CLI paths are resolved against.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    pub fn deployment_client(&self) -> DeploymentClient {
        DeploymentClient::new(&self.config.deploy, self.config.deploy_dir())
    }

    /// Lifecycle client over the HTTP management API.
    pub fn lifecycle_client(&self) -> anyhow::Result<ServerLifecycleClient> {
        let channel = HttpManagementChannel::new(&self.config.server)?;
        Ok(self.lifecycle_client_with(Arc::new(channel)))
    }

    pub fn lifecycle_client_with(
        &self,
        channel: Arc<dyn ManagementChannel>,
    ) -> ServerLifecycleClient {
        ServerLifecycleClient::new(&self.config.server, channel)
    }

    pub fn assembler(&self) -> Assembler {
        Assembler::with_zip(self.config.clone())
    }
}
