//! Config store for locating and loading berth.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{BerthConfig, parser};

pub const CONFIG_FILE_NAME: &str = "berth.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// `./berth.toml` when present, otherwise `<config_dir>/berth/berth.toml`.
    pub fn default_path(project_root: &Path) -> PathBuf {
        let local = project_root.join(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("berth").join(CONFIG_FILE_NAME))
            .unwrap_or(local)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file yields the default configuration.
    pub fn load(&self) -> anyhow::Result<BerthConfig> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(BerthConfig::new());
        }
        parser::parse_berth_toml(&self.config_path)
    }

    pub fn save(&self, config: &BerthConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
