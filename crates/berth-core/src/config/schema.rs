//! Configuration schema for berth.toml
//!
//! Sections:
//! - `[deploy]`: deployment directory and marker polling
//! - `[server]`: management endpoint and lifecycle polling
//! - `[assembly]`: distribution archives and build layout
//! - `[install]` / `[components.<name>]`: declared order and pins

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::install::ComponentKind;
use crate::poll::PollSettings;

/// Root configuration structure for berth.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BerthConfig {
    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub assembly: AssemblyConfig,

    #[serde(default)]
    pub install: InstallConfig,

    /// Per-component overrides keyed by discovered name
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Deployment directory watched by the runtime. Falls back to
    /// `<assembly.runtime_dir>/standalone/deployments`.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_deploy_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_deploy_interval")]
    pub interval_secs: u64,

    /// Attempts for each local marker write
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,

    #[serde(default = "default_descriptor_suffix")]
    pub descriptor_suffix: String,

    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_secs: default_deploy_timeout(),
            interval_secs: default_deploy_interval(),
            write_retries: default_write_retries(),
            descriptor_suffix: default_descriptor_suffix(),
            archive_extension: default_archive_extension(),
        }
    }
}

impl DeployConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::from_secs(self.timeout_secs, self.interval_secs)
    }
}

fn default_deploy_timeout() -> u64 {
    1200
}

fn default_deploy_interval() -> u64 {
    1
}

fn default_write_retries() -> u32 {
    3
}

fn default_descriptor_suffix() -> String {
    "-knob.yml".to_string()
}

fn default_archive_extension() -> String {
    "knob".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Management API endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Host controller name used as the first address segment
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_server_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_server_interval")]
    pub interval_secs: u64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            host: default_host(),
            timeout_secs: default_server_timeout(),
            interval_secs: default_server_interval(),
            username: None,
            password: None,
        }
    }
}

impl ServerConfig {
    pub fn endpoint_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid management endpoint: {}", self.endpoint))
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::from_secs(self.timeout_secs, self.interval_secs)
    }
}

fn default_endpoint() -> String {
    "http://localhost:9990/management".to_string()
}

fn default_host() -> String {
    "master".to_string()
}

fn default_server_timeout() -> u64 {
    30
}

fn default_server_interval() -> u64 {
    2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Where the runtime distribution is laid down. Defaults to
    /// `<build_dir>/runtime`.
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,

    /// Tree copied over the laid-down runtime
    #[serde(default)]
    pub resources_dir: Option<PathBuf>,

    /// Root holding `<module>/target/*-module` directories
    #[serde(default)]
    pub modules_dir: Option<PathBuf>,

    #[serde(default = "default_module_prefix")]
    pub module_prefix: String,

    #[serde(default = "default_module_suffix")]
    pub module_suffix: String,

    #[serde(default)]
    pub distributions: Vec<DistributionEntry>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            runtime_dir: None,
            resources_dir: None,
            modules_dir: None,
            module_prefix: default_module_prefix(),
            module_suffix: default_module_suffix(),
            distributions: Vec::new(),
        }
    }
}

impl AssemblyConfig {
    pub fn runtime_dir(&self) -> PathBuf {
        self.runtime_dir
            .clone()
            .unwrap_or_else(|| self.build_dir.join("runtime"))
    }
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("target").join("stage")
}

fn default_module_prefix() -> String {
    "torquebox-".to_string()
}

fn default_module_suffix() -> String {
    "-module".to_string()
}

/// A prebuilt distribution zip to lay down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub name: String,
    pub archive: PathBuf,
    /// Destination directory, relative to `build_dir` when not absolute
    pub dest: PathBuf,
    /// Prefix of the archive's single top-level directory
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Declared sub-order, installed right after the foundational tier
    #[serde(default)]
    pub order: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfigEntry {
    /// Components that must be installed first
    #[serde(default)]
    pub pins: Vec<String>,

    /// Override the kind derived from the name
    #[serde(default)]
    pub kind: Option<ComponentKind>,
}

impl BerthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deployment directory, falling back to the runtime's standard layout.
    pub fn deploy_dir(&self) -> PathBuf {
        self.deploy.dir.clone().unwrap_or_else(|| {
            self.assembly
                .runtime_dir()
                .join("standalone")
                .join("deployments")
        })
    }

    /// Make relative paths relative to `base` (the config file's directory).
    pub fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(dir) = self.deploy.dir.as_mut() {
            join(dir);
        }
        join(&mut self.assembly.build_dir);
        for dir in [
            self.assembly.runtime_dir.as_mut(),
            self.assembly.resources_dir.as_mut(),
            self.assembly.modules_dir.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            join(dir);
        }
        for dist in &mut self.assembly.distributions {
            join(&mut dist.archive);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.deploy.timeout_secs == 0 {
            anyhow::bail!("deploy.timeout_secs must be greater than zero");
        }
        if self.server.timeout_secs == 0 {
            anyhow::bail!("server.timeout_secs must be greater than zero");
        }
        if self.deploy.interval_secs == 0 {
            anyhow::bail!("deploy.interval_secs must be greater than zero");
        }
        if self.server.interval_secs == 0 {
            anyhow::bail!("server.interval_secs must be greater than zero");
        }
        self.server.endpoint_url()?;
        if self.deploy.archive_extension.is_empty() {
            anyhow::bail!("deploy.archive_extension must not be empty");
        }

        let mut seen = std::collections::HashSet::new();
        for dist in &self.assembly.distributions {
            if !seen.insert(dist.name.as_str()) {
                anyhow::bail!("Duplicate distribution name: {}", dist.name);
            }
        }

        for (name, entry) in &self.components {
            entry
                .validate()
                .with_context(|| format!("Invalid component entry '{}'", name))?;
        }
        Ok(())
    }
}

impl ComponentConfigEntry {
    fn validate(&self) -> anyhow::Result<()> {
        if self.pins.iter().any(|p| p.trim().is_empty()) {
            anyhow::bail!("Pin names must not be empty");
        }
        Ok(())
    }
}
