//! YAML deployment descriptor for application directories.
//!
//! The watcher deploys an application in place when handed a descriptor
//! pointing at its root, so deploying a directory never copies it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub application: ApplicationSection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSection>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSection {
    pub root: PathBuf,

    /// Application environment, e.g. `production`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSection {
    pub context: String,
}

/// What to deploy from an application directory.
#[derive(Debug, Clone, Default)]
pub struct AppDeployment {
    pub root: PathBuf,
    /// Defaults to the basename of `root`
    pub name: Option<String>,
    pub context_path: Option<String>,
    pub env: Option<String>,
    pub environment: BTreeMap<String, String>,
}

impl AppDeployment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_context_path(mut self, context: impl Into<String>) -> Self {
        self.context_path = Some(context.into());
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn app_name(&self) -> anyhow::Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        app_name_from_root(&self.root)
    }

    /// Descriptor with `root` made absolute.
    pub fn descriptor(&self) -> anyhow::Result<DeploymentDescriptor> {
        let root = std::fs::canonicalize(&self.root).with_context(|| {
            format!("Application root not found: {}", self.root.display())
        })?;
        Ok(DeploymentDescriptor {
            application: ApplicationSection {
                root,
                env: self.env.clone(),
            },
            web: self.context_path.clone().map(|context| WebSection { context }),
            environment: self.environment.clone(),
        })
    }
}

pub fn app_name_from_root(root: &Path) -> anyhow::Result<String> {
    let resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Cannot derive a name from {}", root.display()))
}

impl DeploymentDescriptor {
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize deployment descriptor")
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse deployment descriptor")
    }
}
