//! Marker-file deployment protocol.
//!
//! An artifact `<name>` in a deployment directory is accompanied by sentinel
//! files whose presence signals state to an external watcher:
//! - `<name>.dodeploy`: deployment requested
//! - `<name>.isdeploying`: the watcher claimed the request
//! - `<name>.deployed`: the watcher confirmed success
//! - `<name>.failed`: the watcher confirmed failure
//! - `<name>.undeployed`: the watcher finished an undeploy (optional)

pub mod protocol;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use protocol::{DeploymentMarkerProtocol, DeploymentReport};
pub use store::{FsMarkerStore, MarkerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    DoDeploy,
    IsDeploying,
    Deployed,
    Failed,
    Undeployed,
}

impl MarkerKind {
    pub const ALL: [MarkerKind; 5] = [
        MarkerKind::DoDeploy,
        MarkerKind::IsDeploying,
        MarkerKind::Deployed,
        MarkerKind::Failed,
        MarkerKind::Undeployed,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            MarkerKind::DoDeploy => ".dodeploy",
            MarkerKind::IsDeploying => ".isdeploying",
            MarkerKind::Deployed => ".deployed",
            MarkerKind::Failed => ".failed",
            MarkerKind::Undeployed => ".undeployed",
        }
    }

    /// Marker file name for artifact `name`.
    pub fn file_name(self, name: &str) -> String {
        format!("{name}{}", self.suffix())
    }
}

/// Snapshot of one artifact's files at a single instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSet {
    pub artifact: bool,
    pub dodeploy: bool,
    pub isdeploying: bool,
    pub deployed: bool,
    pub failed: bool,
    pub undeployed: bool,
}

impl MarkerSet {
    pub fn has(&self, kind: MarkerKind) -> bool {
        match kind {
            MarkerKind::DoDeploy => self.dodeploy,
            MarkerKind::IsDeploying => self.isdeploying,
            MarkerKind::Deployed => self.deployed,
            MarkerKind::Failed => self.failed,
            MarkerKind::Undeployed => self.undeployed,
        }
    }

    pub fn set(&mut self, kind: MarkerKind, present: bool) {
        match kind {
            MarkerKind::DoDeploy => self.dodeploy = present,
            MarkerKind::IsDeploying => self.isdeploying = present,
            MarkerKind::Deployed => self.deployed = present,
            MarkerKind::Failed => self.failed = present,
            MarkerKind::Undeployed => self.undeployed = present,
        }
    }

    /// A request is outstanding or already confirmed; deploying again would
    /// be read by the watcher as a new request.
    pub fn is_active(&self) -> bool {
        self.dodeploy || self.isdeploying || self.deployed
    }

    /// Deploy-side state, most advanced marker first.
    pub fn deploy_state(&self) -> Option<DeploymentState> {
        if self.failed {
            Some(DeploymentState::Failed)
        } else if self.deployed {
            Some(DeploymentState::Succeeded)
        } else if self.isdeploying {
            Some(DeploymentState::Claimed)
        } else if self.dodeploy {
            Some(DeploymentState::Requested)
        } else {
            None
        }
    }

    /// Undeploy is complete once the artifact is gone or the watcher left an
    /// `.undeployed` marker with no `.deployed` marker beside it.
    pub fn is_removed(&self) -> bool {
        !self.artifact || (self.undeployed && !self.deployed)
    }

    pub fn is_terminal_deploy(&self) -> bool {
        self.deployed || self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Requested,
    Claimed,
    Succeeded,
    Failed,
    UndeployRequested,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentAction {
    Deploy,
    Undeploy,
}

/// One deploy or undeploy of artifact `name` in `target_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub name: String,
    pub target_dir: PathBuf,
    pub action: DeploymentAction,
}

impl DeploymentRequest {
    pub fn deploy(name: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target_dir: target_dir.into(),
            action: DeploymentAction::Deploy,
        }
    }

    pub fn undeploy(name: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target_dir: target_dir.into(),
            action: DeploymentAction::Undeploy,
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.target_dir.join(&self.name)
    }

    pub fn marker_path(&self, kind: MarkerKind) -> PathBuf {
        self.target_dir.join(kind.file_name(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_file_names() {
        assert_eq!(MarkerKind::DoDeploy.file_name("basic-knob.yml"), "basic-knob.yml.dodeploy");
        assert_eq!(MarkerKind::Undeployed.file_name("app.knob"), "app.knob.undeployed");
    }

    #[test]
    fn failed_wins_over_other_markers() {
        let set = MarkerSet {
            artifact: true,
            dodeploy: true,
            failed: true,
            ..Default::default()
        };
        assert_eq!(set.deploy_state(), Some(DeploymentState::Failed));
    }

    #[test]
    fn removed_when_artifact_missing_or_undeployed() {
        assert!(MarkerSet::default().is_removed());

        let mut set = MarkerSet {
            artifact: true,
            deployed: true,
            ..Default::default()
        };
        assert!(!set.is_removed());

        set.deployed = false;
        set.undeployed = true;
        assert!(set.is_removed());
    }
}
