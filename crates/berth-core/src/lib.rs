//! Berth Core Library
//!
//! Packages a runtime from prebuilt artifacts and drives deployments to a
//! known state: ordered component installation, a marker-file deployment
//! protocol, and polling readiness checks for applications and servers.

pub mod assembly;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod install;
pub mod markers;
pub mod outcome;
pub mod poll;
pub mod server;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{BerthConfig, ConfigStore, DeployConfig, ServerConfig};
    pub use crate::context::AppContext;

    // Polling and outcomes
    pub use crate::outcome::Outcome;
    pub use crate::poll::{ConditionPoller, PollResult, PollSettings};

    // Deployment
    pub use crate::deploy::{AppDeployment, ArchiveOptions, DeploymentClient};
    pub use crate::markers::{
        DeploymentMarkerProtocol, DeploymentReport, DeploymentRequest, DeploymentState,
        MarkerKind, MarkerSet, MarkerStore,
    };

    // Installation
    pub use crate::assembly::{Assembler, ArchiveOps};
    pub use crate::install::{Component, ComponentKind, InstallationBatch, Installer, resolve};

    // Servers
    pub use crate::server::{Address, LifecycleReport, ManagementChannel, ServerLifecycleClient};

    // Errors
    pub use crate::error::{DeployError, InstallError, ResolveError};
}
