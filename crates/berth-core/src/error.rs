//! Error types callers are expected to match on.
//!
//! Everything else is reported through `anyhow` with context.

use thiserror::Error;

/// Configuration errors found while resolving an installation order.
/// Raised before any component is installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("declared install order references unknown component '{0}'")]
    UnknownDeclared(String),

    #[error("component '{component}' is pinned after unknown component '{pin}'")]
    UnknownPin { component: String, pin: String },

    #[error("component '{0}' is pinned after itself")]
    SelfPin(String),

    #[error("foundational component '{component}' cannot be pinned after ordinary component '{pin}'")]
    FoundationalAfterOrdinary { component: String, pin: String },

    #[error("pins form a cycle through: {}", .0.join(" -> "))]
    PinCycle(Vec<String>),
}

/// Installer hard failure. Components in `installed` stay installed.
#[derive(Debug, Error)]
#[error("failed to install component '{component}' ({} installed before it)", installed.len())]
pub struct InstallError {
    pub component: String,
    pub installed: Vec<String>,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Install(#[from] InstallError),
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("'{0}' already has a pending or confirmed deployment; undeploy it first")]
    AlreadyRequested(String),

    #[error("failed to write {what} for '{name}' after {attempts} attempt(s)")]
    MarkerWrite {
        name: String,
        what: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}
