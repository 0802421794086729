//! Ordered component installation.

pub mod component;
pub mod discover;
pub mod executor;
pub mod resolver;

pub use component::{Component, ComponentKind, InstallationBatch};
pub use discover::discover_components;
pub use executor::{InstallReport, Installer, install_batch, install_in_order};
pub use resolver::resolve;
