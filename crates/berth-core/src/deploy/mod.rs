//! Application deployment: descriptors, archives and the deployment client.

pub mod archive;
pub mod client;
pub mod descriptor;

pub use archive::{ArchiveOptions, ArchiveReport, create_archive};
pub use client::DeploymentClient;
pub use descriptor::{AppDeployment, DeploymentDescriptor, app_name_from_root};
