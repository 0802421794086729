//! Configuration loaded from berth.toml
//!
//! Loaded once by the frontend and handed to each client as a value;
//! library code never reads configuration from the environment.

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_berth_toml, parse_berth_toml_str, to_toml};
pub use schema::{
    AssemblyConfig, BerthConfig, ComponentConfigEntry, DeployConfig, DistributionEntry,
    InstallConfig, ServerConfig,
};
pub use store::{CONFIG_FILE_NAME, ConfigStore};
