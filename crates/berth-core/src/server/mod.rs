//! Managed server lifecycle over a remote management channel.

pub mod http;
pub mod lifecycle;

use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

pub use http::HttpManagementChannel;
pub use lifecycle::{LifecycleReport, ServerLifecycleClient};

pub const STATUS_STARTED: &str = "STARTED";
pub const STATUS_STOPPED: &str = "STOPPED";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressSegment {
    pub key: String,
    pub value: String,
}

/// Ordered key/value path scoping a management operation, e.g.
/// `host=master / server-config=server-one`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(Vec<AddressSegment>);

impl Address {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push(AddressSegment {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Address of a server configuration on a host controller.
    pub fn server_config(host: &str, server_id: &str) -> Self {
        Self::new().push("host", host).push("server-config", server_id)
    }

    pub fn segments(&self) -> &[AddressSegment] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{}={}", segment.key, segment.value)?;
        }
        Ok(())
    }
}

/// Remote management collaborator. Transport is up to the implementation.
pub trait ManagementChannel: Debug + Send + Sync {
    /// Current status string of the resource at `address`.
    fn query(&self, address: &Address) -> anyhow::Result<String>;

    /// Run `operation` on `address`. An `Err` is a refused command.
    fn command(&self, operation: &str, address: &Address) -> anyhow::Result<()>;
}
