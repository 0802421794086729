//! Start and stop managed servers and wait for their status.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::ServerConfig;
use crate::outcome::{Outcome, serialize_millis};
use crate::poll::{ConditionPoller, PollResult, PollSettings};

use super::{Address, ManagementChannel, STATUS_STARTED, STATUS_STOPPED};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub server: String,
    pub expected: String,
    /// Last status read, if any read succeeded
    pub observed: Option<String>,
    pub outcome: Outcome,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Why the command was refused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerLifecycleClient {
    channel: Arc<dyn ManagementChannel>,
    host: String,
    poll: PollSettings,
}

impl ServerLifecycleClient {
    pub fn new(config: &ServerConfig, channel: Arc<dyn ManagementChannel>) -> Self {
        Self {
            channel,
            host: config.host.clone(),
            poll: config.poll_settings(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn address(&self, server_id: &str) -> Address {
        Address::server_config(&self.host, server_id)
    }

    /// One status read, errors propagated.
    pub fn status(&self, server_id: &str) -> anyhow::Result<String> {
        self.channel.query(&self.address(server_id))
    }

    pub fn start(&self, server_id: &str) -> LifecycleReport {
        self.run("start", server_id, STATUS_STARTED)
    }

    pub fn stop(&self, server_id: &str) -> LifecycleReport {
        self.run("stop", server_id, STATUS_STOPPED)
    }

    /// Poll until the server reports `expected` or `timeout` elapses.
    /// Failed reads count as "not yet".
    pub fn wait_for_status(
        &self,
        server_id: &str,
        expected: &str,
        timeout: Duration,
    ) -> LifecycleReport {
        let address = self.address(server_id);
        let poller = ConditionPoller::new(self.poll.with_timeout(timeout));
        let result = poller.wait_for(|| self.channel.query(&address), |status| status == expected);

        match result {
            PollResult::Satisfied { value, elapsed } => {
                tracing::info!(server = server_id, status = %value, ?elapsed, "server reached status");
                self.report(server_id, expected, Some(value), Outcome::Confirmed, elapsed)
            }
            PollResult::TimedOut { elapsed, last } => {
                tracing::warn!(
                    server = server_id,
                    expected,
                    observed = ?last,
                    ?elapsed,
                    "server did not reach status in time"
                );
                self.report(server_id, expected, last, Outcome::TimedOutUnknown, elapsed)
            }
        }
    }

    fn run(&self, operation: &str, server_id: &str, expected: &str) -> LifecycleReport {
        let address = self.address(server_id);
        tracing::info!(server = server_id, operation, %address, "sending server command");
        if let Err(err) = self.channel.command(operation, &address) {
            tracing::warn!(server = server_id, operation, error = %err, "server command refused");
            let mut report =
                self.report(server_id, expected, None, Outcome::Failed, Duration::ZERO);
            report.error = Some(format!("{err:#}"));
            return report;
        }
        self.wait_for_status(server_id, expected, self.poll.timeout)
    }

    fn report(
        &self,
        server_id: &str,
        expected: &str,
        observed: Option<String>,
        outcome: Outcome,
        elapsed: Duration,
    ) -> LifecycleReport {
        LifecycleReport {
            server: server_id.to_string(),
            expected: expected.to_string(),
            observed,
            outcome,
            elapsed,
            error: None,
        }
    }
}
