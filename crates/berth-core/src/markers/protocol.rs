//! Requester side of the marker protocol.
//!
//! Deploy: `REQUESTED -> CLAIMED -> SUCCEEDED | FAILED`.
//! Undeploy: `UNDEPLOY_REQUESTED -> REMOVED`.
//! The watcher owns every transition after the request; this side only
//! writes the request and observes.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::DeployError;
use crate::outcome::{Outcome, serialize_millis};
use crate::poll::{ConditionPoller, PollResult, PollSettings};

use super::{
    DeploymentAction, DeploymentRequest, DeploymentState, FsMarkerStore, MarkerKind, MarkerSet,
    MarkerStore,
};

pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    pub name: String,
    pub action: DeploymentAction,
    pub outcome: Outcome,
    /// Last state observed before returning.
    pub state: Option<DeploymentState>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct DeploymentMarkerProtocol {
    store: Arc<dyn MarkerStore>,
    poll: PollSettings,
    write_attempts: u32,
}

impl DeploymentMarkerProtocol {
    pub fn new(store: Arc<dyn MarkerStore>, poll: PollSettings) -> Self {
        Self {
            store,
            poll,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
        }
    }

    pub fn on_filesystem(poll: PollSettings) -> Self {
        Self::new(Arc::new(FsMarkerStore::new()), poll)
    }

    /// Attempts per local write. Clamped to at least one.
    pub fn with_write_attempts(mut self, attempts: u32) -> Self {
        self.write_attempts = attempts.max(1);
        self
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    pub fn observe(&self, req: &DeploymentRequest) -> io::Result<MarkerSet> {
        self.store.observe(&req.target_dir, &req.name)
    }

    /// Dispatch on `req.action`. `content` is ignored for undeploy.
    pub fn run(
        &self,
        req: &DeploymentRequest,
        content: &[u8],
    ) -> Result<DeploymentReport, DeployError> {
        match req.action {
            DeploymentAction::Deploy => self.deploy(req, content),
            DeploymentAction::Undeploy => self.undeploy(req),
        }
    }

    /// Write the artifact and its `.dodeploy` marker, then wait for the
    /// watcher to write `.deployed` or `.failed`.
    ///
    /// Stale `.failed`/`.undeployed` markers from an earlier run are cleared
    /// first. Failing to write the request is returned as an error without
    /// polling.
    pub fn deploy(
        &self,
        req: &DeploymentRequest,
        content: &[u8],
    ) -> Result<DeploymentReport, DeployError> {
        let dir = &req.target_dir;
        let name = req.name.as_str();

        for stale in [MarkerKind::Failed, MarkerKind::Undeployed] {
            self.retry(name, stale.suffix(), || {
                self.store.remove_marker(dir, name, stale)
            })?;
        }
        self.retry(name, "artifact", || {
            self.store.write_artifact(dir, name, content)
        })?;
        self.retry(name, MarkerKind::DoDeploy.suffix(), || {
            self.store.create_marker(dir, name, MarkerKind::DoDeploy)
        })?;
        tracing::info!(artifact = name, dir = %dir.display(), "deployment requested");

        let result = ConditionPoller::new(self.poll).wait_for(
            || Ok(self.store.observe(dir, name)?),
            MarkerSet::is_terminal_deploy,
        );

        let report = match result {
            PollResult::Satisfied { value, elapsed } => {
                let (outcome, state) = if value.failed {
                    (Outcome::Failed, DeploymentState::Failed)
                } else {
                    (Outcome::Confirmed, DeploymentState::Succeeded)
                };
                tracing::info!(artifact = name, ?state, ?elapsed, "deployment finished");
                self.report(req, outcome, Some(state), elapsed)
            }
            PollResult::TimedOut { elapsed, last } => {
                let state = last
                    .and_then(|set| set.deploy_state())
                    .unwrap_or(DeploymentState::Requested);
                tracing::warn!(
                    artifact = name,
                    ?state,
                    ?elapsed,
                    "watcher did not finish deployment in time"
                );
                self.report(req, Outcome::TimedOutUnknown, Some(state), elapsed)
            }
        };
        Ok(report)
    }

    /// Withdraw or reverse a deployment and wait for the artifact to go.
    ///
    /// A confirmed deployment is undeployed by deleting its `.deployed`
    /// marker; the watcher then removes the artifact (or leaves
    /// `.undeployed`). A request that never reached `.deployed` is withdrawn
    /// here by deleting `.dodeploy`, `.failed` and the artifact.
    ///
    /// A request the watcher has claimed (`.isdeploying`) is left alone until
    /// the watcher finishes it; the artifact is never pulled out from under a
    /// running deployment. If the claim outlasts the timeout nothing is
    /// removed and the report is [`Outcome::TimedOutUnknown`] in
    /// [`DeploymentState::Claimed`].
    pub fn undeploy(&self, req: &DeploymentRequest) -> Result<DeploymentReport, DeployError> {
        let dir = &req.target_dir;
        let name = req.name.as_str();

        let mut current = self.retry(name, "marker state", || self.store.observe(dir, name))?;
        let mut claim_wait = Duration::ZERO;
        if current.isdeploying && !current.is_terminal_deploy() {
            tracing::info!(artifact = name, "deployment in progress, waiting for watcher");
            let claim = ConditionPoller::new(self.poll).wait_for(
                || Ok(self.store.observe(dir, name)?),
                |set: &MarkerSet| !set.isdeploying || set.is_terminal_deploy(),
            );
            match claim {
                PollResult::Satisfied { value, elapsed } => {
                    current = value;
                    claim_wait = elapsed;
                }
                PollResult::TimedOut { elapsed, .. } => {
                    tracing::warn!(
                        artifact = name,
                        ?elapsed,
                        "watcher still deploying after timeout, nothing removed"
                    );
                    return Ok(self.report(
                        req,
                        Outcome::TimedOutUnknown,
                        Some(DeploymentState::Claimed),
                        elapsed,
                    ));
                }
            }
        }

        if current.deployed {
            for kind in [
                MarkerKind::Undeployed,
                MarkerKind::DoDeploy,
                MarkerKind::Deployed,
            ] {
                self.retry(name, kind.suffix(), || {
                    self.store.remove_marker(dir, name, kind)
                })?;
            }
            tracing::info!(artifact = name, "undeploy requested from watcher");
        } else {
            for kind in [
                MarkerKind::DoDeploy,
                MarkerKind::IsDeploying,
                MarkerKind::Failed,
            ] {
                self.retry(name, kind.suffix(), || {
                    self.store.remove_marker(dir, name, kind)
                })?;
            }
            self.retry(name, "artifact", || self.store.remove_artifact(dir, name))?;
            tracing::info!(artifact = name, "withdrew unconfirmed deployment");
        }

        let result = ConditionPoller::new(self.poll).wait_for(
            || Ok(self.store.observe(dir, name)?),
            MarkerSet::is_removed,
        );

        let report = match result {
            PollResult::Satisfied { elapsed, .. } => {
                let elapsed = claim_wait + elapsed;
                tracing::info!(artifact = name, ?elapsed, "undeployed");
                self.report(req, Outcome::Confirmed, Some(DeploymentState::Removed), elapsed)
            }
            PollResult::TimedOut { elapsed, .. } => {
                let elapsed = claim_wait + elapsed;
                tracing::warn!(artifact = name, ?elapsed, "artifact still present after timeout");
                self.report(
                    req,
                    Outcome::TimedOutUnknown,
                    Some(DeploymentState::UndeployRequested),
                    elapsed,
                )
            }
        };
        Ok(report)
    }

    fn report(
        &self,
        req: &DeploymentRequest,
        outcome: Outcome,
        state: Option<DeploymentState>,
        elapsed: Duration,
    ) -> DeploymentReport {
        DeploymentReport {
            name: req.name.clone(),
            action: req.action,
            outcome,
            state,
            elapsed,
        }
    }

    /// Local writes are retried immediately, without backoff.
    fn retry<T>(
        &self,
        name: &str,
        what: &str,
        mut op: impl FnMut() -> io::Result<T>,
    ) -> Result<T, DeployError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.write_attempts => {
                    tracing::warn!(artifact = name, what, attempt, error = %err, "retrying local write");
                }
                Err(source) => {
                    return Err(DeployError::MarkerWrite {
                        name: name.to_string(),
                        what: what.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}
