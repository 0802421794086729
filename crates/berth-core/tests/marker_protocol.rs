//! Marker protocol against a real directory, with a simulated watcher
//! running on a background thread.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use berth_core::config::DeployConfig;
use berth_core::deploy::DeploymentClient;
use berth_core::error::DeployError;
use berth_core::markers::{
    DeploymentMarkerProtocol, DeploymentRequest, DeploymentState, FsMarkerStore, MarkerKind,
    MarkerSet, MarkerStore,
};
use berth_core::outcome::Outcome;
use berth_core::poll::PollSettings;
use tempfile::TempDir;

const APP: &str = "demo-knob.yml";

fn protocol(timeout_ms: u64, interval_ms: u64) -> DeploymentMarkerProtocol {
    DeploymentMarkerProtocol::on_filesystem(PollSettings::new(
        Duration::from_millis(timeout_ms),
        Duration::from_millis(interval_ms),
    ))
}

fn marker(dir: &Path, kind: MarkerKind) -> PathBuf {
    dir.join(kind.file_name(APP))
}

/// Wait for `.dodeploy`, then claim it and finish with `result`.
fn spawn_watcher(dir: PathBuf, delay: Duration, result: MarkerKind) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !marker(&dir, MarkerKind::DoDeploy).exists() {
            thread::sleep(Duration::from_millis(5));
        }
        std::fs::remove_file(marker(&dir, MarkerKind::DoDeploy)).unwrap();
        std::fs::write(marker(&dir, MarkerKind::IsDeploying), b"").unwrap();
        thread::sleep(delay);
        std::fs::remove_file(marker(&dir, MarkerKind::IsDeploying)).unwrap();
        std::fs::write(marker(&dir, result), b"").unwrap();
    })
}

#[test]
fn deploy_confirmed_when_watcher_writes_deployed() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let watcher = spawn_watcher(dir.clone(), Duration::from_millis(200), MarkerKind::Deployed);

    let report = protocol(2_000, 50)
        .deploy(&DeploymentRequest::deploy(APP, &dir), b"application: {}")
        .unwrap();
    watcher.join().unwrap();

    assert_eq!(report.outcome, Outcome::Confirmed);
    assert_eq!(report.state, Some(DeploymentState::Succeeded));
    assert!(report.elapsed >= Duration::from_millis(150), "{:?}", report.elapsed);
    assert!(report.elapsed < Duration::from_millis(1_000), "{:?}", report.elapsed);
    assert_eq!(std::fs::read(dir.join(APP)).unwrap(), b"application: {}");
}

#[test]
fn deploy_failed_when_watcher_writes_failed() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let watcher = spawn_watcher(dir.clone(), Duration::from_millis(20), MarkerKind::Failed);

    let report = protocol(2_000, 20)
        .deploy(&DeploymentRequest::deploy(APP, &dir), b"")
        .unwrap();
    watcher.join().unwrap();

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.state, Some(DeploymentState::Failed));
}

#[test]
fn deploy_times_out_when_no_watcher_runs() {
    let temp = TempDir::new().unwrap();

    let report = protocol(300, 100)
        .deploy(&DeploymentRequest::deploy(APP, temp.path()), b"")
        .unwrap();

    assert_eq!(report.outcome, Outcome::TimedOutUnknown);
    assert_eq!(report.state, Some(DeploymentState::Requested));
    assert!(report.elapsed >= Duration::from_millis(300));
    assert!(report.elapsed < Duration::from_millis(300 + 100 + 150));
    assert!(marker(temp.path(), MarkerKind::DoDeploy).exists());
}

#[test]
fn deploy_clears_stale_markers() {
    let temp = TempDir::new().unwrap();
    std::fs::write(marker(temp.path(), MarkerKind::Failed), b"").unwrap();
    std::fs::write(marker(temp.path(), MarkerKind::Undeployed), b"").unwrap();

    let report = protocol(100, 50)
        .deploy(&DeploymentRequest::deploy(APP, temp.path()), b"")
        .unwrap();

    // A stale .failed left in place would have been read as this run's result.
    assert_eq!(report.outcome, Outcome::TimedOutUnknown);
    assert!(!marker(temp.path(), MarkerKind::Failed).exists());
    assert!(!marker(temp.path(), MarkerKind::Undeployed).exists());
}

#[test]
fn undeploy_confirmed_when_watcher_removes_artifact() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    std::fs::write(dir.join(APP), b"").unwrap();
    std::fs::write(marker(&dir, MarkerKind::Deployed), b"").unwrap();

    let watcher = {
        let dir = dir.clone();
        thread::spawn(move || {
            while marker(&dir, MarkerKind::Deployed).exists() {
                thread::sleep(Duration::from_millis(5));
            }
            thread::sleep(Duration::from_millis(50));
            std::fs::remove_file(dir.join(APP)).unwrap();
        })
    };

    let report = protocol(2_000, 20)
        .undeploy(&DeploymentRequest::undeploy(APP, &dir))
        .unwrap();
    watcher.join().unwrap();

    assert_eq!(report.outcome, Outcome::Confirmed);
    assert_eq!(report.state, Some(DeploymentState::Removed));
}

#[test]
fn undeploy_confirmed_when_watcher_leaves_undeployed_marker() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    std::fs::write(dir.join(APP), b"").unwrap();
    std::fs::write(marker(&dir, MarkerKind::Deployed), b"").unwrap();

    let watcher = {
        let dir = dir.clone();
        thread::spawn(move || {
            while marker(&dir, MarkerKind::Deployed).exists() {
                thread::sleep(Duration::from_millis(5));
            }
            std::fs::write(marker(&dir, MarkerKind::Undeployed), b"").unwrap();
        })
    };

    let report = protocol(2_000, 20)
        .undeploy(&DeploymentRequest::undeploy(APP, &dir))
        .unwrap();
    watcher.join().unwrap();

    assert_eq!(report.outcome, Outcome::Confirmed);
    assert!(dir.join(APP).exists());
}

#[test]
fn undeploy_times_out_while_artifact_remains() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(APP), b"").unwrap();
    std::fs::write(marker(temp.path(), MarkerKind::Deployed), b"").unwrap();

    let report = protocol(200, 50)
        .undeploy(&DeploymentRequest::undeploy(APP, temp.path()))
        .unwrap();

    assert_eq!(report.outcome, Outcome::TimedOutUnknown);
    assert_eq!(report.state, Some(DeploymentState::UndeployRequested));
    assert!(!marker(temp.path(), MarkerKind::Deployed).exists());
}

#[test]
fn undeploy_withdraws_unclaimed_request() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(APP), b"").unwrap();
    std::fs::write(marker(temp.path(), MarkerKind::DoDeploy), b"").unwrap();

    let report = protocol(500, 50)
        .undeploy(&DeploymentRequest::undeploy(APP, temp.path()))
        .unwrap();

    assert_eq!(report.outcome, Outcome::Confirmed);
    assert!(report.elapsed < Duration::from_millis(200));
    assert!(!temp.path().join(APP).exists());
    assert!(!marker(temp.path(), MarkerKind::DoDeploy).exists());
}

#[test]
fn undeploy_waits_for_claimed_deployment_to_finish() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    std::fs::write(dir.join(APP), b"").unwrap();
    std::fs::write(marker(&dir, MarkerKind::IsDeploying), b"").unwrap();

    let watcher = {
        let dir = dir.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            std::fs::remove_file(marker(&dir, MarkerKind::IsDeploying)).unwrap();
            std::fs::write(marker(&dir, MarkerKind::Deployed), b"").unwrap();
            while marker(&dir, MarkerKind::Deployed).exists() {
                thread::sleep(Duration::from_millis(5));
            }
            std::fs::remove_file(dir.join(APP)).unwrap();
        })
    };

    let protocol = protocol(2_000, 20);
    let report = protocol
        .undeploy(&DeploymentRequest::undeploy(APP, &dir))
        .unwrap();
    watcher.join().unwrap();

    assert_eq!(report.outcome, Outcome::Confirmed);
    assert!(report.elapsed >= Duration::from_millis(80), "{:?}", report.elapsed);
    let after = protocol
        .observe(&DeploymentRequest::deploy(APP, &dir))
        .unwrap();
    assert!(!after.is_active(), "{after:?}");
}

#[test]
fn undeploy_leaves_claimed_artifact_when_watcher_never_finishes() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(APP), b"").unwrap();
    std::fs::write(marker(temp.path(), MarkerKind::IsDeploying), b"").unwrap();

    let report = protocol(200, 50)
        .undeploy(&DeploymentRequest::undeploy(APP, temp.path()))
        .unwrap();

    assert_eq!(report.outcome, Outcome::TimedOutUnknown);
    assert_eq!(report.state, Some(DeploymentState::Claimed));
    assert!(temp.path().join(APP).exists());
    assert!(marker(temp.path(), MarkerKind::IsDeploying).exists());
}

#[test]
fn undeploy_of_failed_claim_allows_redeploy() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    std::fs::write(dir.join(APP), b"").unwrap();
    std::fs::write(marker(&dir, MarkerKind::IsDeploying), b"").unwrap();
    std::fs::write(marker(&dir, MarkerKind::Failed), b"").unwrap();

    let config = DeployConfig {
        timeout_secs: 1,
        interval_secs: 1,
        ..Default::default()
    };
    let client = DeploymentClient::new(&config, dir.clone());

    let report = client.undeploy(APP).unwrap();
    assert_eq!(report.outcome, Outcome::Confirmed);
    assert!(!marker(&dir, MarkerKind::IsDeploying).exists());

    let redeploy = client.deploy(APP, b"").unwrap();
    assert_eq!(redeploy.outcome, Outcome::TimedOutUnknown);
}

/// Fails the first `failures` marker writes, then delegates to the filesystem.
#[derive(Debug)]
struct FlakyStore {
    inner: FsMarkerStore,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32) -> Self {
        Self {
            inner: FsMarkerStore::new(),
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

impl MarkerStore for FlakyStore {
    fn write_artifact(&self, dir: &Path, name: &str, content: &[u8]) -> io::Result<()> {
        self.inner.write_artifact(dir, name, content)
    }

    fn remove_artifact(&self, dir: &Path, name: &str) -> io::Result<bool> {
        self.inner.remove_artifact(dir, name)
    }

    fn create_marker(&self, dir: &Path, name: &str, kind: MarkerKind) -> io::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(io::Error::other("disk busy"));
        }
        self.inner.create_marker(dir, name, kind)
    }

    fn remove_marker(&self, dir: &Path, name: &str, kind: MarkerKind) -> io::Result<bool> {
        self.inner.remove_marker(dir, name, kind)
    }

    fn observe(&self, dir: &Path, name: &str) -> io::Result<MarkerSet> {
        self.inner.observe(dir, name)
    }
}

#[test]
fn marker_write_is_retried() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::new(2));
    let protocol = DeploymentMarkerProtocol::new(
        store.clone(),
        PollSettings::new(Duration::from_millis(50), Duration::from_millis(10)),
    )
    .with_write_attempts(3);

    let report = protocol
        .deploy(&DeploymentRequest::deploy(APP, temp.path()), b"")
        .unwrap();

    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.outcome, Outcome::TimedOutUnknown);
    assert!(marker(temp.path(), MarkerKind::DoDeploy).exists());
}

#[test]
fn exhausted_write_retries_fail_without_polling() {
    let temp = TempDir::new().unwrap();
    let protocol = DeploymentMarkerProtocol::new(
        Arc::new(FlakyStore::new(5)),
        PollSettings::new(Duration::from_secs(30), Duration::from_secs(1)),
    )
    .with_write_attempts(2);

    let err = protocol
        .deploy(&DeploymentRequest::deploy(APP, temp.path()), b"")
        .unwrap_err();

    match err {
        DeployError::MarkerWrite { name, attempts, .. } => {
            assert_eq!(name, APP);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}
