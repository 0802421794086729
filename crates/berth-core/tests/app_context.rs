use std::path::{Path, PathBuf};

use berth_core::config::BerthConfig;
use berth_core::context::AppContext;

#[test]
fn deployment_client_uses_runtime_layout_by_default() {
    let mut config = BerthConfig::new();
    config.assembly.build_dir = PathBuf::from("/opt/stage");
    let ctx = AppContext::new(config, PathBuf::from("/work"));

    assert_eq!(
        ctx.deployment_client().deploy_dir(),
        Path::new("/opt/stage/runtime/standalone/deployments")
    );
}

#[test]
fn explicit_deploy_dir_wins() {
    let mut config = BerthConfig::new();
    config.deploy.dir = Some(PathBuf::from("/srv/deployments"));
    let ctx = AppContext::new(config, PathBuf::from("/work"));

    assert_eq!(ctx.deployment_client().deploy_dir(), Path::new("/srv/deployments"));
}

#[test]
fn relative_paths_resolve_against_work_dir() {
    let ctx = AppContext::new(BerthConfig::new(), PathBuf::from("/work"));

    assert_eq!(ctx.resolve_path(Path::new("apps/basic")), Path::new("/work/apps/basic"));
    assert_eq!(ctx.resolve_path(Path::new("/abs")), Path::new("/abs"));
}

#[test]
fn lifecycle_client_rejects_bad_endpoint() {
    let mut config = BerthConfig::new();
    config.server.endpoint = "::not a url".to_string();
    let ctx = AppContext::new(config, PathBuf::from("/work"));

    assert!(ctx.lifecycle_client().is_err());
}
