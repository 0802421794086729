//! Resolving and executing installation batches.

use berth_core::error::{BatchError, ResolveError};
use berth_core::install::{
    Component, ComponentKind, InstallationBatch, install_batch, install_in_order, resolve,
};

fn names(order: &[Component]) -> Vec<&str> {
    order.iter().map(|c| c.name.as_str()).collect()
}

fn standard_batch() -> InstallationBatch {
    InstallationBatch::new(vec![
        Component::new("jobs", "modules/jobs"),
        Component::new("core", "modules/core").pinned_after(["bootstrap"]),
        Component::new("web", "modules/web"),
        Component::new("bootstrap", "modules/bootstrap"),
    ])
    .with_declared_order(["web", "jobs"])
}

#[test]
fn foundational_then_declared_order() {
    let order = resolve(&standard_batch()).unwrap();
    assert_eq!(names(&order), ["bootstrap", "core", "web", "jobs"]);
}

#[test]
fn resolution_is_deterministic() {
    let batch = standard_batch();
    let first = resolve(&batch).unwrap();
    for _ in 0..10 {
        assert_eq!(resolve(&batch).unwrap(), first);
    }
}

#[test]
fn pins_override_declared_order() {
    let mut batch = standard_batch();
    assert!(batch.add_pins("web", &["jobs".to_string()]));

    let order = resolve(&batch).unwrap();
    assert_eq!(names(&order), ["bootstrap", "core", "jobs", "web"]);
}

#[test]
fn undeclared_components_follow_in_discovery_order() {
    let batch = InstallationBatch::new(vec![
        Component::new("stomp", "a"),
        Component::new("messaging", "b"),
        Component::new("web", "c"),
    ])
    .with_declared_order(["web"]);

    let order = resolve(&batch).unwrap();
    assert_eq!(names(&order), ["web", "stomp", "messaging"]);
}

#[test]
fn unknown_declared_name_fails_fast() {
    let batch = standard_batch().with_declared_order(["web", "cache"]);
    let mut calls = 0;

    let err = install_batch(&batch, &mut |_: &Component| -> anyhow::Result<()> {
        calls += 1;
        Ok(())
    })
    .unwrap_err();

    assert!(matches!(err, BatchError::Resolve(ResolveError::UnknownDeclared(ref n)) if n == "cache"));
    assert_eq!(calls, 0);
}

#[test]
fn invalid_pins_are_rejected() {
    let unknown = InstallationBatch::new(vec![Component::new("web", "w").pinned_after(["cache"])]);
    assert_eq!(
        resolve(&unknown).unwrap_err(),
        ResolveError::UnknownPin {
            component: "web".into(),
            pin: "cache".into()
        }
    );

    let own = InstallationBatch::new(vec![Component::new("web", "w").pinned_after(["web"])]);
    assert_eq!(resolve(&own).unwrap_err(), ResolveError::SelfPin("web".into()));

    let backwards = InstallationBatch::new(vec![
        Component::new("web", "w"),
        Component::new("core", "c").pinned_after(["web"]),
    ]);
    assert!(matches!(
        resolve(&backwards).unwrap_err(),
        ResolveError::FoundationalAfterOrdinary { .. }
    ));
}

#[test]
fn pin_cycle_is_reported() {
    let batch = InstallationBatch::new(vec![
        Component::new("web", "w").pinned_after(["jobs"]),
        Component::new("jobs", "j").pinned_after(["web"]),
        Component::new("stomp", "s"),
    ]);

    match resolve(&batch).unwrap_err() {
        ResolveError::PinCycle(members) => {
            assert!(members.contains(&"web".to_string()));
            assert!(members.contains(&"jobs".to_string()));
            assert!(!members.contains(&"stomp".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicates_keep_first_position_and_last_attributes() {
    let batch = InstallationBatch::new(vec![
        Component::new("web", "old"),
        Component::new("jobs", "j"),
        Component::new("web", "new"),
    ]);

    let order = resolve(&batch).unwrap();
    assert_eq!(names(&order), ["web", "jobs"]);
    assert_eq!(order[0].source, std::path::PathBuf::from("new"));
}

#[test]
fn kind_override_makes_component_foundational() {
    let batch = InstallationBatch::new(vec![
        Component::new("web", "w"),
        Component::new("base", "b").with_kind(ComponentKind::Bootstrap),
    ]);

    let order = resolve(&batch).unwrap();
    assert_eq!(names(&order), ["base", "web"]);
}

#[test]
fn executor_stops_at_first_failure() {
    let order = resolve(&standard_batch()).unwrap();
    let mut attempted = Vec::new();

    let err = install_in_order(&order, &mut |c: &Component| -> anyhow::Result<()> {
        attempted.push(c.name.clone());
        if c.name == "web" {
            anyhow::bail!("disk full");
        }
        Ok(())
    })
    .unwrap_err();

    assert_eq!(err.component, "web");
    assert_eq!(err.installed, ["bootstrap", "core"]);
    assert_eq!(attempted, ["bootstrap", "core", "web"]);
}

#[test]
fn executor_reports_every_installed_component() {
    let order = resolve(&standard_batch()).unwrap();
    let report = install_in_order(&order, &mut |_: &Component| -> anyhow::Result<()> { Ok(()) })
        .unwrap();
    assert_eq!(report.installed, ["bootstrap", "core", "web", "jobs"]);
}
