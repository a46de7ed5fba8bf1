use brood::{
    ChildRef, ChildSpec, ChildType, ExitReason, Options, Parent, RestartIntensity, RestartPolicy,
    Shutdown, StartError,
};
use serde_json::json;
use tokio::time::Duration;

fn idle(id: &str) -> ChildSpec {
    ChildSpec::task(|token| async move {
        token.cancelled().await;
        ExitReason::Normal
    })
    .with_id(id)
}

#[test]
fn test_spec_builder_defaults() {
    let spec = ChildSpec::task(|_token| async { ExitReason::Normal });

    assert_eq!(spec.id(), None);
    assert_eq!(spec.meta(), &serde_json::Value::Null);
    assert_eq!(spec.restart_policy(), RestartPolicy::Permanent);
    assert_eq!(spec.child_type(), ChildType::Worker);
    assert!(spec.modules().is_empty());
    assert_eq!(spec.timeout(), None);
    assert!(spec.binds_to().is_empty());
    assert_eq!(spec.shutdown_group(), None);
    // The shutdown budget is resolved when the child is started
    assert_eq!(spec.shutdown(), None);
}

#[test]
fn test_spec_builder_accessors() {
    let spec = idle("a")
        .with_meta(json!({"k": "v"}))
        .with_restart_policy(RestartPolicy::Transient)
        .with_child_type(ChildType::Supervisor)
        .with_modules(["app", "app_sup"])
        .with_timeout(Duration::from_secs(1))
        .with_bindings(["older"])
        .with_shutdown_group("g");

    assert_eq!(spec.id(), Some("a"));
    assert_eq!(spec.meta(), &json!({"k": "v"}));
    assert_eq!(spec.restart_policy(), RestartPolicy::Transient);
    assert_eq!(spec.child_type(), ChildType::Supervisor);
    assert_eq!(spec.modules(), ["app", "app_sup"]);
    assert_eq!(spec.timeout(), Some(Duration::from_secs(1)));
    assert_eq!(spec.binds_to(), [ChildRef::Id("older".to_string())]);
    assert_eq!(spec.shutdown_group(), Some("g"));
}

#[tokio::test]
async fn test_worker_gets_default_shutdown_budget() {
    let mut parent = Parent::new(Options::default());
    parent.start_child(idle("w")).unwrap();

    let spec = parent
        .get_childspec(&ChildRef::Id("w".to_string()))
        .unwrap();
    assert_eq!(
        spec.shutdown(),
        Some(Shutdown::Timeout(Duration::from_millis(5000)))
    );
}

#[tokio::test]
async fn test_supervisor_gets_infinite_shutdown_budget() {
    let mut parent = Parent::new(Options::default());
    parent
        .start_child(idle("s").with_child_type(ChildType::Supervisor))
        .unwrap();

    let spec = parent
        .get_childspec(&ChildRef::Id("s".to_string()))
        .unwrap();
    assert_eq!(spec.shutdown(), Some(Shutdown::Infinity));
}

#[tokio::test]
async fn test_explicit_shutdown_budget_is_kept() {
    let mut parent = Parent::new(Options::default());
    parent
        .start_child(idle("b").with_shutdown(Shutdown::BrutalKill))
        .unwrap();

    let spec = parent
        .get_childspec(&ChildRef::Id("b".to_string()))
        .unwrap();
    assert_eq!(spec.shutdown(), Some(Shutdown::BrutalKill));
}

#[tokio::test]
async fn test_zero_timeout_is_invalid() {
    let mut parent = Parent::new(Options::default());
    let err = parent
        .start_child(idle("w").with_timeout(Duration::ZERO))
        .unwrap_err();
    assert!(matches!(err, StartError::InvalidChildSpec(_)));
    assert_eq!(parent.num_children(), 0);
}

#[tokio::test]
async fn test_zero_restart_window_is_invalid() {
    let mut parent = Parent::new(Options::default());
    let err = parent
        .start_child(
            idle("w").with_restart_intensity(RestartIntensity::new(3, Duration::ZERO)),
        )
        .unwrap_err();
    assert!(matches!(err, StartError::InvalidChildSpec(_)));
}

#[test]
fn test_spec_debug_skips_start_function() {
    let spec = idle("a").with_shutdown_group("g");
    let rendered = format!("{:?}", spec);
    assert!(rendered.contains("ChildSpec"));
    assert!(rendered.contains("\"a\""));
    assert!(rendered.contains("\"g\""));
}

#[tokio::test]
async fn test_anonymous_children_are_reachable_by_pid() {
    let mut parent = Parent::new(Options::default());
    let pid = parent
        .start_child(ChildSpec::task(|token| async move {
            token.cancelled().await;
            ExitReason::Normal
        }))
        .unwrap()
        .unwrap();

    assert!(parent.is_child(&ChildRef::Pid(pid)));
    assert_eq!(parent.child_id(pid), None);

    let stopped = parent.shutdown_child(&ChildRef::Pid(pid)).await.unwrap();
    assert_eq!(stopped.ids(), [ChildRef::Pid(pid)]);
}
