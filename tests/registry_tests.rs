use brood::{ChildRef, ChildSpec, ExitReason, Options, Parent, StartOutcome};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};

fn idle(id: &str) -> ChildSpec {
    ChildSpec::task(|token| async move {
        token.cancelled().await;
        ExitReason::Normal
    })
    .with_id(id)
}

fn with_registry() -> Parent {
    Parent::new(Options {
        registry_enabled: true,
        max_restarts: Some(10),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_registry_disabled_by_default() {
    let parent = Parent::new(Options::default());
    assert!(parent.registry().is_none());
}

#[tokio::test]
async fn test_registry_mirrors_started_children() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();

    let pid = parent
        .start_child(idle("a").with_meta(json!({"role": "cache"})))
        .unwrap()
        .unwrap();

    assert_eq!(registry.child_pid("a"), Some(pid));
    assert_eq!(registry.child_id(pid), Some("a".to_string()));
    assert_eq!(registry.child_meta(pid), Some(json!({"role": "cache"})));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_registry_skips_ignored_children() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();

    parent
        .start_child(ChildSpec::new(|_token| StartOutcome::Ignore).with_id("q"))
        .unwrap();

    assert!(registry.is_empty());
    assert_eq!(registry.child_pid("q"), None);
}

#[tokio::test]
async fn test_registry_tracks_meta_updates() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();

    let pid = parent
        .start_child(idle("a").with_meta(json!(1)))
        .unwrap()
        .unwrap();
    parent
        .update_child_meta(&ChildRef::Id("a".to_string()), |_| json!(2))
        .unwrap();

    assert_eq!(registry.child_meta(pid), Some(json!(2)));
}

#[tokio::test]
async fn test_registry_drops_stopped_children() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();

    let pid = parent.start_child(idle("a")).unwrap().unwrap();
    parent
        .shutdown_child(&ChildRef::Id("a".to_string()))
        .await
        .unwrap();

    assert!(registry.is_empty());
    assert_eq!(registry.child_pid("a"), None);
    assert_eq!(registry.child_id(pid), None);
}

#[tokio::test]
async fn test_registry_follows_restarts() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();
    let crash = Arc::new(Notify::new());

    let trigger = Arc::clone(&crash);
    let old_pid = parent
        .start_child(
            ChildSpec::task(move |token| {
                let trigger = Arc::clone(&trigger);
                async move {
                    tokio::select! {
                        _ = token.cancelled() => ExitReason::Normal,
                        _ = trigger.notified() => ExitReason::Failure("crashed".to_string()),
                    }
                }
            })
            .with_id("a"),
        )
        .unwrap()
        .unwrap();

    crash.notify_one();
    let msg = timeout(Duration::from_secs(1), parent.recv())
        .await
        .unwrap()
        .unwrap();
    parent.handle_message(msg).await.unwrap();

    let new_pid = registry.child_pid("a").expect("a restarted");
    assert_ne!(new_pid, old_pid);
    assert_eq!(registry.child_id(old_pid), None);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_registry_is_emptied_by_shutdown_all() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();

    parent.start_child(idle("a")).unwrap();
    parent.start_child(idle("b")).unwrap();
    assert_eq!(registry.len(), 2);

    parent.shutdown_all(ExitReason::Shutdown).await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_readable_from_other_tasks() {
    let mut parent = with_registry();
    let registry = parent.registry().unwrap();

    let pid = parent.start_child(idle("a")).unwrap().unwrap();

    let reader = tokio::spawn(async move {
        // Readers never contact the owner; they tolerate staleness
        registry.child_pid("a")
    });
    assert_eq!(reader.await.unwrap(), Some(pid));

    let entries = parent.registry().unwrap().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, pid);
    assert_eq!(entries[0].1.id.as_deref(), Some("a"));
}
