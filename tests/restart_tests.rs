use brood::{
    ChildSpec, ExitReason, Options, Parent, ParentError, RestartIntensity, RestartPolicy,
    StartOutcome,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// Child whose body fails as soon as it is polled
fn crash_loop(id: &str, starts: &Arc<AtomicU32>) -> ChildSpec {
    let counter = Arc::clone(starts);
    ChildSpec::new(move |_token| {
        counter.fetch_add(1, Ordering::SeqCst);
        StartOutcome::Run(Box::pin(async {
            ExitReason::Failure("intentional failure".to_string())
        }))
    })
    .with_id(id)
}

async fn handle_next(parent: &mut Parent) -> Result<(), ParentError> {
    let msg = timeout(Duration::from_secs(1), parent.recv())
        .await
        .expect("timed out waiting for a mailbox message")
        .expect("mailbox closed");
    parent.handle_message(msg).await.map(|_| ())
}

#[test]
fn test_restart_policy_default() {
    assert_eq!(RestartPolicy::default(), RestartPolicy::Permanent);
}

#[test]
fn test_restart_policy_equality() {
    assert_eq!(RestartPolicy::Permanent, RestartPolicy::Permanent);
    assert_ne!(RestartPolicy::Permanent, RestartPolicy::Temporary);
    assert_ne!(RestartPolicy::Transient, RestartPolicy::WithDep);
}

#[test]
fn test_restart_intensity_default() {
    let intensity = RestartIntensity::default();
    assert_eq!(intensity.max_restarts, Some(3));
    assert_eq!(intensity.within, Duration::from_secs(5));
}

#[test]
fn test_restart_intensity_constructors() {
    let bounded = RestartIntensity::new(10, Duration::from_secs(30));
    assert_eq!(bounded.max_restarts, Some(10));
    assert_eq!(bounded.within, Duration::from_secs(30));

    let unlimited = RestartIntensity::unlimited(Duration::from_secs(5));
    assert_eq!(unlimited.max_restarts, None);
}

#[tokio::test]
async fn test_zero_ceiling_trips_on_first_restart() {
    let mut parent = Parent::new(Options {
        max_restarts: Some(0),
        ..Default::default()
    });
    let starts = Arc::new(AtomicU32::new(0));
    parent.start_child(crash_loop("r", &starts)).unwrap();

    let err = handle_next(&mut parent).await.unwrap_err();
    assert_eq!(
        err,
        ParentError::RestartLimitExceeded {
            reason: ExitReason::ReachedMaxRestartIntensity,
        }
    );
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unlimited_ceiling_allows_repeated_restarts() {
    let mut parent = Parent::new(Options {
        max_restarts: None,
        ..Default::default()
    });
    let starts = Arc::new(AtomicU32::new(0));
    parent.start_child(crash_loop("r", &starts)).unwrap();

    for _ in 0..5 {
        handle_next(&mut parent).await.unwrap();
    }

    assert_eq!(starts.load(Ordering::SeqCst), 6);
    assert_eq!(parent.num_children(), 1);

    // Teardown drains the in-flight exit of the last incarnation
    parent.shutdown_all(ExitReason::Shutdown).await;
    assert!(timeout(Duration::from_millis(100), parent.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_per_child_ceiling_escalates_with_shutdown_reason() {
    let mut parent = Parent::new(Options {
        max_restarts: None,
        ..Default::default()
    });
    let starts = Arc::new(AtomicU32::new(0));
    parent
        .start_child(
            crash_loop("r", &starts)
                .with_restart_intensity(RestartIntensity::new(1, Duration::from_secs(5))),
        )
        .unwrap();

    // First restart fits the per-child ceiling of 1, the second trips it
    handle_next(&mut parent).await.unwrap();
    let err = handle_next(&mut parent).await.unwrap_err();

    assert_eq!(
        err,
        ParentError::RestartLimitExceeded {
            reason: ExitReason::Shutdown,
        }
    );
    assert_eq!(parent.num_children(), 0);
}

#[tokio::test]
async fn test_transient_child_restarts_only_on_abnormal_exit() {
    let mut parent = Parent::new(Options {
        max_restarts: Some(10),
        ..Default::default()
    });
    let starts = Arc::new(AtomicU32::new(0));

    // Abnormal exit: transient restarts
    parent
        .start_child(crash_loop("t", &starts).with_restart_policy(RestartPolicy::Transient))
        .unwrap();
    handle_next(&mut parent).await.unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(parent.num_children(), 1);

    parent.shutdown_all(ExitReason::Shutdown).await;

    // Normal exit: transient does not restart
    let normal_starts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&normal_starts);
    parent
        .start_child(
            ChildSpec::new(move |_token| {
                counter.fetch_add(1, Ordering::SeqCst);
                StartOutcome::Run(Box::pin(async { ExitReason::Normal }))
            })
            .with_id("t")
            .with_restart_policy(RestartPolicy::Transient),
        )
        .unwrap();
    handle_next(&mut parent).await.unwrap();
    assert_eq!(normal_starts.load(Ordering::SeqCst), 1);
    assert_eq!(parent.num_children(), 0);
}

#[tokio::test]
async fn test_temporary_child_never_restarts() {
    let mut parent = Parent::new(Options {
        max_restarts: Some(10),
        ..Default::default()
    });
    let starts = Arc::new(AtomicU32::new(0));
    parent
        .start_child(crash_loop("t", &starts).with_restart_policy(RestartPolicy::Temporary))
        .unwrap();

    handle_next(&mut parent).await.unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(parent.num_children(), 0);
}
