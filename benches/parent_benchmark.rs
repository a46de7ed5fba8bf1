use brood::{ChildRef, ChildSpec, ExitReason, Options, Parent, RestartOpts};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

// ============================================================================
// Helpers
// ============================================================================

fn idle(id: String) -> ChildSpec {
    ChildSpec::task(|token| async move {
        token.cancelled().await;
        ExitReason::Normal
    })
    .with_id(id)
}

// ============================================================================
// Benchmark Functions
// ============================================================================

fn bench_start_and_shutdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("start_and_shutdown");

    for child_count in [5, 10, 20, 50].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(child_count),
            child_count,
            |b, &count| {
                b.to_async(tokio::runtime::Runtime::new().unwrap())
                    .iter(|| async move {
                        let mut parent = Parent::new(Options::default());
                        for i in 0..count {
                            parent.start_child(idle(format!("child-{}", i))).unwrap();
                        }
                        parent.shutdown_all(ExitReason::Shutdown).await;
                    });
            },
        );
    }

    group.finish();
}

fn bench_restart_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("restart_churn");

    for child_count in [5, 10, 20].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(child_count),
            child_count,
            |b, &count| {
                b.to_async(tokio::runtime::Runtime::new().unwrap())
                    .iter(|| async move {
                        let mut parent = Parent::new(Options {
                            max_restarts: None,
                            ..Default::default()
                        });
                        for i in 0..count {
                            parent.start_child(idle(format!("child-{}", i))).unwrap();
                        }
                        parent
                            .restart_child(
                                &ChildRef::Id("child-0".to_string()),
                                RestartOpts::default(),
                            )
                            .await
                            .unwrap();
                        parent.shutdown_all(ExitReason::Shutdown).await;
                    });
            },
        );
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    group.bench_function("which_children_50", |b| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let parent = rt.block_on(async {
            let mut parent = Parent::new(Options::default());
            for i in 0..50 {
                parent.start_child(idle(format!("child-{}", i))).unwrap();
            }
            parent
        });
        b.iter(|| parent.which_children());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_start_and_shutdown,
    bench_restart_churn,
    bench_queries
);
criterion_main!(benches);
