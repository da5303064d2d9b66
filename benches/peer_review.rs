use criterion::{criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tokio::runtime::Runtime;
use tower::{service_fn, BoxError};
use tower_agora::{AgentOutput, ExecuteRequest, ExecutionResult, MockExecutor, PeerReview, TeamOutputs};

// Sleeps briefly per call, like a remote model would.
async fn slow_call(req: ExecuteRequest) -> Result<ExecutionResult, BoxError> {
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(ExecutionResult::reply(
        &req,
        AgentOutput::Structured(MockExecutor::default_rating()),
    ))
}

fn team(n: usize) -> TeamOutputs {
    (0..n)
        .map(|i| (format!("Agent_{}", i + 1), format!("output {}", i)))
        .collect()
}

fn bench_peer_review(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let outputs = team(4);

    c.bench_function("peer_review_sequential_4_agents", |b| {
        b.to_async(&rt).iter(|| async {
            PeerReview::new(service_fn(slow_call))
                .concurrency_limit(1)
                .collect("bench task", &outputs)
                .await
                .unwrap()
        })
    });

    c.bench_function("peer_review_concurrent_4_agents", |b| {
        b.to_async(&rt).iter(|| async {
            PeerReview::new(service_fn(slow_call))
                .concurrency_limit(12)
                .collect("bench task", &outputs)
                .await
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_peer_review);
criterion_main!(benches);
