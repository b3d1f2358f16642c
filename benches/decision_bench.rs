use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use hyper::Method;
use ratewall::{Backend, FixedRule, HttpRequest, IpAuthenticator, MemoryBackend, RateLimitMiddleware, Rule};
use tokio::runtime::Runtime;

fn make_request() -> HttpRequest {
    HttpRequest::new(Method::GET, "/orders/42", "203.0.113.7".parse().unwrap())
}

fn bench_memory_backend_retry_after(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let backend = MemoryBackend::new();
    let rule = Rule::Fixed(FixedRule::new("default").second(1_000_000).minute(1_000_000));

    c.bench_function("memory_backend_admit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = backend.retry_after("/orders/42", "u1", black_box(&rule)).await;
                black_box(result).unwrap()
            })
        })
    });
}

fn bench_middleware_decide(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mw = RateLimitMiddleware::builder(Arc::new(IpAuthenticator::new()), Arc::new(MemoryBackend::new()))
        .route(
            "^/orders/",
            vec![Rule::Fixed(FixedRule::new("default").second(1_000_000))],
        )
        .build()
        .unwrap();
    let req = make_request();

    c.bench_function("middleware_decide_admit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let decision = mw.decide(black_box(&req)).await;
                black_box(decision).unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_memory_backend_retry_after, bench_middleware_decide);
criterion_main!(benches);
