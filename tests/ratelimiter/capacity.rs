use httpshield_ratelimiter::{
    CircuitAdvisory, Decision, Per, RateLimiterConfig, RateLimiterError, RateLimiterStore,
    Strategy,
};
use std::sync::Arc;
use std::time::Duration;

fn error_config(requests: u32, per: Per) -> RateLimiterConfig {
    RateLimiterConfig::builder()
        .requests(requests)
        .per(per)
        .strategy(Strategy::Error)
        .name("capacity")
        .build()
}

/// Exactly R consumes succeed from a fresh bucket; the (R+1)th is denied.
#[tokio::test]
async fn fresh_bucket_allows_exactly_the_quota() {
    let store = RateLimiterStore::new();
    let cfg = error_config(10, Per::Minute);

    for i in 0..10 {
        assert!(
            store.consume("k", &cfg).await.is_ok(),
            "consume {i} should fit in the quota"
        );
    }
    assert_eq!(
        store.consume("k", &cfg).await,
        Err(RateLimiterError::Exceeded)
    );
}

/// Tokens refill linearly with elapsed time and clamp at capacity.
#[tokio::test]
async fn refill_is_linear_and_clamped() {
    let store = RateLimiterStore::new();
    // 10 per second = 1 token per 100ms.
    let cfg = error_config(10, Per::Second);

    for _ in 0..10 {
        store.consume("k", &cfg).await.unwrap();
    }
    assert!(store.consume("k", &cfg).await.is_err());

    // ~250ms refills 2.5 tokens; allow scheduler slop either way. The
    // check refreshes the bucket without consuming.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(matches!(store.check("k", &cfg), Decision::Allowed { .. }));
    let state = store.state("k").unwrap();
    assert!(
        state.tokens >= 2.0 && state.tokens <= 4.5,
        "expected a partial linear refill, got {} tokens",
        state.tokens
    );

    // A full window of idleness refills to capacity, not beyond it.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    for _ in 0..10 {
        assert!(store.consume("k", &cfg).await.is_ok());
    }
    assert!(store.consume("k", &cfg).await.is_err());
}

/// Per-key isolation: exhausting one bucket leaves others untouched.
#[tokio::test]
async fn buckets_are_isolated_per_key() {
    let store = RateLimiterStore::new();
    let cfg = error_config(2, Per::Minute);

    store.consume("a", &cfg).await.unwrap();
    store.consume("a", &cfg).await.unwrap();
    assert!(store.consume("a", &cfg).await.is_err());

    store.consume("b", &cfg).await.unwrap();
    assert!(matches!(store.check("b", &cfg), Decision::Allowed { .. }));
}

/// Concurrent consumes on one key never over-admit.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumes_respect_the_quota() {
    let store = Arc::new(RateLimiterStore::new());
    let cfg = Arc::new(error_config(25, Per::Minute));

    let mut handles = Vec::new();
    for _ in 0..100 {
        let store = Arc::clone(&store);
        let cfg = Arc::clone(&cfg);
        handles.push(tokio::spawn(
            async move { store.consume("k", &cfg).await.is_ok() },
        ));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 25);
}

/// An open circuit narrows the consumable capacity to a tenth without
/// rewriting the stored bucket.
#[tokio::test]
async fn adaptive_open_circuit_narrows_capacity() {
    let store = RateLimiterStore::new();
    let cfg = RateLimiterConfig::builder()
        .requests(100)
        .per(Per::Minute)
        .strategy(Strategy::Error)
        .adaptive(true)
        .name("adaptive")
        .build();

    let mut admitted = 0;
    for _ in 0..20 {
        if store
            .consume_with("k", &cfg, CircuitAdvisory::Open)
            .await
            .is_ok()
        {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);

    // Once the circuit closes, the unscaled balance is available again.
    assert!(store
        .consume_with("k", &cfg, CircuitAdvisory::Closed)
        .await
        .is_ok());
}

/// A half-open circuit narrows capacity to half.
#[tokio::test]
async fn adaptive_half_open_circuit_halves_capacity() {
    let store = RateLimiterStore::new();
    let cfg = RateLimiterConfig::builder()
        .requests(10)
        .per(Per::Minute)
        .strategy(Strategy::Error)
        .adaptive(true)
        .name("adaptive")
        .build();

    let mut admitted = 0;
    for _ in 0..10 {
        if store
            .consume_with("k", &cfg, CircuitAdvisory::HalfOpen)
            .await
            .is_ok()
        {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);
}
