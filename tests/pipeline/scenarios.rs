use http::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use http::{Method, StatusCode};
use httpshield::{adapter_fn, CircuitBreakerOptions, ClientOptions, Engine};
use httpshield_circuitbreaker::CircuitState;
use httpshield_core::{Error, Request, Response};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn request() -> Request {
    Request::builder(Method::GET, "https://api.example.com/v1/orders")
        .build()
        .unwrap()
}

/// Repeated failures open the circuit; the next request is rejected
/// without reaching the adapter.
#[tokio::test]
async fn failures_open_the_circuit_and_shed_load() {
    let engine = Engine::new(
        ClientOptions::new().max_retries(1).circuit_breaker(
            CircuitBreakerOptions::new()
                .failure_threshold(3)
                .window_size(10)
                .timeout(Duration::from_millis(100)),
        ),
    );

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let adapter = adapter_fn(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Err::<Response, _>(Error::Timeout) }
    });

    for _ in 0..3 {
        let result = engine.execute(request(), &adapter).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }
    assert_eq!(
        engine.circuit_breakers().state("api.example.com"),
        Some(CircuitState::Open)
    );

    let result = engine.execute(request(), &adapter).await;
    assert!(matches!(result, Err(Error::ServiceUnavailable)));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "the open circuit must skip the adapter");
}

/// After the open timeout, a successful probe closes the circuit again.
#[tokio::test]
async fn the_circuit_recovers_through_a_successful_probe() {
    let engine = Engine::new(
        ClientOptions::new().max_retries(1).circuit_breaker(
            CircuitBreakerOptions::new()
                .failure_threshold(3)
                .window_size(10)
                .timeout(Duration::from_millis(100)),
        ),
    );

    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let h = Arc::clone(&healthy);
    let adapter = adapter_fn(move |_| {
        let healthy = h.load(Ordering::SeqCst);
        async move {
            if healthy {
                Ok(Response::from_status(StatusCode::OK))
            } else {
                Err(Error::Timeout)
            }
        }
    });

    for _ in 0..3 {
        let _ = engine.execute(request(), &adapter).await;
    }
    assert_eq!(
        engine.circuit_breakers().state("api.example.com"),
        Some(CircuitState::Open)
    );

    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let result = engine.execute(request(), &adapter).await;
    assert_eq!(result.unwrap().status(), StatusCode::OK);
    assert_eq!(
        engine.circuit_breakers().state("api.example.com"),
        Some(CircuitState::Closed)
    );
}

/// A 429 with `Retry-After: 2` delays the second attempt by the server's
/// two seconds, not the configured backoff.
#[tokio::test(start_paused = true)]
async fn the_server_retry_after_drives_the_delay() {
    let engine = Engine::new(
        ClientOptions::new()
            .max_retries(3)
            .base_delay(Duration::from_millis(1_000)),
    );

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let adapter = adapter_fn(move |_| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                let mut headers = HeaderMap::new();
                headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
                Ok(Response::new(StatusCode::TOO_MANY_REQUESTS, headers, ""))
            } else {
                Ok(Response::from_status(StatusCode::OK))
            }
        }
    });

    let start = tokio::time::Instant::now();
    let result = engine.execute(request(), &adapter).await;
    let elapsed = start.elapsed();

    assert_eq!(result.unwrap().status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(
        elapsed >= Duration::from_millis(1_800) && elapsed <= Duration::from_millis(2_700),
        "expected ~2s between attempts, got {elapsed:?}"
    );
}

/// A 404 is returned as a success without a single retry.
#[tokio::test]
async fn not_found_is_final() {
    let engine = Engine::new(ClientOptions::new().max_retries(3));

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let adapter = adapter_fn(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok(Response::from_status(StatusCode::NOT_FOUND)) }
    });

    let result = engine.execute(request(), &adapter).await;
    assert_eq!(result.unwrap().status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Successful responses carrying quota headers resynchronize the bucket.
#[tokio::test]
async fn quota_headers_resync_the_bucket() {
    use httpshield::RateLimitOptions;
    use httpshield_ratelimiter::{Per, Strategy};

    let engine = Engine::new(
        ClientOptions::new().rate_limit(
            RateLimitOptions::new()
                .requests(100)
                .per(Per::Minute)
                .strategy(Strategy::Error),
        ),
    );

    let adapter = adapter_fn(|_| async {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("100"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("2"));
        Ok(Response::new(StatusCode::OK, headers, ""))
    });

    engine.execute(request(), &adapter).await.unwrap();

    let state = engine.rate_limiter().state("api.example.com").unwrap();
    assert!(
        state.tokens <= 2.5,
        "the server said 2 remain, local bucket has {}",
        state.tokens
    );
}
