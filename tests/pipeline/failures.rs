use http::{Method, StatusCode};
use httpshield::{adapter_fn, ClientOptions, Engine, Profile, RateLimitOptions};
use httpshield_core::{Error, Request, Response};
use httpshield_ratelimiter::{Per, Strategy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn request() -> Request {
    Request::builder(Method::GET, "https://api.example.com/v1/status")
        .build()
        .unwrap()
}

/// Invalid URLs fail at construction, before any engine machinery runs.
#[test]
fn invalid_urls_fail_synchronously() {
    let err = Request::builder(Method::GET, "notaurl").build().unwrap_err();
    assert_eq!(err.reason(), "invalid_url");

    let err = Request::builder(Method::GET, "gopher://example.com")
        .build()
        .unwrap_err();
    assert_eq!(err.reason(), "invalid_url");

    let err = Request::builder(Method::GET, "https://")
        .build()
        .unwrap_err();
    assert_eq!(err.reason(), "invalid_url");
}

/// Test mode blocks every request before the pipeline, whether set on the
/// engine or scoped by a harness.
#[tokio::test]
async fn test_mode_blocks_everything() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let adapter = adapter_fn(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok(Response::from_status(StatusCode::OK)) }
    });

    let blocked = Engine::new(ClientOptions::new().test_mode(true));
    assert!(matches!(
        blocked.execute(request(), &adapter).await,
        Err(Error::NetworkBlocked)
    ));

    let open = Engine::new(ClientOptions::new());
    let result =
        httpshield::test_mode::scope(true, open.execute(request(), &adapter)).await;
    assert!(matches!(result, Err(Error::NetworkBlocked)));

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Outside the scope the same engine works.
    assert!(open.execute(request(), &adapter).await.is_ok());
}

/// An exhausted error-strategy bucket surfaces `too_many_requests` to the
/// caller rather than raising.
#[tokio::test]
async fn exhausted_buckets_surface_cleanly() {
    let engine = Engine::new(ClientOptions::new().rate_limit(
        RateLimitOptions::new()
            .requests(2)
            .per(Per::Hour)
            .strategy(Strategy::Error),
    ));
    let adapter = adapter_fn(|_| async { Ok(Response::from_status(StatusCode::OK)) });

    assert!(engine.execute(request(), &adapter).await.is_ok());
    assert!(engine.execute(request(), &adapter).await.is_ok());
    let result = engine.execute(request(), &adapter).await;
    assert!(matches!(result, Err(Error::TooManyRequests)));
}

/// A panicking adapter is contained as a middleware error; the engine
/// keeps serving afterwards.
#[tokio::test]
async fn adapter_panics_are_contained() {
    let engine = Engine::new(ClientOptions::new());

    let bomb = adapter_fn(|_| async { panic!("boom") });
    let result = engine.execute(request(), &bomb).await;
    match result {
        Err(Error::Middleware { stage, .. }) => assert_eq!(stage, "adapter"),
        other => panic!("expected a contained middleware error, got {other:?}"),
    }

    let ok = adapter_fn(|_| async { Ok(Response::from_status(StatusCode::OK)) });
    assert!(engine.execute(request(), &ok).await.is_ok());
}

/// Per-request overrides replace client-level settings for that request
/// only.
#[tokio::test]
async fn per_request_overrides_are_scoped() {
    let engine = Engine::new(ClientOptions::new().max_retries(1));

    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let adapter = adapter_fn(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok(Response::from_status(StatusCode::SERVICE_UNAVAILABLE)) }
    });

    // Client default: single attempt.
    let _ = engine.execute(request(), &adapter).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // This request opts into retries.
    calls.store(0, Ordering::SeqCst);
    let overrides = ClientOptions::new()
        .max_retries(3)
        .base_delay(std::time::Duration::from_millis(1))
        .jitter_factor(0.0);
    let _ = engine
        .execute_with(request(), overrides, &adapter)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // And the next plain request is back to one attempt.
    calls.store(0, Ordering::SeqCst);
    let _ = engine.execute(request(), &adapter).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Profiles wire up whole component bundles by name.
#[tokio::test]
async fn profiles_enable_component_bundles() {
    let engine = Engine::new(ClientOptions::new().profile(Profile::PaymentProcessing));
    let adapter = adapter_fn(|_| async { Ok(Response::from_status(StatusCode::OK)) });

    assert!(engine.execute(request(), &adapter).await.is_ok());

    // The payment profile runs with dedup and a circuit breaker: one
    // completed dedup entry and one closed circuit exist afterwards.
    assert_eq!(engine.dedup().len(), 1);
    assert_eq!(
        engine.circuit_breakers().state("api.example.com"),
        Some(httpshield_circuitbreaker::CircuitState::Closed)
    );
}
