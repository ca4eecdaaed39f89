use http::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use http::StatusCode;
use httpshield_core::{Error, Response};
use httpshield_retry::{execute, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn with_retry_after(status: u16, value: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
    Response::new(StatusCode::from_u16(status).unwrap(), headers, "")
}

/// For a 429, the server's `Retry-After` replaces the computed backoff
/// regardless of `base_delay`.
#[tokio::test(start_paused = true)]
async fn retry_after_seconds_overrides_backoff_for_429() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let policy = RetryPolicy::builder()
        .max_retries(3)
        .base_delay(Duration::from_millis(1_000))
        .jitter_factor(0.2)
        .name("retry-after")
        .build();

    let start = tokio::time::Instant::now();
    let result = execute(&policy, |_| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Ok(with_retry_after(429, "2"))
            } else {
                Ok(Response::from_status(StatusCode::OK))
            }
        }
    })
    .await;

    assert_eq!(result.unwrap().status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(1_800) && elapsed <= Duration::from_millis(2_700),
        "expected the server-directed 2s delay, got {elapsed:?}"
    );
}

/// Same for 503.
#[tokio::test(start_paused = true)]
async fn retry_after_applies_to_503() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let policy = RetryPolicy::builder()
        .max_retries(2)
        .base_delay(Duration::from_millis(10))
        .jitter_factor(0.0)
        .build();

    let start = tokio::time::Instant::now();
    let _ = execute(&policy, |_| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Ok(with_retry_after(503, "1"))
            } else {
                Ok(Response::from_status(StatusCode::OK))
            }
        }
    })
    .await;

    assert!(start.elapsed() >= Duration::from_secs(1));
}

/// A 500 ignores `Retry-After` and uses computed backoff.
#[tokio::test(start_paused = true)]
async fn other_statuses_ignore_the_header() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let policy = RetryPolicy::builder()
        .max_retries(2)
        .base_delay(Duration::from_millis(50))
        .jitter_factor(0.0)
        .build();

    let start = tokio::time::Instant::now();
    let _ = execute(&policy, |_| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Ok(with_retry_after(500, "60"))
            } else {
                Ok(Response::from_status(StatusCode::OK))
            }
        }
    })
    .await;

    // Backoff (50ms), not the header's 60s.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(50) && elapsed < Duration::from_secs(1));
}

/// An unparseable header falls back to computed backoff instead of
/// failing the request.
#[tokio::test(start_paused = true)]
async fn garbage_headers_fall_back_to_backoff() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);
    let policy = RetryPolicy::builder()
        .max_retries(2)
        .base_delay(Duration::from_millis(30))
        .jitter_factor(0.0)
        .build();

    let result = execute(&policy, |_| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Ok(with_retry_after(429, "sometime later"))
            } else {
                Ok(Response::from_status(StatusCode::OK))
            }
        }
    })
    .await;

    assert_eq!(result.unwrap().status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Retry events carry the delay the server dictated.
#[tokio::test(start_paused = true)]
async fn attempt_events_report_the_server_delay() {
    let delays = Arc::new(std::sync::Mutex::new(Vec::new()));
    let d = Arc::clone(&delays);
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);

    let policy = RetryPolicy::builder()
        .max_retries(2)
        .base_delay(Duration::from_millis(10))
        .jitter_factor(0.0)
        .on_attempt(move |attempt, delay| {
            d.lock().unwrap().push((attempt, delay));
        })
        .build();

    let _ = execute(&policy, |_| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Ok(with_retry_after(429, "3"))
            } else {
                Err::<Response, _>(Error::Timeout)
            }
        }
    })
    .await;

    assert_eq!(*delays.lock().unwrap(), vec![(2, Duration::from_secs(3))]);
}
