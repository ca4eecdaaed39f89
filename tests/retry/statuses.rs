use http::StatusCode;
use httpshield_core::{Error, Response};
use httpshield_retry::{execute, is_retryable_status, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .base_delay(Duration::from_millis(5))
        .max_delay(Duration::from_millis(20))
        .jitter_factor(0.0)
        .name("statuses")
        .build()
}

#[test]
fn the_retryable_status_set_is_exact() {
    for code in [408_u16, 429, 500, 502, 503, 504] {
        assert!(is_retryable_status(StatusCode::from_u16(code).unwrap()));
    }
    for code in [200_u16, 201, 301, 400, 401, 403, 404, 410, 501, 505] {
        assert!(!is_retryable_status(StatusCode::from_u16(code).unwrap()));
    }
}

/// A 404 is a final answer: one adapter call, returned as success.
#[tokio::test]
async fn no_retry_on_404() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);

    let result = execute(&fast_policy(3), |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok(Response::from_status(StatusCode::NOT_FOUND)) }
    })
    .await;

    assert_eq!(result.unwrap().status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Each retryable status burns the full budget, then surfaces as an error
/// carrying the final response.
#[tokio::test]
async fn retryable_statuses_exhaust_then_error() {
    for code in [408_u16, 429, 500, 502, 503, 504] {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result = execute(&fast_policy(2), |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Response::from_status(StatusCode::from_u16(code).unwrap())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2, "status {code}");
        match result {
            Err(Error::HttpStatus { status, response }) => {
                assert_eq!(status.as_u16(), code);
                assert_eq!(response.status().as_u16(), code);
            }
            other => panic!("status {code}: expected HttpStatus error, got {other:?}"),
        }
    }
}

/// Transient transport failures recover when a later attempt succeeds.
#[tokio::test]
async fn transport_errors_recover_within_budget() {
    for error in [Error::Timeout, Error::Closed, Error::ConnectionRefused] {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let failure = error.clone();

        let result = execute(&fast_policy(3), move |_| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            let failure = failure.clone();
            async move {
                if n < 2 {
                    Err(failure)
                } else {
                    Ok(Response::from_status(StatusCode::OK))
                }
            }
        })
        .await;

        assert!(result.is_ok(), "{error:?} should be retryable");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

/// The budget includes the first attempt: max_retries = 1 means exactly
/// one call even for retryable failures.
#[tokio::test]
async fn a_budget_of_one_never_retries() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&calls);

    let result = execute(&fast_policy(1), |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Err::<Response, _>(Error::Timeout) }
    })
    .await;

    assert!(matches!(result, Err(Error::Timeout)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// The attempt number passed to the operation increments.
#[tokio::test]
async fn attempt_numbers_are_sequential() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);

    let _ = execute(&fast_policy(3), move |attempt| {
        s.lock().unwrap().push(attempt);
        async { Err::<Response, _>(Error::Closed) }
    })
    .await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}
