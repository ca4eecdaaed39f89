use httpshield_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use httpshield_core::Error;
use std::sync::Arc;
use std::time::Duration;

fn config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .failure_threshold(3)
        .window_size(10)
        .timeout(Duration::from_millis(100))
        .name("recovery")
        .build()
}

/// After the open timeout, one successful probe closes the circuit:
/// open -> half_open -> closed.
#[tokio::test]
async fn recovers_after_timeout_with_a_successful_probe() {
    let transitions = Arc::new(std::sync::Mutex::new(Vec::new()));
    let t = Arc::clone(&transitions);
    let cfg = CircuitBreakerConfig::builder()
        .failure_threshold(3)
        .window_size(10)
        .timeout(Duration::from_millis(100))
        .name("recovery")
        .on_state_change(move |from, to| {
            t.lock().unwrap().push((from, to));
        })
        .build();

    let registry = CircuitBreakerRegistry::new();
    for _ in 0..3 {
        let _ = registry
            .call("x", &cfg, async { Err::<(), _>(Error::Timeout) })
            .await;
    }
    assert_eq!(registry.state("x"), Some(CircuitState::Open));

    tokio::time::sleep(Duration::from_millis(150)).await;

    let result = registry.call("x", &cfg, async { Ok::<_, Error>(42) }).await;
    assert_eq!(result.unwrap(), 42);
    assert_eq!(registry.state("x"), Some(CircuitState::Closed));

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

/// A failing probe sends the circuit straight back to open.
#[tokio::test]
async fn a_failed_probe_reopens() {
    let registry = CircuitBreakerRegistry::new();
    let cfg = config();

    for _ in 0..3 {
        registry.record_failure("x", &cfg);
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    let result = registry
        .call("x", &cfg, async { Err::<(), _>(Error::Timeout) })
        .await;
    assert!(matches!(result, Err(Error::Timeout)));
    assert_eq!(registry.state("x"), Some(CircuitState::Open));

    // And it rejects again until the next timeout.
    let result = registry.call("x", &cfg, async { Ok::<_, Error>(()) }).await;
    assert!(matches!(result, Err(Error::ServiceUnavailable)));
}

/// Multiple probe successes are required when configured.
#[tokio::test]
async fn closing_requires_the_full_probe_budget() {
    let cfg = CircuitBreakerConfig::builder()
        .failure_threshold(1)
        .timeout(Duration::from_millis(50))
        .half_open_requests(2)
        .name("budget")
        .build();
    let registry = CircuitBreakerRegistry::new();

    registry.record_failure("x", &cfg);
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(registry.try_acquire("x", &cfg));
    registry.record_success("x", &cfg);
    assert_eq!(registry.state("x"), Some(CircuitState::HalfOpen));

    assert!(registry.try_acquire("x", &cfg));
    registry.record_success("x", &cfg);
    assert_eq!(registry.state("x"), Some(CircuitState::Closed));
}

/// Manual controls override the state machine.
#[tokio::test]
async fn manual_open_close_and_reset() {
    let registry = CircuitBreakerRegistry::new();
    let cfg = config();

    registry.force_open("x", &cfg);
    assert_eq!(registry.state("x"), Some(CircuitState::Open));
    assert!(!registry.try_acquire("x", &cfg));

    registry.force_closed("x", &cfg);
    assert_eq!(registry.state("x"), Some(CircuitState::Closed));

    registry.force_open("x", &cfg);
    registry.reset("x");
    assert_eq!(registry.state("x"), None);
    assert!(registry.try_acquire("x", &cfg));
}
