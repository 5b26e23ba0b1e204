// ============================================================================
// MERIDIAN COMMERCE - CARRIER CIRCUIT BREAKER
// ============================================================================
// Module: channels/src/circuit_breaker.rs
// Description: Per-carrier failure-counting state machine guarding outbound
//              carrier API calls
// ============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use meridian_shared::{Error, Result};

use crate::models::Carrier;

pub const FAILURE_THRESHOLD: u32 = 5;
pub const FAILURE_WINDOW: Duration = Duration::from_secs(30);
pub const COOL_DOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures: u32,
    window_started_at: Instant,
    opened_at: Instant,
    probe_in_flight: bool,
}

/// One breaker per carrier. All transitions happen under the mutex, so under
/// concurrent failing calls the breaker trips exactly once and everything
/// after it in the window short-circuits.
pub struct CircuitBreaker {
    carrier: Carrier,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(carrier: Carrier) -> Self {
        let now = Instant::now();
        Self {
            carrier,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                window_started_at: now,
                opened_at: now,
                probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker poisoned").state
    }

    /// Run `op` through the breaker: fail fast while OPEN, admit one probe in
    /// HALF_OPEN, and track the outcome.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.try_acquire()?;

        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// Admission check. `Err(CarrierUnavailable)` short-circuits without any
    /// upstream call.
    pub fn try_acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("breaker poisoned");
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= COOL_DOWN {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!(carrier = %self.carrier, "circuit breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(self.unavailable())
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.unavailable())
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker poisoned");
        if inner.state != BreakerState::Closed {
            info!(carrier = %self.carrier, "circuit breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.failures = 0;
        inner.probe_in_flight = false;
        inner.window_started_at = Instant::now();
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker poisoned");
        let now = Instant::now();

        match inner.state {
            BreakerState::HalfOpen => {
                // Probe failed: back to OPEN, cool-down restarts
                inner.state = BreakerState::Open;
                inner.opened_at = now;
                inner.probe_in_flight = false;
                warn!(carrier = %self.carrier, "circuit breaker probe failed, reopening");
            }
            BreakerState::Closed => {
                if now.duration_since(inner.window_started_at) > FAILURE_WINDOW {
                    inner.failures = 0;
                    inner.window_started_at = now;
                }
                inner.failures += 1;
                if inner.failures >= FAILURE_THRESHOLD {
                    inner.state = BreakerState::Open;
                    inner.opened_at = now;
                    warn!(
                        carrier = %self.carrier,
                        failures = inner.failures,
                        "circuit breaker tripped"
                    );
                }
            }
            BreakerState::Open => {}
        }
    }

    fn unavailable(&self) -> Error {
        Error::CarrierUnavailable(format!("{} circuit breaker is open", self.carrier))
    }
}

/// Per-process registry handing out one breaker per carrier.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<Carrier, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_carrier(&self, carrier: Carrier) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("registry poisoned");
        breakers
            .entry(carrier)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(carrier)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn failing_call(breaker: &CircuitBreaker, upstream_calls: &AtomicU32) -> Result<()> {
        breaker
            .call(|| async {
                upstream_calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Internal("upstream down".to_string()))
            })
            .await
            .map(|_| ())
    }

    #[tokio::test(start_paused = true)]
    async fn trips_after_five_failures_and_recovers_on_probe_success() {
        let breaker = CircuitBreaker::new(Carrier::Fedex);
        let upstream_calls = AtomicU32::new(0);

        // Five failures at t = 0..4s trip the breaker
        for _ in 0..5 {
            failing_call(&breaker, &upstream_calls).await.unwrap_err();
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        // Sixth call fails fast without touching upstream
        let err = failing_call(&breaker, &upstream_calls).await.unwrap_err();
        assert!(matches!(err, Error::CarrierUnavailable(_)));
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 5);

        // After the cool-down one probe is admitted; success closes
        tokio::time::advance(Duration::from_secs(61)).await;
        breaker
            .call(|| async {
                upstream_calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            })
            .await
            .unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 6);

        // Counter was cleared: a single failure does not re-trip
        failing_call(&breaker, &upstream_calls).await.unwrap_err();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_and_restarts_cool_down() {
        let breaker = CircuitBreaker::new(Carrier::Fedex);
        let upstream_calls = AtomicU32::new(0);

        for _ in 0..5 {
            failing_call(&breaker, &upstream_calls).await.unwrap_err();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(COOL_DOWN).await;
        failing_call(&breaker, &upstream_calls).await.unwrap_err();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 6);

        // Immediately after the failed probe: still short-circuiting
        let err = failing_call(&breaker, &upstream_calls).await.unwrap_err();
        assert!(matches!(err, Error::CarrierUnavailable(_)));
        assert_eq!(upstream_calls.load(Ordering::SeqCst), 6);

        // Cool-down restarted from the probe failure
        tokio::time::advance(Duration::from_secs(30)).await;
        let err = failing_call(&breaker, &upstream_calls).await.unwrap_err();
        assert!(matches!(err, Error::CarrierUnavailable(_)));

        tokio::time::advance(Duration::from_secs(31)).await;
        breaker
            .call(|| async { Ok::<_, Error>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_window_rolls_over() {
        let breaker = CircuitBreaker::new(Carrier::Fedex);
        let upstream_calls = AtomicU32::new(0);

        // Four failures, then the 30s window expires
        for _ in 0..4 {
            failing_call(&breaker, &upstream_calls).await.unwrap_err();
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        // Four more failures in the fresh window: still closed
        for _ in 0..4 {
            failing_call(&breaker, &upstream_calls).await.unwrap_err();
        }
        assert_eq!(breaker.state(), BreakerState::Closed);

        failing_call(&breaker, &upstream_calls).await.unwrap_err();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn carriers_are_isolated() {
        let registry = CircuitBreakerRegistry::new();
        let fedex = registry.for_carrier(Carrier::Fedex);
        let dhl = registry.for_carrier(Carrier::Dhl);
        let upstream_calls = AtomicU32::new(0);

        for _ in 0..5 {
            failing_call(&fedex, &upstream_calls).await.unwrap_err();
        }
        assert_eq!(fedex.state(), BreakerState::Open);

        // DHL is unaffected by the FedEx trip
        dhl.call(|| async { Ok::<_, Error>(()) }).await.unwrap();
        assert_eq!(dhl.state(), BreakerState::Closed);

        // The registry hands back the same tripped instance
        assert_eq!(registry.for_carrier(Carrier::Fedex).state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_a_single_probe() {
        let breaker = CircuitBreaker::new(Carrier::Dhl);
        for _ in 0..5 {
            breaker.on_failure();
        }
        tokio::time::advance(COOL_DOWN).await;

        assert!(breaker.try_acquire().is_ok());
        // Second caller while the probe is in flight is rejected
        assert!(breaker.try_acquire().is_err());

        breaker.on_success();
        assert!(breaker.try_acquire().is_ok());
    }
}
