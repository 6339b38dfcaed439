// ── Vitalis Engine — Circuit Breaker ───────────────────────────────────────
// Three-state breaker shared by every store operation:
//
//   Closed ──(failure_threshold consecutive failures)──▶ Open
//   Open ──(recovery_timeout elapsed)──▶ HalfOpen
//   HalfOpen ──(success)──▶ Closed        HalfOpen ──(failure)──▶ Open
//
// While open, operations fail fast with `CircuitBreakerOpen` and never touch
// the network. This is the engine's only cross-cutting back-pressure
// mechanism; it shields the tool-calling loop from cascading store latency.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::atoms::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        CircuitBreaker {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Gate an operation. `Ok(())` means the caller may attempt the network
    /// call; `Err(CircuitBreakerOpen)` means fail fast without attempting it.
    /// An open breaker whose recovery timeout has elapsed moves to half-open
    /// and lets the call through as a probe.
    pub fn try_acquire(&self) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.recovery_timeout {
                    log::info!("[store] Circuit breaker half-open after {:?}", elapsed);
                    inner.state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(EngineError::CircuitBreakerOpen)
                }
            }
        }
    }

    /// A gated operation succeeded: fully close and reset the failure count.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            log::info!("[store] Circuit breaker closed (probe succeeded)");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// A gated operation failed. In half-open this re-opens immediately;
    /// in closed it opens once the consecutive-failure threshold is hit.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                log::warn!("[store] Circuit breaker re-opened (probe failed)");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    log::warn!(
                        "[store] Circuit breaker opened after {} consecutive failures",
                        inner.consecutive_failures
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let b = breaker(5, 30_000);
        for _ in 0..4 {
            b.record_failure();
            assert_eq!(b.state(), BreakerState::Closed);
        }
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        // The 6th call fails fast without attempting the operation.
        assert!(matches!(b.try_acquire(), Err(EngineError::CircuitBreakerOpen)));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let b = breaker(5, 30_000);
        for _ in 0..4 {
            b.record_failure();
        }
        b.record_success();
        assert_eq!(b.consecutive_failures(), 0);
        for _ in 0..4 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_success_closes() {
        let b = breaker(1, 0);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        // recovery_timeout of zero: next acquire is a half-open probe
        assert!(b.try_acquire().is_ok());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let b = breaker(1, 0);
        b.record_failure();
        assert!(b.try_acquire().is_ok());
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }
}
