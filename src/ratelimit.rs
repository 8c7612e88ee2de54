//! Sliding-window pacing for outbound upstream calls.
//!
//! The limiter lets the first `burst` calls through immediately and then
//! holds the sustained rate to `rate` calls per second: a call may proceed
//! only once the call `burst` positions before it is at least `burst / rate`
//! seconds old.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;
use crate::sync::BillSource;
use crate::types::{BillQuery, UpstreamBill};

/// Time source used by [`RateLimiter`]
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

/// Monotonic wall clock that really sleeps
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Paces calls to at most `rate` per second, allowing bursts of `burst`
#[derive(Debug)]
pub struct RateLimiter<C: Clock = SystemClock> {
    window: Duration,
    burst: usize,
    calls: VecDeque<Instant>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    pub fn new(rate: f64, burst: usize) -> Self {
        Self::with_clock(rate, burst, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// `rate` must be positive; configuration validation guarantees it.
    pub fn with_clock(rate: f64, burst: usize, clock: C) -> Self {
        Self {
            window: Duration::from_secs_f64(burst as f64 / rate),
            burst,
            calls: VecDeque::with_capacity(burst),
            clock,
        }
    }

    /// Block until another call is allowed, then record it.
    pub fn acquire(&mut self) {
        let mut now = self.clock.now();
        if self.calls.len() >= self.burst {
            if let Some(oldest) = self.calls.pop_front() {
                let clear_at = oldest + self.window;
                if now < clear_at {
                    let wait = clear_at - now;
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, sleeping");
                    self.clock.sleep(wait);
                    now = self.clock.now();
                }
            }
        }
        self.calls.push_back(now);
    }

    /// Run `f` once the limiter allows it.
    pub fn call<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.acquire();
        f()
    }

    /// Number of call timestamps currently tracked
    pub fn tracked(&self) -> usize {
        self.calls.len()
    }
}

/// A [`BillSource`] whose fetches go through a [`RateLimiter`]
#[derive(Debug)]
pub struct RateLimitedSource<S, C: Clock = SystemClock> {
    inner: S,
    limiter: RateLimiter<C>,
}

impl<S: BillSource, C: Clock> RateLimitedSource<S, C> {
    pub fn new(inner: S, limiter: RateLimiter<C>) -> Self {
        Self { inner, limiter }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: BillSource, C: Clock> BillSource for RateLimitedSource<S, C> {
    fn fetch_bill(&mut self, query: &BillQuery) -> Result<UpstreamBill> {
        let inner = &mut self.inner;
        self.limiter.call(|| inner.fetch_bill(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Clock that only moves when told to (or when slept on)
    #[derive(Debug, Clone)]
    struct ManualClock {
        now: Rc<RefCell<Instant>>,
        slept: Rc<RefCell<Vec<Duration>>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Rc::new(RefCell::new(Instant::now())),
                slept: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.borrow_mut() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.borrow()
        }

        fn sleep(&mut self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
            self.advance(duration);
        }
    }

    #[test]
    fn test_burst_passes_then_paces() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        let mut limiter = RateLimiter::with_clock(2.0, 10, clock.clone());

        let mut times = Vec::new();
        for _ in 0..11 {
            times.push(limiter.call(|| clock.now()));
        }

        // The first ten are free
        assert!(times[..10].iter().all(|t| *t == t0));
        // The eleventh waits until t0 + 10 / 2 seconds
        assert_eq!(times[10], t0 + Duration::from_secs(5));
        assert_eq!(*clock.slept.borrow(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn test_sustained_rate() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        let mut limiter = RateLimiter::with_clock(2.0, 2, clock.clone());

        for _ in 0..6 {
            limiter.acquire();
        }

        // 2 free, then pairs every second: 6 calls end at t0 + 2s
        assert_eq!(clock.now(), t0 + Duration::from_secs(2));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_no_sleep_when_calls_are_spread_out() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(1.0, 1, clock.clone());

        for _ in 0..5 {
            limiter.acquire();
            clock.advance(Duration::from_secs(2));
        }

        assert!(clock.slept.borrow().is_empty());
    }

    #[test]
    fn test_window_never_exceeds_burst() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(100.0, 3, clock.clone());

        for _ in 0..20 {
            limiter.acquire();
            assert!(limiter.tracked() <= 3);
        }
    }

    #[test]
    fn test_zero_burst_never_waits() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::with_clock(2.0, 0, clock.clone());

        for _ in 0..5 {
            limiter.acquire();
        }

        assert!(clock.slept.borrow().is_empty());
        assert!(limiter.tracked() <= 1);
    }

    #[test]
    fn test_system_clock_really_waits() {
        let mut limiter = RateLimiter::new(100.0, 2);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire();
        }

        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
