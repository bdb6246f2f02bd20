//! Exponential backoff iterator and a cooperative concurrency-limit gate.
//!
//! Both are plain synchronous/async primitives with no I/O of their own;
//! callers (the runner, the searcher's external-tool probe) hold them
//! across suspension points.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

/// A non-decreasing (ignoring jitter), capped backoff sequence.
///
/// Each call to [`ExponentialBackoff::next_delay`] returns the current
/// delay (optionally jittered to `[0.5, 1.0]` of its value), then
/// multiplies the internal delay by `multiplier`, capped at `max`.
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    current: Duration,
    rng_state: u64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: bool) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter,
            current: initial,
            rng_state: 0x9E3779B97F4A7C15,
        }
    }

    /// Return the next delay in the sequence and advance the internal
    /// state. The returned value is always `<= max`.
    pub fn next_delay(&mut self) -> Duration {
        let capped = self.current.min(self.max);
        let delay = if self.jitter {
            let factor = 0.5 + 0.5 * self.next_uniform();
            Duration::from_secs_f64(capped.as_secs_f64() * factor)
        } else {
            capped
        };

        let advanced = capped.as_secs_f64() * self.multiplier;
        self.current = Duration::from_secs_f64(advanced.min(self.max.as_secs_f64()));

        delay
    }

    /// Reset the sequence back to `initial`.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// A deterministic xorshift generator in `[0.0, 1.0)` — real jitter
    /// without depending on a `rand` crate just for this.
    fn next_uniform(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// A cooperative gate bounding the number of concurrently-active holders
/// to `max`. `acquire` suspends (without blocking a sibling task) while
/// `active >= max`; waiters are released in FIFO order.
pub struct ConcurrencyLimiter {
    max: usize,
    state: Mutex<LimiterState>,
    notify: Notify,
}

struct LimiterState {
    active: usize,
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

/// RAII guard returned by [`ConcurrencyLimiter::acquire`]; releases its
/// slot on drop.
pub struct LimiterPermit<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

impl ConcurrencyLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            state: Mutex::new(LimiterState {
                active: 0,
                waiters: VecDeque::new(),
                next_ticket: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Current number of active holders. Observable for tests/metrics.
    pub fn active(&self) -> usize {
        self.state.lock().unwrap().active
    }

    /// Suspend until a slot is free, honoring FIFO order among waiters
    /// that queued while the gate was full, then take the slot.
    pub async fn acquire(&self) -> LimiterPermit<'_> {
        let ticket = {
            let mut state = self.state.lock().unwrap();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(ticket);
            ticket
        };

        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.active < self.max && state.waiters.front() == Some(&ticket) {
                    state.waiters.pop_front();
                    state.active += 1;
                    return LimiterPermit { limiter: self };
                }
            }
            self.notify.notified().await;
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = state.active.saturating_sub(1);
        drop(state);
        self.notify.notify_waiters();
    }
}
