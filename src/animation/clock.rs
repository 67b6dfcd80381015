// src/animation/clock.rs
//! Time sources for playback and export.
//!
//! Playback is paced by a [`Ticker`], a cancellable repeating task, and export
//! waits on a [`Clock`]. Both come in a Tokio-backed flavour for real use and
//! a manual flavour whose time only moves when the code under test asks it
//! to, so timing-dependent behaviour can be tested without real waits.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Monotonic time plus the ability to suspend.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time via `tokio::time`.
pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and advances `now`.
#[derive(Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A cancellable repeating task with a configurable period.
#[async_trait]
pub trait Ticker: Send {
    /// (Re)start ticking every `period`; the first tick fires one period from now
    fn start(&mut self, period: Duration);

    /// Stop ticking. Idempotent.
    fn cancel(&mut self);

    /// Current period, `None` while cancelled
    fn period(&self) -> Option<Duration>;

    fn is_active(&self) -> bool {
        self.period().is_some()
    }

    /// Wait for the next tick. Returns `false` immediately if not active.
    async fn tick(&mut self) -> bool;
}

/// Ticker backed by `tokio::time::interval`.
#[derive(Default)]
pub struct TokioTicker {
    interval: Option<Interval>,
    period: Option<Duration>,
}

impl TokioTicker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ticker for TokioTicker {
    fn start(&mut self, period: Duration) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.period = Some(period);
    }

    fn cancel(&mut self) {
        self.interval = None;
        self.period = None;
    }

    fn period(&self) -> Option<Duration> {
        self.period
    }

    async fn tick(&mut self) -> bool {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                true
            }
            None => false,
        }
    }
}

/// Deterministic ticker: every `tick` fires at once and advances virtual time
/// by one period. Keeps a log of the periods it was started with.
#[derive(Debug, Default)]
pub struct ManualTicker {
    period: Option<Duration>,
    elapsed: Duration,
    starts: Vec<Duration>,
    cancels: usize,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every period passed to `start`, oldest first
    pub fn starts(&self) -> &[Duration] {
        &self.starts
    }

    pub fn cancels(&self) -> usize {
        self.cancels
    }

    /// Virtual time consumed by ticks so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    fn start(&mut self, period: Duration) {
        self.period = Some(period);
        self.starts.push(period);
    }

    fn cancel(&mut self) {
        if self.period.take().is_some() {
            self.cancels += 1;
        }
    }

    fn period(&self) -> Option<Duration> {
        self.period
    }

    async fn tick(&mut self) -> bool {
        match self.period {
            Some(period) => {
                self.elapsed += period;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(100)).await;
        clock.sleep(Duration::from_millis(50)).await;
        assert_eq!(clock.now(), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_manual_ticker_lifecycle() {
        let mut ticker = ManualTicker::new();
        assert!(!ticker.tick().await);

        ticker.start(Duration::from_millis(500));
        assert!(ticker.tick().await);
        assert!(ticker.tick().await);
        assert_eq!(ticker.elapsed(), Duration::from_secs(1));

        ticker.cancel();
        ticker.cancel();
        assert_eq!(ticker.cancels(), 1);
        assert!(!ticker.is_active());
        assert!(!ticker.tick().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_ticker_first_tick_after_one_period() {
        let mut ticker = TokioTicker::new();
        ticker.start(Duration::from_millis(200));
        let before = Instant::now();
        assert!(ticker.tick().await);
        assert!(before.elapsed() >= Duration::from_millis(200));

        ticker.cancel();
        assert!(!ticker.tick().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleep() {
        let clock = TokioClock::new();
        clock.sleep(Duration::from_millis(100)).await;
        assert!(clock.now() >= Duration::from_millis(100));
    }
}
