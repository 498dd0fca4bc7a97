//! Fixed-cadence detection scheduling.
//!
//! The [`DetectionScheduler`] invokes a detector backend on a fixed
//! wall-clock period and publishes the latest completed detection set to a
//! [`DetectionFeed`]. The loop guarantees:
//!
//! - At most one inference call in flight. A tick that lands while a call is
//!   running is skipped, so inference latency above the tick period cannot
//!   queue work without bound.
//! - Ticks against a not-ready source are skipped silently.
//! - A per-call detector failure is logged and published as an empty set for
//!   that cycle; the loop never crashes.
//! - Publishes are strictly ordered by tick. Each tick takes its sequence
//!   number at tick start and the feed rejects stale sequences, so a slow
//!   earlier tick cannot overwrite a later tick's result.
//! - `stop()` cancels the periodic timer and joins the worker, which waits
//!   out any in-flight inference. No publish happens after `stop()` returns.
//!
//! A skipped tick is not retried early; the next attempt is the next fixed
//! tick. Time is injected through the [`Clock`] trait so tests drive ticks
//! without real timers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::detect::{Detection, DetectorBackend};
use crate::frame::FrameSource;
use crate::state::StateCell;

/// Default inference period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Published detection state: the latest completed result set.
pub type DetectionFeed = StateCell<Vec<Detection>>;

// ----------------------------------------------------------------------------
// Clock
// ----------------------------------------------------------------------------

/// Time source for the scheduler loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock for tests. `sleep` advances the clock instead of
/// blocking, so a spawned scheduler loop runs as fast as it can tick.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|p| p.into_inner());
        self.base + offset
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        // Let other threads (a stop signal in particular) get a look in.
        std::thread::yield_now();
    }
}

// ----------------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------------

/// Outcome of one scheduled inference attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Inference completed and the feed accepted the result set.
    Published(usize),
    /// Source not ready; skipped silently.
    SkippedNotReady,
    /// A previous inference call is still in flight; skipped.
    SkippedBusy,
    /// Detector failed this cycle; an empty set was published.
    RecoveredEmpty,
    /// A newer tick already published; this result was discarded.
    Stale,
}

/// Owns the detection cadence and the feed it publishes to.
pub struct DetectionScheduler {
    source: Arc<dyn FrameSource>,
    backend: Arc<Mutex<dyn DetectorBackend>>,
    feed: DetectionFeed,
    in_flight: Arc<AtomicBool>,
    next_seq: AtomicU64,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl DetectionScheduler {
    pub fn new(
        source: Arc<dyn FrameSource>,
        backend: Arc<Mutex<dyn DetectorBackend>>,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            backend,
            feed: DetectionFeed::new(Vec::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
            next_seq: AtomicU64::new(0),
            interval,
            clock,
        }
    }

    /// Handle to the published detection state. Initially empty; no
    /// detections exist until the first successful cycle.
    pub fn feed(&self) -> DetectionFeed {
        self.feed.clone()
    }

    /// Run one tick. Public so tests can drive the cadence directly.
    pub fn run_tick(&self) -> TickOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            log::debug!("tick {} skipped: inference in flight", seq);
            return TickOutcome::SkippedBusy;
        };

        if !self.source.is_ready() {
            return TickOutcome::SkippedNotReady;
        }
        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::SkippedNotReady;
        };

        let result = {
            let mut backend = match self.backend.lock() {
                Ok(backend) => backend,
                Err(_) => {
                    log::error!("tick {}: detector lock poisoned", seq);
                    self.feed.publish_at(seq, Vec::new());
                    return TickOutcome::RecoveredEmpty;
                }
            };
            backend.detect(&frame.pixels, frame.width, frame.height)
        };

        match result {
            Ok(detections) => {
                let count = detections.len();
                if self.feed.publish_at(seq, detections) {
                    TickOutcome::Published(count)
                } else {
                    TickOutcome::Stale
                }
            }
            Err(err) => {
                log::warn!("tick {}: inference failed, treating as empty: {}", seq, err);
                self.feed.publish_at(seq, Vec::new());
                TickOutcome::RecoveredEmpty
            }
        }
    }

    /// Start the periodic loop on a worker thread.
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            let mut next_tick = self.clock.now() + self.interval;
            while !shutdown_thread.load(Ordering::SeqCst) {
                let now = self.clock.now();
                if now < next_tick {
                    // Bounded naps keep stop() prompt.
                    let wait = (next_tick - now).min(Duration::from_millis(20));
                    self.clock.sleep(wait);
                    continue;
                }
                let outcome = self.run_tick();
                log::trace!("tick outcome: {:?}", outcome);
                // Missed deadlines are dropped, not made up.
                while next_tick <= self.clock.now() {
                    next_tick += self.interval;
                }
            }
        });
        SchedulerHandle {
            shutdown,
            join: Some(join),
        }
    }
}

/// Scoped in-flight marker. Released on every exit path, panics included.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Running scheduler lifecycle handle.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal shutdown and join the worker. Any in-flight inference finishes
    /// before this returns; nothing publishes afterwards.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("scheduler thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use crate::frame::{FrameGeometry, FrameHandle};

    struct ReadySource {
        ready: AtomicBool,
    }

    impl ReadySource {
        fn new(ready: bool) -> Self {
            Self {
                ready: AtomicBool::new(ready),
            }
        }
    }

    impl FrameSource for ReadySource {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn current_frame(&self) -> Option<FrameHandle> {
            if !self.is_ready() {
                return None;
            }
            Some(FrameHandle {
                pixels: vec![0u8; 64 * 48],
                width: 64,
                height: 48,
            })
        }

        fn geometry(&self) -> FrameGeometry {
            FrameGeometry::new(64, 48)
        }
    }

    fn scheduler_with(source: ReadySource, backend: impl DetectorBackend + 'static) -> DetectionScheduler {
        DetectionScheduler::new(
            Arc::new(source),
            Arc::new(Mutex::new(backend)),
            DEFAULT_TICK_INTERVAL,
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn not_ready_source_is_skipped_silently() {
        let scheduler = scheduler_with(ReadySource::new(false), StubBackend::new());
        assert_eq!(scheduler.run_tick(), TickOutcome::SkippedNotReady);
        assert_eq!(scheduler.feed().versioned().0, 0);
    }

    #[test]
    fn successful_tick_publishes_detections() {
        let scheduler = scheduler_with(ReadySource::new(true), StubBackend::new());
        assert_eq!(scheduler.run_tick(), TickOutcome::Published(1));
        let (version, detections) = scheduler.feed().versioned();
        assert_eq!(version, 1);
        assert_eq!(detections.len(), 1);
    }

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _pixels: &[u8], _w: u32, _h: u32) -> Result<Vec<Detection>> {
            Err(anyhow!("inference exploded"))
        }
    }

    #[test]
    fn detector_failure_publishes_empty_set() {
        let scheduler = scheduler_with(ReadySource::new(true), FailingBackend);
        assert_eq!(scheduler.run_tick(), TickOutcome::RecoveredEmpty);
        let (version, detections) = scheduler.feed().versioned();
        assert_eq!(version, 1);
        assert!(detections.is_empty());
    }

    #[test]
    fn busy_guard_rejects_second_entry() {
        let scheduler = scheduler_with(ReadySource::new(true), StubBackend::new());
        let _held = InFlightGuard::acquire(&scheduler.in_flight).unwrap();
        assert_eq!(scheduler.run_tick(), TickOutcome::SkippedBusy);
    }
}
