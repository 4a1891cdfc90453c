// Performance counters - advisory render-loop accounting
//
// Monotonically accumulating timing and count fields, reported and reset on
// a fixed interval. Purely advisory: nothing here ever affects a rendering
// decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Atomic accumulators for one reporting interval
pub struct PerfCounters {
    /// Time spent snapshotting the frame (compare fallback), µs
    pub snapshot_us: AtomicU64,
    /// Time spent draining/detecting dirty tiles, µs
    pub detect_us: AtomicU64,
    /// Time spent converting pixels, µs
    pub render_us: AtomicU64,
    /// Time spent pushing pixels to the sink, µs
    pub push_us: AtomicU64,
    /// Completed full updates
    pub full_frames: AtomicU64,
    /// Completed partial updates
    pub partial_frames: AtomicU64,
    /// Cycles with nothing to render
    pub skipped_frames: AtomicU64,
    /// Wakes abandoned by the rate limiter
    pub rate_limited: AtomicU64,
    last_report: Mutex<Instant>,
}

impl PerfCounters {
    /// Create zeroed counters with the report timer starting now
    pub fn new() -> Self {
        Self {
            snapshot_us: AtomicU64::new(0),
            detect_us: AtomicU64::new(0),
            render_us: AtomicU64::new(0),
            push_us: AtomicU64::new(0),
            full_frames: AtomicU64::new(0),
            partial_frames: AtomicU64::new(0),
            skipped_frames: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            last_report: Mutex::new(Instant::now()),
        }
    }

    /// Add an elapsed duration to one of the timing accumulators
    #[inline]
    pub fn add_time(counter: &AtomicU64, elapsed: Duration) {
        counter.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Increment one of the count fields
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Total render cycles (full + partial + skipped) this interval
    pub fn total_frames(&self) -> u64 {
        self.full_frames.load(Ordering::Relaxed)
            + self.partial_frames.load(Ordering::Relaxed)
            + self.skipped_frames.load(Ordering::Relaxed)
    }

    /// Log averaged stats and reset if the report interval elapsed
    pub fn maybe_report(&self, interval: Duration) {
        let mut last = self.last_report.lock().unwrap_or_else(|e| e.into_inner());
        if last.elapsed() < interval {
            return;
        }
        *last = Instant::now();
        drop(last);

        let frames = self.total_frames();
        if frames > 0 {
            info!(
                frames,
                full = self.full_frames.load(Ordering::Relaxed),
                partial = self.partial_frames.load(Ordering::Relaxed),
                skipped = self.skipped_frames.load(Ordering::Relaxed),
                rate_limited = self.rate_limited.load(Ordering::Relaxed),
                "render stats"
            );
            info!(
                avg_snapshot_us = self.snapshot_us.load(Ordering::Relaxed) / frames,
                avg_detect_us = self.detect_us.load(Ordering::Relaxed) / frames,
                avg_render_us = self.render_us.load(Ordering::Relaxed) / frames,
                avg_push_us = self.push_us.load(Ordering::Relaxed) / frames,
                "render timing"
            );
        }

        self.snapshot_us.store(0, Ordering::Relaxed);
        self.detect_us.store(0, Ordering::Relaxed);
        self.render_us.store(0, Ordering::Relaxed);
        self.push_us.store(0, Ordering::Relaxed);
        self.full_frames.store(0, Ordering::Relaxed);
        self.partial_frames.store(0, Ordering::Relaxed);
        self.skipped_frames.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}
