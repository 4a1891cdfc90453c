// Render Scheduler - the consumer-side control loop
//
// One long-lived thread owns the compositor and the display sink and cycles
// through Idle → Woken → Rate-Checked → Rendering → Idle:
//
// - Idle blocks on the frame signal with a timeout, so the engine renders
//   at least periodically (~15 FPS at the 67 ms default) even when the
//   producer never signals.
// - A signal wake arriving sooner than the minimum frame interval after the
//   last completed step is abandoned to cap the frame rate; the next wake
//   retries. Timeout wakes are never rate-limited.
// - Rendering drains the dirty tracker (or runs the comparison fallback),
//   lets the compositor decide and execute, and records timing counters.
//
// Nothing in a step can fail; a degraded or skipped frame is superseded by
// the next cycle. Termination is cooperative: teardown clears the running
// flag and signals, and the loop exits on its next wake.

use crate::compositor::{self, Compositor, UpdateDecision};
use crate::config::{EngineConfig, TrackingStrategy};
use crate::dirty::{CompareTracker, DirtyBitmap, TileSet};
use crate::framebuffer::FrameBuffer;
use crate::palette::PaletteTable;
use crate::sink::DisplaySink;
use crate::stats::PerfCounters;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Producer-to-consumer frame-ready signal
///
/// `notify` is non-blocking and safe from the producer context at any time;
/// `wait_timeout` is only ever called by the scheduler thread.
pub struct FrameSignal {
    ready: Mutex<bool>,
    condvar: Condvar,
}

impl FrameSignal {
    /// Create an unsignaled frame signal
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Mark a frame ready and wake the scheduler
    pub fn notify(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        self.condvar.notify_one();
    }

    /// Wait for a signal or until the timeout elapses
    ///
    /// # Returns
    ///
    /// `true` if an explicit signal woke the wait, `false` on timeout
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        if !*ready {
            let (guard, _) = self
                .condvar
                .wait_timeout(ready, timeout)
                .unwrap_or_else(|e| e.into_inner());
            ready = guard;
        }
        std::mem::take(&mut *ready)
    }
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the producer-facing engine API and the scheduler
pub struct SharedState {
    /// The indexed-color source framebuffer
    pub frame: FrameBuffer,
    /// The palette table
    pub palette: PaletteTable,
    /// Write-accumulation dirty bitmap
    pub dirty: DirtyBitmap,
    /// Frame-ready signal
    pub signal: FrameSignal,
    /// Cleared by teardown; checked once per Idle wake
    pub running: AtomicBool,
    /// Forces the next render to be a full update
    pub force_full: AtomicBool,
    /// Advisory performance counters
    pub counters: PerfCounters,
}

/// What a single scheduler step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Signal arrived too soon after the last render; step abandoned
    RateLimited,
    /// Full-frame update rendered and pushed
    Full,
    /// Dirty tiles rendered and pushed
    Partial,
    /// Nothing dirty, nothing forced; no render
    Skipped,
}

/// The render loop: owns the consumer-side rendering state
pub struct RenderLoop {
    shared: Arc<SharedState>,
    compositor: Compositor,
    sink: Box<dyn DisplaySink>,
    compare: Option<CompareTracker>,
    tiles: TileSet,
    config: EngineConfig,
    threshold_tiles: usize,
    last_render: Instant,
}

impl RenderLoop {
    /// Assemble the render loop
    ///
    /// `compare` must be `Some` when the configuration selects the
    /// comparison fallback; the engine allocates it at init.
    pub fn new(
        shared: Arc<SharedState>,
        compositor: Compositor,
        sink: Box<dyn DisplaySink>,
        compare: Option<CompareTracker>,
        config: EngineConfig,
    ) -> Self {
        Self {
            shared,
            compositor,
            sink,
            compare,
            tiles: TileSet::new(),
            threshold_tiles: config.dirty_threshold_tiles(),
            config,
            last_render: Instant::now(),
        }
    }

    /// Run until the running flag clears
    pub fn run(mut self) {
        info!(
            strategy = ?self.config.tracking,
            threshold_tiles = self.threshold_tiles,
            "render scheduler started"
        );

        let idle_timeout = Duration::from_millis(self.config.idle_timeout_ms);
        loop {
            let woken = self.shared.signal.wait_timeout(idle_timeout);
            if !self.shared.running.load(Ordering::Acquire) {
                break;
            }
            self.step(woken);
        }

        info!("render scheduler exiting");
    }

    /// Execute one render step
    ///
    /// `woken` distinguishes an explicit frame-ready signal from a timeout
    /// wake; only signal wakes are rate-limited.
    pub fn step(&mut self, woken: bool) -> StepOutcome {
        let counters = &self.shared.counters;
        let now = Instant::now();

        if woken
            && now.duration_since(self.last_render)
                < Duration::from_millis(self.config.min_frame_interval_ms)
        {
            PerfCounters::bump(&counters.rate_limited);
            return StepOutcome::RateLimited;
        }

        // Self-consistent palette copy for the rest of this pass
        let palette = self.shared.palette.snapshot();
        let force_full = self.shared.force_full.swap(false, Ordering::AcqRel);

        let dirty_count = match self.config.tracking {
            TrackingStrategy::WriteMarking => {
                let t0 = Instant::now();
                let count = self.shared.dirty.drain(&mut self.tiles);
                PerfCounters::add_time(&counters.detect_us, t0.elapsed());
                count
            }
            TrackingStrategy::FrameCompare => match self.compare.as_mut() {
                Some(tracker) => {
                    let t0 = Instant::now();
                    tracker.take_snapshot(&self.shared.frame);
                    PerfCounters::add_time(&counters.snapshot_us, t0.elapsed());

                    let t0 = Instant::now();
                    let count = tracker.compare_and_swap(&mut self.tiles);
                    PerfCounters::add_time(&counters.detect_us, t0.elapsed());
                    count
                }
                None => 0,
            },
        };

        let decision = compositor::decide(dirty_count, force_full, self.threshold_tiles);
        let outcome = match decision {
            UpdateDecision::Full => {
                self.compositor.full_update(
                    &self.shared.frame,
                    &palette,
                    self.sink.as_mut(),
                    counters,
                );
                StepOutcome::Full
            }
            UpdateDecision::Partial => {
                self.compositor.partial_update(
                    &self.shared.frame,
                    &palette,
                    &self.tiles,
                    self.sink.as_mut(),
                    counters,
                );
                StepOutcome::Partial
            }
            UpdateDecision::Skip => {
                PerfCounters::bump(&counters.skipped_frames);
                StepOutcome::Skipped
            }
        };

        self.last_render = now;
        counters.maybe_report(Duration::from_secs(self.config.perf_report_interval_secs));
        outcome
    }

    /// Clear the display to one color (initial state at engine init)
    pub fn clear_display(&mut self, color: u16) {
        self.compositor.clear_and_push(color, self.sink.as_mut());
    }
}
