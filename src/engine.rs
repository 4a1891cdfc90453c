// Display engine - lifecycle and producer-facing API
//
// `DisplayEngine::init` allocates every buffer the subsystem needs, seeds
// the default palette, puts the display into a defined state and spawns the
// render scheduler thread. `shutdown` stops the thread cooperatively and is
// idempotent. In between, the producer (the emulation core) interacts with
// the engine only through a cloneable `ProducerHandle` whose operations are
// all non-blocking and safe at any time relative to a render pass — even
// after shutdown, when they degrade to harmless no-ops.

use crate::compositor::Compositor;
use crate::config::{EngineConfig, TrackingStrategy, TOTAL_TILES};
use crate::dirty::{CompareTracker, DirtyBitmap};
use crate::framebuffer::FrameBuffer;
use crate::palette::{rgb888_to_native, PaletteTable};
use crate::scheduler::{FrameSignal, RenderLoop, SharedState};
use crate::sink::DisplaySink;
use crate::stats::PerfCounters;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Errors that can occur during engine initialization
#[derive(Debug)]
pub enum EngineError {
    /// A buffer allocation failed; names the buffer that could not be
    /// allocated. No partial state is retained.
    Allocation(&'static str),

    /// The render scheduler thread could not be spawned
    Thread(io::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Allocation(what) => write!(f, "Failed to allocate {}", what),
            EngineError::Thread(e) => write!(f, "Failed to spawn render thread: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Thread(e)
    }
}

/// The incremental display-update engine
///
/// Owns the shared state and the render scheduler thread. Dropping the
/// engine shuts it down.
pub struct DisplayEngine {
    shared: Arc<SharedState>,
    config: EngineConfig,
    thread: Option<JoinHandle<()>>,
}

impl DisplayEngine {
    /// Initialize the engine and start the render scheduler
    ///
    /// Allocates the source framebuffer, the destination buffer, and (for
    /// the comparison fallback) the snapshot buffers; clears the display to
    /// dark gray; forces the first frame to be a full update; spawns the
    /// render thread.
    ///
    /// # Arguments
    /// * `config` - scheduler options (strategy, threshold, timing)
    /// * `sink` - the display output the scheduler will push pixels to
    ///
    /// # Returns
    /// The running engine, or an error if any allocation or the thread
    /// spawn failed. All partial allocations are released before returning
    /// failure.
    pub fn init(config: EngineConfig, sink: Box<dyn DisplaySink>) -> Result<Self, EngineError> {
        let frame =
            FrameBuffer::new().ok_or(EngineError::Allocation("source frame buffer"))?;
        let compositor =
            Compositor::new().ok_or(EngineError::Allocation("destination frame buffer"))?;
        let compare = match config.tracking {
            TrackingStrategy::FrameCompare => Some(
                CompareTracker::new().ok_or(EngineError::Allocation("comparison buffers"))?,
            ),
            TrackingStrategy::WriteMarking => None,
        };

        let shared = Arc::new(SharedState {
            frame,
            palette: PaletteTable::new(),
            dirty: DirtyBitmap::new(),
            signal: FrameSignal::new(),
            running: AtomicBool::new(true),
            // The first frame is always a full update
            force_full: AtomicBool::new(true),
            counters: PerfCounters::new(),
        });

        let mut render_loop =
            RenderLoop::new(Arc::clone(&shared), compositor, sink, compare, config);
        render_loop.clear_display(rgb888_to_native(64, 64, 64));

        let thread = thread::Builder::new()
            .name("tilestream-render".to_string())
            .spawn(move || render_loop.run())?;

        info!(
            tiles = TOTAL_TILES,
            strategy = ?config.tracking,
            threshold_percent = config.dirty_threshold_percent,
            "display engine initialized"
        );

        Ok(Self {
            shared,
            config,
            thread: Some(thread),
        })
    }

    /// Create a producer handle
    ///
    /// Handles are cheap to clone and remain valid (as no-ops) after
    /// shutdown.
    pub fn handle(&self) -> ProducerHandle {
        ProducerHandle {
            shared: Arc::clone(&self.shared),
            marking: self.config.tracking == TrackingStrategy::WriteMarking,
        }
    }

    /// Replace palette entries and force a full update
    ///
    /// Every pixel's visible color may have changed even though no source
    /// byte did, so the next render repaints the whole frame.
    pub fn set_palette(&self, colors: &[[u8; 3]]) {
        debug!(entries = colors.len(), "set_palette");
        self.shared.palette.set_palette(colors);
        self.shared.force_full.store(true, Ordering::Release);
    }

    /// Accept a gamma table
    ///
    /// For indexed modes gamma is folded into the palette conversion and
    /// has no separate effect; the table is accepted and ignored.
    pub fn set_gamma(&self, gamma: &[[u8; 3]]) {
        debug!(entries = gamma.len(), "set_gamma (folded into palette)");
    }

    /// Advisory performance counters
    pub fn counters(&self) -> &PerfCounters {
        &self.shared.counters
    }

    /// Whether the render scheduler is still running
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the render scheduler and release the engine's thread
    ///
    /// Cooperative: clears the running flag, wakes the scheduler and joins
    /// it. Idempotent; producer handles outstanding after shutdown keep
    /// working but affect nothing.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.running.store(false, Ordering::Release);
            self.shared.signal.notify();
            let _ = thread.join();
            info!("display engine shut down");
        }
    }
}

impl Drop for DisplayEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Producer-facing handle to the engine
///
/// All operations are non-blocking and safe to call from the producer
/// context at any time, including during a render pass.
#[derive(Clone)]
pub struct ProducerHandle {
    shared: Arc<SharedState>,
    marking: bool,
}

impl ProducerHandle {
    /// The shared source framebuffer
    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.shared.frame
    }

    /// Source framebuffer size in bytes
    pub fn frame_buffer_size(&self) -> usize {
        self.shared.frame.len()
    }

    /// Report a framebuffer write for dirty tracking
    ///
    /// Marks the tiles containing the first and last byte of the write.
    /// No-op when the engine runs the comparison-fallback strategy, which
    /// detects changes by itself.
    #[inline]
    pub fn mark_dirty(&self, offset: usize, len: usize) {
        if self.marking {
            self.shared.dirty.mark_range(offset, len);
        }
    }

    /// Write one byte and mark its tile dirty
    #[inline]
    pub fn write(&self, offset: usize, value: u8) {
        self.shared.frame.write(offset, value);
        self.mark_dirty(offset, 1);
    }

    /// Write one pixel and mark its tile dirty (out-of-bounds ignored)
    #[inline]
    pub fn write_pixel(&self, x: usize, y: usize, value: u8) {
        use crate::config::{SCREEN_HEIGHT, SCREEN_WIDTH};
        if x < SCREEN_WIDTH && y < SCREEN_HEIGHT {
            self.write(y * SCREEN_WIDTH + x, value);
        }
    }

    /// Write a run of bytes and mark the touched tiles dirty
    pub fn write_slice(&self, offset: usize, data: &[u8]) {
        self.shared.frame.write_slice(offset, data);
        self.mark_dirty(offset, data.len());
    }

    /// Signal that a frame is ready to render
    ///
    /// Wakes the scheduler immediately instead of waiting for its idle
    /// timeout. Never blocks the producer.
    pub fn signal_frame_ready(&self) {
        self.shared.signal.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SCREEN_WIDTH, TILE_WIDTH};
    use crate::dirty::TileSet;
    use crate::sink::MemorySink;

    fn init_engine(config: EngineConfig) -> DisplayEngine {
        let sink = MemorySink::new().expect("allocation");
        DisplayEngine::init(config, Box::new(sink)).expect("engine init")
    }

    #[test]
    fn test_init_and_shutdown() {
        let mut engine = init_engine(EngineConfig::new());
        assert!(engine.is_running());
        engine.shutdown();
        assert!(!engine.is_running());
        // Idempotent
        engine.shutdown();
    }

    #[test]
    fn test_handle_outlives_shutdown() {
        let mut engine = init_engine(EngineConfig::new());
        let handle = engine.handle();
        engine.shutdown();

        // Degrades to a no-op: nothing to crash into
        handle.write_pixel(0, 0, 1);
        handle.mark_dirty(0, 1);
        handle.signal_frame_ready();
    }

    #[test]
    fn test_handle_writes_and_marks() {
        let mut engine = init_engine(EngineConfig::new());
        let handle = engine.handle();

        engine.shutdown();
        // Handle operations keep working against the shared state
        handle.write_pixel(TILE_WIDTH, 0, 0x42);
        assert_eq!(handle.frame_buffer().read(TILE_WIDTH), 0x42);
        assert_eq!(handle.frame_buffer_size(), SCREEN_WIDTH * 360);

        // The mark for tile 1 is pending in the shared bitmap
        let mut tiles = TileSet::new();
        assert_eq!(engine.shared.dirty.drain(&mut tiles), 1);
        assert!(tiles.contains(1));
    }

    #[test]
    fn test_marking_disabled_under_compare_strategy() {
        let config = EngineConfig::new().with_tracking(TrackingStrategy::FrameCompare);
        let mut engine = init_engine(config);
        let handle = engine.handle();

        engine.shutdown();
        handle.write_pixel(0, 0, 0x01);

        let mut tiles = TileSet::new();
        assert_eq!(engine.shared.dirty.drain(&mut tiles), 0);
    }

    #[test]
    fn test_set_palette_forces_full_update() {
        let mut engine = init_engine(EngineConfig::new());
        engine.shutdown();
        // The scheduler consumed the initial force flag before exiting or
        // it is still pending; either way, setting the palette re-arms it
        engine.set_palette(&[[255, 0, 0]]);
        assert!(engine.shared.force_full.load(Ordering::Acquire));
    }
}
