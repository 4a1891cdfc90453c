// tilestream - incremental tile-based display-update engine
//
// Converts a continuously mutated, indexed-color framebuffer into a scaled
// true-color image streamed to a display sink, while a producer context
// writes into that framebuffer concurrently. Dirty tracking works per tile
// (write-time marking with a full-frame comparison fallback); renders are
// full, partial or skipped depending on how much of the frame changed.

// Public modules
pub mod compositor;
pub mod config;
pub mod dirty;
pub mod engine;
pub mod framebuffer;
pub mod palette;
pub mod render;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod stats;
pub mod window;

// Re-export main types for convenience
pub use compositor::{decide, Compositor, UpdateDecision};
pub use config::{EngineConfig, TrackingStrategy};
pub use dirty::{CompareTracker, DirtyBitmap, TileSet};
pub use engine::{DisplayEngine, EngineError, ProducerHandle};
pub use framebuffer::FrameBuffer;
pub use palette::{rgb888_to_native, PaletteTable};
pub use scheduler::{FrameSignal, RenderLoop, SharedState, StepOutcome};
pub use sink::{DisplaySink, MemorySink};
pub use snapshot::{save_frame_dump, save_frame_dump_auto, FrameDumpError};
pub use stats::PerfCounters;
pub use window::{run_display, DisplayWindow, WindowConfig};
