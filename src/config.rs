// Engine configuration
//
// Fixed display geometry (compile-time constants) plus the runtime-tunable
// engine options, with TOML persistence.
//
// The geometry targets one source resolution, one tile size and one integer
// upscale factor: 640×360 8-bit indexed source, 40×40 tiles (16×9 grid,
// 144 tiles), 2× scaling to a 1280×720 16-bit destination.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Source framebuffer width in pixels
pub const SCREEN_WIDTH: usize = 640;

/// Source framebuffer height in pixels
pub const SCREEN_HEIGHT: usize = 360;

/// Source framebuffer size in bytes (one byte per pixel, 8-bit indexed)
pub const FRAME_BUFFER_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Tile width in source pixels
pub const TILE_WIDTH: usize = 40;

/// Tile height in source pixels
pub const TILE_HEIGHT: usize = 40;

/// Number of tile columns
pub const TILES_X: usize = SCREEN_WIDTH / TILE_WIDTH;

/// Number of tile rows
pub const TILES_Y: usize = SCREEN_HEIGHT / TILE_HEIGHT;

/// Total number of tiles in the grid (16×9 = 144)
pub const TOTAL_TILES: usize = TILES_X * TILES_Y;

/// Integer upscale factor applied on both axes
pub const PIXEL_SCALE: usize = 2;

/// Destination (display) width in pixels
pub const DISPLAY_WIDTH: usize = SCREEN_WIDTH * PIXEL_SCALE;

/// Destination (display) height in pixels
pub const DISPLAY_HEIGHT: usize = SCREEN_HEIGHT * PIXEL_SCALE;

/// Scaled tile width in destination pixels (80)
pub const SCALED_TILE_WIDTH: usize = TILE_WIDTH * PIXEL_SCALE;

/// Scaled tile height in destination pixels (80)
pub const SCALED_TILE_HEIGHT: usize = TILE_HEIGHT * PIXEL_SCALE;

// The tile grid must cover the source buffer exactly, with no remainder.
const _: () = assert!(SCREEN_WIDTH % TILE_WIDTH == 0);
const _: () = assert!(SCREEN_HEIGHT % TILE_HEIGHT == 0);
const _: () = assert!(TILES_X * TILE_WIDTH == SCREEN_WIDTH);
const _: () = assert!(TILES_Y * TILE_HEIGHT == SCREEN_HEIGHT);

/// Default configuration file path
const CONFIG_FILE: &str = "tilestream_config.toml";

/// Dirty-tracking strategy
///
/// `WriteMarking` is the preferred path: the producer reports every write
/// and tiles are marked with an atomic OR, so detection cost scales with the
/// number of writes. `FrameCompare` is the fallback: the whole source buffer
/// is snapshotted and compared against the previous frame every cycle,
/// which costs O(buffer size) regardless of how little changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStrategy {
    /// Mark tiles at write time via `mark_dirty` (preferred)
    WriteMarking,

    /// Compare full-frame snapshots each cycle (fallback)
    FrameCompare,
}

/// Engine configuration
///
/// Stores the runtime-tunable knobs of the render scheduler. The display
/// geometry itself is fixed at build time (see the constants above).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dirty-tracking strategy
    pub tracking: TrackingStrategy,

    /// Dirty-tile percentage above which a full update replaces many small
    /// partial transfers (0-100)
    pub dirty_threshold_percent: u32,

    /// Minimum interval between completed renders in milliseconds
    /// (caps the maximum frame rate)
    pub min_frame_interval_ms: u64,

    /// Idle wait timeout in milliseconds — the scheduler renders at least
    /// this often even with no frame-ready signal (~15 FPS floor at 67 ms)
    pub idle_timeout_ms: u64,

    /// Interval between performance counter reports in seconds
    pub perf_report_interval_secs: u64,
}

impl EngineConfig {
    /// Create a configuration with default values
    ///
    /// Default: write-time tracking, 80% threshold, 67 ms frame interval,
    /// 67 ms idle timeout, 5 s perf reports.
    pub fn new() -> Self {
        Self {
            tracking: TrackingStrategy::WriteMarking,
            dirty_threshold_percent: 80,
            min_frame_interval_ms: 67,
            idle_timeout_ms: 67,
            perf_report_interval_secs: 5,
        }
    }

    /// Set the dirty-tracking strategy
    pub fn with_tracking(mut self, tracking: TrackingStrategy) -> Self {
        self.tracking = tracking;
        self
    }

    /// Set the dirty-tile threshold percentage (clamped to 0-100)
    pub fn with_dirty_threshold(mut self, percent: u32) -> Self {
        self.dirty_threshold_percent = percent.min(100);
        self
    }

    /// Set the minimum frame interval in milliseconds
    pub fn with_min_frame_interval_ms(mut self, ms: u64) -> Self {
        self.min_frame_interval_ms = ms;
        self
    }

    /// Set the idle wait timeout in milliseconds (at least 1 ms)
    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms.max(1);
        self
    }

    /// Number of dirty tiles above which a full update is performed
    ///
    /// With 144 tiles and an 80% threshold this is 115: 115 dirty tiles
    /// still render partially, 116 switch to a full update.
    pub fn dirty_threshold_tiles(&self) -> usize {
        TOTAL_TILES * self.dirty_threshold_percent as usize / 100
    }

    /// Load configuration from the default file or create it
    ///
    /// If the configuration file doesn't exist or can't be parsed, creates a
    /// default configuration and tries to save it.
    ///
    /// # Returns
    ///
    /// The loaded or default configuration
    pub fn load_or_default() -> Self {
        Self::load(CONFIG_FILE).unwrap_or_else(|_| {
            let config = Self::new();
            // Try to save the default config, but don't fail if we can't
            let _ = config.save(CONFIG_FILE);
            config
        })
    }

    /// Load configuration from a file
    ///
    /// # Returns
    ///
    /// Result containing the configuration or an error
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save configuration to a file
    ///
    /// # Returns
    ///
    /// Result indicating success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), io::Error> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_grid_covers_screen() {
        assert_eq!(TILES_X, 16);
        assert_eq!(TILES_Y, 9);
        assert_eq!(TOTAL_TILES, 144);
        assert_eq!(TILES_X * TILE_WIDTH, SCREEN_WIDTH);
        assert_eq!(TILES_Y * TILE_HEIGHT, SCREEN_HEIGHT);
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tracking, TrackingStrategy::WriteMarking);
        assert_eq!(config.dirty_threshold_percent, 80);
        assert_eq!(config.min_frame_interval_ms, 67);
        assert_eq!(config.idle_timeout_ms, 67);
    }

    #[test]
    fn test_threshold_tiles() {
        // 144 * 80 / 100 = 115 (integer division)
        let config = EngineConfig::new();
        assert_eq!(config.dirty_threshold_tiles(), 115);

        let config = EngineConfig::new().with_dirty_threshold(100);
        assert_eq!(config.dirty_threshold_tiles(), TOTAL_TILES);

        let config = EngineConfig::new().with_dirty_threshold(0);
        assert_eq!(config.dirty_threshold_tiles(), 0);
    }

    #[test]
    fn test_builder_clamps() {
        let config = EngineConfig::new()
            .with_dirty_threshold(150)
            .with_idle_timeout_ms(0);
        assert_eq!(config.dirty_threshold_percent, 100);
        assert_eq!(config.idle_timeout_ms, 1);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::new().with_tracking(TrackingStrategy::FrameCompare);
        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        let deserialized: EngineConfig =
            toml::from_str(&toml_str).expect("Failed to deserialize");
        assert_eq!(deserialized, config);
    }
}
