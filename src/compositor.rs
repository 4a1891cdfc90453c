// Frame Compositor - full vs partial update decision and execution
//
// Given the drained dirty-tile count, the compositor picks one of three
// outcomes for a render cycle:
//
// - Full update when a full refresh is forced (first frame, palette change)
//   or when more than the threshold share of tiles is dirty — many small
//   window transfers cost more interface overhead than one large one.
// - Partial update when at least one tile is dirty: each dirty tile is
//   snapshotted, converted and pushed as one scaled rectangle.
// - Skip when nothing changed.

use crate::config::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, SCALED_TILE_HEIGHT, SCALED_TILE_WIDTH, TILES_X,
};
use crate::dirty::TileSet;
use crate::framebuffer::FrameBuffer;
use crate::palette::PaletteSnapshot;
use crate::render::{render_full, render_tile, SCALED_TILE_LEN, TILE_SNAPSHOT_LEN};
use crate::sink::DisplaySink;
use crate::stats::PerfCounters;
use std::time::Instant;
use tracing::debug;

/// Outcome of the update decision for one render cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    /// Render and push the entire frame
    Full,
    /// Render and push only the dirty tiles
    Partial,
    /// No visible change; do nothing this cycle
    Skip,
}

/// Decide between full, partial and skip
///
/// `threshold_tiles` is the precomputed tile count for the configured
/// percentage (`TOTAL_TILES * percent / 100`); strictly more dirty tiles
/// than that switch to a full update. With 144 tiles at 80% the boundary
/// sits at 115/116.
pub fn decide(dirty_count: usize, force_full: bool, threshold_tiles: usize) -> UpdateDecision {
    if force_full || dirty_count > threshold_tiles {
        UpdateDecision::Full
    } else if dirty_count > 0 {
        UpdateDecision::Partial
    } else {
        UpdateDecision::Skip
    }
}

/// Executes render passes against a display sink
///
/// Owns the destination frame buffer (used by the full-update path) and the
/// per-tile scratch buffers (used by the partial path).
pub struct Compositor {
    dest: Vec<u16>,
    tile_snapshot: Box<[u8; TILE_SNAPSHOT_LEN]>,
    tile_block: Box<[u16; SCALED_TILE_LEN]>,
}

impl Compositor {
    /// Allocate the destination and scratch buffers
    ///
    /// # Returns
    ///
    /// The compositor, or `None` if an allocation failed
    pub fn new() -> Option<Self> {
        let mut dest = Vec::new();
        dest.try_reserve_exact(DISPLAY_WIDTH * DISPLAY_HEIGHT).ok()?;
        dest.resize(DISPLAY_WIDTH * DISPLAY_HEIGHT, 0);

        Some(Self {
            dest,
            tile_snapshot: Box::new([0; TILE_SNAPSHOT_LEN]),
            tile_block: Box::new([0; SCALED_TILE_LEN]),
        })
    }

    /// Fill the destination with one color and push it as a single window
    ///
    /// Used once at initialization so the display shows a defined state
    /// before the first real frame.
    pub fn clear_and_push(&mut self, color: u16, sink: &mut dyn DisplaySink) {
        self.dest.fill(color);
        push_dest(&self.dest, sink);
    }

    /// Full update: convert the entire source buffer and push it
    pub fn full_update(
        &mut self,
        frame: &FrameBuffer,
        palette: &PaletteSnapshot,
        sink: &mut dyn DisplaySink,
        counters: &PerfCounters,
    ) {
        let t0 = Instant::now();
        render_full(frame, palette, &mut self.dest);
        PerfCounters::add_time(&counters.render_us, t0.elapsed());

        let t0 = Instant::now();
        push_dest(&self.dest, sink);
        PerfCounters::add_time(&counters.push_us, t0.elapsed());

        PerfCounters::bump(&counters.full_frames);
        debug!("full update complete");
    }

    /// Partial update: render and push each dirty tile as one rectangle
    ///
    /// Each tile is copied out of the live framebuffer first, so a
    /// concurrent write elsewhere cannot affect this tile's render and a
    /// write inside the tile is either fully included or left, still
    /// marked, for the next drain.
    pub fn partial_update(
        &mut self,
        frame: &FrameBuffer,
        palette: &PaletteSnapshot,
        tiles: &TileSet,
        sink: &mut dyn DisplaySink,
        counters: &PerfCounters,
    ) {
        sink.begin();
        for tile in tiles.iter() {
            let tile_x = tile % TILES_X;
            let tile_y = tile / TILES_X;

            let t0 = Instant::now();
            frame.snapshot_tile(tile_x, tile_y, self.tile_snapshot.as_mut_slice());
            render_tile(
                self.tile_snapshot.as_slice(),
                palette,
                self.tile_block.as_mut_slice(),
            );
            PerfCounters::add_time(&counters.render_us, t0.elapsed());

            let t0 = Instant::now();
            sink.set_window(
                tile_x * SCALED_TILE_WIDTH,
                tile_y * SCALED_TILE_HEIGHT,
                SCALED_TILE_WIDTH,
                SCALED_TILE_HEIGHT,
            );
            sink.write_pixels(self.tile_block.as_slice());
            PerfCounters::add_time(&counters.push_us, t0.elapsed());
        }
        sink.end();

        PerfCounters::bump(&counters.partial_frames);
        debug!(tiles = tiles.count(), "partial update complete");
    }
}

/// Push the whole destination buffer through the sink as one window
fn push_dest(dest: &[u16], sink: &mut dyn DisplaySink) {
    sink.begin();
    sink.set_window(0, 0, DISPLAY_WIDTH, DISPLAY_HEIGHT);
    sink.write_pixels(dest);
    sink.end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TOTAL_TILES;
    use crate::palette::{rgb888_to_native, PaletteTable};
    use crate::sink::MemorySink;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_decide_threshold_boundary() {
        // 144 tiles at 80% → threshold 115: partial at and below, full above
        let threshold = TOTAL_TILES * 80 / 100;
        assert_eq!(threshold, 115);
        assert_eq!(decide(114, false, threshold), UpdateDecision::Partial);
        assert_eq!(decide(115, false, threshold), UpdateDecision::Partial);
        assert_eq!(decide(116, false, threshold), UpdateDecision::Full);
        assert_eq!(decide(TOTAL_TILES, false, threshold), UpdateDecision::Full);
    }

    #[test]
    fn test_decide_force_full_overrides_zero_dirty() {
        assert_eq!(decide(0, true, 115), UpdateDecision::Full);
        assert_eq!(decide(0, false, 115), UpdateDecision::Skip);
        assert_eq!(decide(1, false, 115), UpdateDecision::Partial);
    }

    #[test]
    fn test_partial_update_touches_only_dirty_region() {
        let frame = FrameBuffer::new().expect("allocation");
        frame.fill(0);
        frame.write_pixel(0, 0, 1);

        let table = PaletteTable::new();
        table.set_palette(&[[0, 0, 0], [255, 0, 0]]);
        let palette = table.snapshot();

        let mut tiles = TileSet::new();
        tiles.insert(0);

        let mut sink = MemorySink::new().expect("allocation");
        let shared = sink.pixels();
        let counters = PerfCounters::new();

        let mut compositor = Compositor::new().expect("allocation");
        compositor.partial_update(&frame, &palette, &tiles, &mut sink, &counters);

        let pixels = shared.lock().unwrap();
        let red = rgb888_to_native(255, 0, 0);
        let black = rgb888_to_native(0, 0, 0);

        // The single source pixel became a 2×2 destination block
        assert_eq!(pixels[0], red);
        assert_eq!(pixels[1], red);
        assert_eq!(pixels[DISPLAY_WIDTH], red);
        assert_eq!(pixels[DISPLAY_WIDTH + 1], red);
        // Rest of tile 0 rendered as background
        assert_eq!(pixels[2], black);
        assert_eq!(
            pixels[(SCALED_TILE_HEIGHT - 1) * DISPLAY_WIDTH + SCALED_TILE_WIDTH - 1],
            black
        );
        // Outside tile 0 the destination was never written (still zero,
        // which is also black in swap565, so check the counter too)
        assert_eq!(pixels[SCALED_TILE_WIDTH], 0);
        assert_eq!(counters.partial_frames.load(Ordering::Relaxed), 1);
        assert_eq!(counters.full_frames.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_full_update_covers_display() {
        let frame = FrameBuffer::new().expect("allocation");
        frame.fill(2);

        let table = PaletteTable::new();
        table.set_palette(&[[0, 0, 0], [255, 0, 0], [0, 255, 0]]);
        let palette = table.snapshot();

        let mut sink = MemorySink::new().expect("allocation");
        let shared = sink.pixels();
        let counters = PerfCounters::new();

        let mut compositor = Compositor::new().expect("allocation");
        compositor.full_update(&frame, &palette, &mut sink, &counters);

        let green = rgb888_to_native(0, 255, 0);
        assert!(shared.lock().unwrap().iter().all(|&p| p == green));
        assert_eq!(counters.full_frames.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_partial_update_tile_coordinates() {
        let frame = FrameBuffer::new().expect("allocation");
        frame.fill(0);
        // Dirty the tile at grid (2, 1): source origin (80, 40)
        frame.write_pixel(2 * crate::config::TILE_WIDTH, crate::config::TILE_HEIGHT, 1);

        let table = PaletteTable::new();
        table.set_palette(&[[0, 0, 0], [255, 255, 255]]);
        let palette = table.snapshot();

        let mut tiles = TileSet::new();
        tiles.insert(TILES_X + 2);

        let mut sink = MemorySink::new().expect("allocation");
        let shared = sink.pixels();
        let counters = PerfCounters::new();

        let mut compositor = Compositor::new().expect("allocation");
        compositor.partial_update(&frame, &palette, &tiles, &mut sink, &counters);

        let white = rgb888_to_native(255, 255, 255);
        let pixels = shared.lock().unwrap();
        // Destination origin of that tile is (160, 80)
        assert_eq!(pixels[80 * DISPLAY_WIDTH + 160], white);
        assert_eq!(pixels[81 * DISPLAY_WIDTH + 161], white);
    }
}
