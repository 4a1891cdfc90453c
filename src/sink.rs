// Display Sink - the physical output seam
//
// A sink receives rendered swap565 pixel blocks: begin a transfer batch,
// declare a rectangular target window, stream the window's pixels, end the
// batch. The contract mirrors a typical LCD interface (set address window,
// write pixels over the bus): the caller guarantees that the streamed block
// length exactly matches the declared window area, and the sink does not
// retain the block after the call returns.

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use std::sync::{Arc, Mutex};

/// Output device abstraction for rendered pixel blocks
///
/// Implementations must be `Send`: the sink is owned and driven by the
/// render scheduler thread.
pub trait DisplaySink: Send {
    /// Begin a transfer batch
    fn begin(&mut self);

    /// Declare the destination window for the next pixel stream
    ///
    /// Coordinates and sizes are in destination (display) pixels.
    fn set_window(&mut self, x: usize, y: usize, width: usize, height: usize);

    /// Stream a contiguous block of swap565 pixels into the current window
    ///
    /// The block length must equal the declared window area.
    fn write_pixels(&mut self, pixels: &[u16]);

    /// End the transfer batch
    fn end(&mut self);
}

/// Destination window state for [`MemorySink`]
#[derive(Debug, Clone, Copy)]
struct Window {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

/// A sink backed by shared destination pixel memory
///
/// Stands in for display hardware: windows are scattered into a
/// `DISPLAY_WIDTH`×`DISPLAY_HEIGHT` pixel buffer that a presentation layer
/// (the demo window, a test) reads through [`MemorySink::pixels`].
pub struct MemorySink {
    pixels: Arc<Mutex<Vec<u16>>>,
    window: Option<Window>,
}

impl MemorySink {
    /// Allocate the destination memory, cleared to black
    ///
    /// # Returns
    ///
    /// The sink, or `None` if the allocation failed
    pub fn new() -> Option<Self> {
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(DISPLAY_WIDTH * DISPLAY_HEIGHT)
            .ok()?;
        pixels.resize(DISPLAY_WIDTH * DISPLAY_HEIGHT, 0);
        Some(Self {
            pixels: Arc::new(Mutex::new(pixels)),
            window: None,
        })
    }

    /// Shared handle to the destination pixel memory
    pub fn pixels(&self) -> Arc<Mutex<Vec<u16>>> {
        Arc::clone(&self.pixels)
    }
}

impl DisplaySink for MemorySink {
    fn begin(&mut self) {}

    fn set_window(&mut self, x: usize, y: usize, width: usize, height: usize) {
        debug_assert!(x + width <= DISPLAY_WIDTH);
        debug_assert!(y + height <= DISPLAY_HEIGHT);
        self.window = Some(Window {
            x,
            y,
            width,
            height,
        });
    }

    fn write_pixels(&mut self, pixels: &[u16]) {
        let Some(window) = self.window.take() else {
            return;
        };
        debug_assert_eq!(pixels.len(), window.width * window.height);

        let mut dest = self.pixels.lock().unwrap_or_else(|e| e.into_inner());
        for row in 0..window.height {
            let src = row * window.width;
            let dst = (window.y + row) * DISPLAY_WIDTH + window.x;
            dest[dst..dst + window.width].copy_from_slice(&pixels[src..src + window.width]);
        }
    }

    fn end(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_scatters_window() {
        let mut sink = MemorySink::new().expect("allocation");
        let shared = sink.pixels();

        sink.begin();
        sink.set_window(10, 20, 2, 2);
        sink.write_pixels(&[1, 2, 3, 4]);
        sink.end();

        let pixels = shared.lock().unwrap();
        assert_eq!(pixels[20 * DISPLAY_WIDTH + 10], 1);
        assert_eq!(pixels[20 * DISPLAY_WIDTH + 11], 2);
        assert_eq!(pixels[21 * DISPLAY_WIDTH + 10], 3);
        assert_eq!(pixels[21 * DISPLAY_WIDTH + 11], 4);
        // Surroundings untouched
        assert_eq!(pixels[20 * DISPLAY_WIDTH + 12], 0);
    }

    #[test]
    fn test_memory_sink_full_frame_window() {
        let mut sink = MemorySink::new().expect("allocation");
        let shared = sink.pixels();

        let frame = vec![0xABCDu16; DISPLAY_WIDTH * DISPLAY_HEIGHT];
        sink.begin();
        sink.set_window(0, 0, DISPLAY_WIDTH, DISPLAY_HEIGHT);
        sink.write_pixels(&frame);
        sink.end();

        let pixels = shared.lock().unwrap();
        assert!(pixels.iter().all(|&p| p == 0xABCD));
    }

    #[test]
    fn test_write_without_window_is_ignored() {
        let mut sink = MemorySink::new().expect("allocation");
        let shared = sink.pixels();
        sink.write_pixels(&[0xFFFF; 4]);
        assert!(shared.lock().unwrap().iter().all(|&p| p == 0));
    }
}
