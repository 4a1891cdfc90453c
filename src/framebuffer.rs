// Source frame buffer - shared indexed-color pixel memory
//
// 640×360 bytes, one palette index per pixel. The producer (the emulation
// core) writes into this buffer at any time while the renderer reads from
// it, with no lock on either side. Each byte is an `AtomicU8` accessed with
// relaxed ordering: a read racing a write observes either the old or the new
// palette index, never torn data, which is exactly the benign-race contract
// this engine is built on. A tile rendered from mid-write data is at worst
// transiently inconsistent for one frame and is repainted on the next drain.

use crate::config::{FRAME_BUFFER_SIZE, SCREEN_WIDTH, TILE_HEIGHT, TILE_WIDTH};
use std::sync::atomic::{AtomicU8, Ordering};

/// Shared source frame buffer (8-bit indexed color)
pub struct FrameBuffer {
    pixels: Box<[AtomicU8]>,
}

impl FrameBuffer {
    /// Fill value for a freshly allocated buffer (mid gray)
    pub const CLEAR_INDEX: u8 = 0x80;

    /// Allocate the frame buffer, filled with [`Self::CLEAR_INDEX`]
    ///
    /// # Returns
    ///
    /// The buffer, or `None` if the allocation failed
    pub fn new() -> Option<Self> {
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(FRAME_BUFFER_SIZE).ok()?;
        pixels.resize_with(FRAME_BUFFER_SIZE, || AtomicU8::new(Self::CLEAR_INDEX));
        Some(Self {
            pixels: pixels.into_boxed_slice(),
        })
    }

    /// Buffer size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false; the buffer has a fixed non-zero size
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Write one byte at a raw buffer offset (out-of-bounds writes ignored)
    #[inline]
    pub fn write(&self, offset: usize, value: u8) {
        if let Some(pixel) = self.pixels.get(offset) {
            pixel.store(value, Ordering::Relaxed);
        }
    }

    /// Write one pixel at the given coordinates (out-of-bounds ignored)
    #[inline]
    pub fn write_pixel(&self, x: usize, y: usize, value: u8) {
        if x < SCREEN_WIDTH {
            self.write(y * SCREEN_WIDTH + x, value);
        }
    }

    /// Write a run of bytes starting at a raw offset, clamped to the buffer
    pub fn write_slice(&self, offset: usize, data: &[u8]) {
        for (i, &value) in data.iter().enumerate() {
            match self.pixels.get(offset + i) {
                Some(pixel) => pixel.store(value, Ordering::Relaxed),
                None => break,
            }
        }
    }

    /// Fill the whole buffer with one palette index
    pub fn fill(&self, value: u8) {
        for pixel in self.pixels.iter() {
            pixel.store(value, Ordering::Relaxed);
        }
    }

    /// Read one byte at a raw buffer offset
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds
    #[inline]
    pub fn read(&self, offset: usize) -> u8 {
        self.pixels[offset].load(Ordering::Relaxed)
    }

    /// Copy one tile's bytes into a contiguous snapshot buffer
    ///
    /// This bounds the race window against the producer to a single small
    /// copy: a write landing inside this tile during the copy is either
    /// fully included or left for the next drain. `out` must hold at least
    /// `TILE_WIDTH * TILE_HEIGHT` bytes.
    pub fn snapshot_tile(&self, tile_x: usize, tile_y: usize, out: &mut [u8]) {
        let start_x = tile_x * TILE_WIDTH;
        let start_y = tile_y * TILE_HEIGHT;

        for row in 0..TILE_HEIGHT {
            let src = (start_y + row) * SCREEN_WIDTH + start_x;
            let dst = row * TILE_WIDTH;
            for col in 0..TILE_WIDTH {
                out[dst + col] = self.pixels[src + col].load(Ordering::Relaxed);
            }
        }
    }

    /// Copy one source row into a snapshot buffer
    ///
    /// `out` must hold at least `SCREEN_WIDTH` bytes.
    pub fn snapshot_row(&self, y: usize, out: &mut [u8]) {
        let base = y * SCREEN_WIDTH;
        for x in 0..SCREEN_WIDTH {
            out[x] = self.pixels[base + x].load(Ordering::Relaxed);
        }
    }

    /// Copy the whole buffer into a snapshot (compare-fallback path)
    ///
    /// `out` must hold at least [`FRAME_BUFFER_SIZE`] bytes.
    pub fn snapshot_into(&self, out: &mut [u8]) {
        for (dst, pixel) in out.iter_mut().zip(self.pixels.iter()) {
            *dst = pixel.load(Ordering::Relaxed);
        }
    }
}
