// Palette Table - indexed color to display-native color conversion
//
// The source framebuffer stores 8-bit palette indices. This module owns the
// 256-entry lookup table that maps those indices to the display's native
// pixel format, byte-swapped RGB565 ("swap565"):
//
// - Low byte:  RRRRRGGG (R5 in bits 7-3, G high 3 bits in bits 2-0)
// - High byte: GGGBBBBB (G low 3 bits in bits 7-5, B5 in bits 4-0)
//
// The table is read for every pixel of every render pass but mutated rarely,
// so it sits behind a short mutex: writers update all entries under the
// lock, and each render pass copies the whole table under the lock once and
// reads its private copy for the rest of the pass. A render never observes a
// half-updated table.

use std::sync::Mutex;

/// Number of palette entries (8-bit indexed color)
pub const PALETTE_SIZE: usize = 256;

/// Convert an RGB888 triplet to the display-native swap565 encoding
///
/// # Arguments
/// * `r`, `g`, `b` - 8-bit color components
///
/// # Returns
/// Packed 16-bit swap565 value. Pure red (255, 0, 0) packs to `0x00F8`,
/// white (255, 255, 255) to `0xFFFF`.
#[inline]
pub fn rgb888_to_native(r: u8, g: u8, b: u8) -> u16 {
    let lo = ((r >> 3) << 3) | (g >> 5);
    let hi = ((g >> 2) << 5) | (b >> 3);
    ((hi as u16) << 8) | lo as u16
}

/// Convert a swap565 pixel back to an RGB888 triplet
///
/// Lossy inverse of [`rgb888_to_native`] (low bits are zero-filled); used by
/// the frame-dump and demo presentation paths.
#[inline]
pub fn native_to_rgb888(pixel: u16) -> [u8; 3] {
    let lo = (pixel & 0xFF) as u8;
    let hi = (pixel >> 8) as u8;
    let r = lo & 0xF8;
    let g = ((lo & 0x07) << 5) | ((hi & 0xE0) >> 3);
    let b = (hi & 0x1F) << 3;
    [r, g, b]
}

/// A private palette copy, valid for the duration of one render pass
pub type PaletteSnapshot = [u16; PALETTE_SIZE];

/// 256-entry palette table shared between the producer and the renderer
pub struct PaletteTable {
    entries: Mutex<PaletteSnapshot>,
}

impl PaletteTable {
    /// Create a palette table with the default inverted-grayscale ramp
    ///
    /// Index 0 is white and index 255 is black, matching the first-boot
    /// palette of the classic indexed modes this engine targets.
    pub fn new() -> Self {
        let mut entries = [0u16; PALETTE_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let gray = 255 - i as u8;
            *entry = rgb888_to_native(gray, gray, gray);
        }
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Replace palette entries with converted RGB triplets
    ///
    /// Converts each triplet to swap565 and stores it under the table lock.
    /// Safe to call while a render pass is running; the pass keeps using the
    /// snapshot it already took. At most 256 entries are consumed.
    ///
    /// The caller is responsible for forcing a full update afterwards:
    /// every pixel's visible color may have changed even though no source
    /// byte did (the engine wrapper does this).
    pub fn set_palette(&self, colors: &[[u8; 3]]) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (entry, rgb) in entries.iter_mut().zip(colors.iter()) {
            *entry = rgb888_to_native(rgb[0], rgb[1], rgb[2]);
        }
    }

    /// Copy the current table into a private snapshot
    ///
    /// The copy is taken atomically with respect to `set_palette`, so it is
    /// always self-consistent. Valid for the rest of the render pass.
    pub fn snapshot(&self) -> PaletteSnapshot {
        *self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a single entry (used by tests and the initial display clear)
    pub fn lookup(&self, index: u8) -> u16 {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())[index as usize]
    }
}

impl Default for PaletteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb888_to_native_known_values() {
        // Documented bit-exact encodings for the swap565 layout
        assert_eq!(rgb888_to_native(255, 0, 0), 0x00F8);
        assert_eq!(rgb888_to_native(0, 255, 0), 0xE007);
        assert_eq!(rgb888_to_native(0, 0, 255), 0x1F00);
        assert_eq!(rgb888_to_native(255, 255, 255), 0xFFFF);
        assert_eq!(rgb888_to_native(0, 0, 0), 0x0000);
    }

    #[test]
    fn test_native_round_trip_high_bits() {
        // Only the low bits are lost; the kept bits must survive a round trip
        for &(r, g, b) in &[(255u8, 0u8, 0u8), (0, 255, 0), (0, 0, 255), (128, 64, 200)] {
            let [r2, g2, b2] = native_to_rgb888(rgb888_to_native(r, g, b));
            assert_eq!(r2, r & 0xF8);
            assert_eq!(g2, g & 0xFC);
            assert_eq!(b2, b & 0xF8);
        }
    }

    #[test]
    fn test_default_palette_is_inverted_grayscale() {
        let palette = PaletteTable::new();
        assert_eq!(palette.lookup(0), rgb888_to_native(255, 255, 255));
        assert_eq!(palette.lookup(255), rgb888_to_native(0, 0, 0));
        assert_eq!(palette.lookup(128), rgb888_to_native(127, 127, 127));
    }

    #[test]
    fn test_set_palette_partial_and_snapshot() {
        let palette = PaletteTable::new();
        palette.set_palette(&[[255, 0, 0], [0, 255, 0]]);

        let snapshot = palette.snapshot();
        assert_eq!(snapshot[0], 0x00F8);
        assert_eq!(snapshot[1], 0xE007);
        // Entries beyond the provided slice keep their previous values
        assert_eq!(snapshot[2], rgb888_to_native(253, 253, 253));
    }
}
