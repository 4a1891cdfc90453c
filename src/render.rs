// Tile render - indexed pixels to scaled display-native pixel blocks
//
// The conversion kernels here turn 8-bit palette indices into swap565
// pixels while applying the fixed 2× upscale: every converted pixel is
// duplicated horizontally and every converted row vertically. Both kernels
// process four source pixels per step, which keeps the palette lookups and
// destination stores batched for memory bandwidth.
//
// Kernels only ever read from snapshots (a tile copy or a row copy), never
// from the live framebuffer, so a render is always internally consistent.

use crate::config::{
    DISPLAY_WIDTH, PIXEL_SCALE, SCALED_TILE_WIDTH, SCREEN_HEIGHT, SCREEN_WIDTH, TILE_HEIGHT,
    TILE_WIDTH,
};
use crate::framebuffer::FrameBuffer;
use crate::palette::PaletteSnapshot;

/// Bytes in one tile snapshot
pub const TILE_SNAPSHOT_LEN: usize = TILE_WIDTH * TILE_HEIGHT;

/// Pixels in one scaled tile block (80×80)
pub const SCALED_TILE_LEN: usize = TILE_WIDTH * PIXEL_SCALE * TILE_HEIGHT * PIXEL_SCALE;

/// Convert one source row into two scaled destination rows
///
/// `dst0` and `dst1` are the upper and lower copies of the scaled row; each
/// must hold `src.len() * PIXEL_SCALE` pixels.
fn scale_row(src: &[u8], palette: &PaletteSnapshot, dst0: &mut [u16], dst1: &mut [u16]) {
    let mut out = 0;
    let mut chunks = src.chunks_exact(4);

    // Four source pixels per step: one palette lookup each, sixteen stores
    for chunk in &mut chunks {
        let c0 = palette[chunk[0] as usize];
        let c1 = palette[chunk[1] as usize];
        let c2 = palette[chunk[2] as usize];
        let c3 = palette[chunk[3] as usize];

        dst0[out] = c0;
        dst0[out + 1] = c0;
        dst0[out + 2] = c1;
        dst0[out + 3] = c1;
        dst0[out + 4] = c2;
        dst0[out + 5] = c2;
        dst0[out + 6] = c3;
        dst0[out + 7] = c3;

        dst1[out..out + 8].copy_from_slice(&dst0[out..out + 8]);
        out += 8;
    }

    // Tail pixels (widths here are divisible by 4, so this rarely runs)
    for &index in chunks.remainder() {
        let c = palette[index as usize];
        dst0[out] = c;
        dst0[out + 1] = c;
        dst1[out] = c;
        dst1[out + 1] = c;
        out += 2;
    }
}

/// Render one tile snapshot into a contiguous scaled pixel block
///
/// # Arguments
/// * `snapshot` - contiguous tile bytes ([`TILE_SNAPSHOT_LEN`])
/// * `palette` - private palette copy for this render pass
/// * `out` - output block ([`SCALED_TILE_LEN`] pixels, row-major 80×80)
pub fn render_tile(snapshot: &[u8], palette: &PaletteSnapshot, out: &mut [u16]) {
    debug_assert!(snapshot.len() >= TILE_SNAPSHOT_LEN);
    debug_assert!(out.len() >= SCALED_TILE_LEN);

    for row in 0..TILE_HEIGHT {
        let src = &snapshot[row * TILE_WIDTH..row * TILE_WIDTH + TILE_WIDTH];
        let base = row * PIXEL_SCALE * SCALED_TILE_WIDTH;
        let (dst0, dst1) = out[base..base + 2 * SCALED_TILE_WIDTH].split_at_mut(SCALED_TILE_WIDTH);
        scale_row(src, palette, dst0, dst1);
    }
}

/// Render the whole source buffer into the destination buffer
///
/// Processes the frame row by row through a row snapshot, writing each
/// converted row twice into the `DISPLAY_WIDTH`-stride destination.
///
/// # Arguments
/// * `frame` - the live source framebuffer
/// * `palette` - private palette copy for this render pass
/// * `dest` - destination buffer (`DISPLAY_WIDTH * DISPLAY_HEIGHT` pixels)
pub fn render_full(frame: &FrameBuffer, palette: &PaletteSnapshot, dest: &mut [u16]) {
    let mut row = [0u8; SCREEN_WIDTH];

    for y in 0..SCREEN_HEIGHT {
        frame.snapshot_row(y, &mut row);

        let base = y * PIXEL_SCALE * DISPLAY_WIDTH;
        let (dst0, dst1) = dest[base..base + 2 * DISPLAY_WIDTH].split_at_mut(DISPLAY_WIDTH);
        scale_row(&row, palette, dst0, dst1);
    }
}
