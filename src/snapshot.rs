// Frame dump functionality
//
// Captures the rendered destination buffer and saves it as a PNG file.
// Useful for inspecting partial-update artifacts without a display attached.

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::palette::native_to_rgb888;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur during frame dump operations
#[derive(Debug)]
pub enum FrameDumpError {
    /// I/O error
    Io(io::Error),

    /// PNG encoding error
    PngEncoding(png::EncodingError),

    /// The pixel buffer does not match the display dimensions
    WrongSize { expected: usize, found: usize },
}

impl std::fmt::Display for FrameDumpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameDumpError::Io(e) => write!(f, "I/O error: {}", e),
            FrameDumpError::PngEncoding(e) => write!(f, "PNG encoding error: {}", e),
            FrameDumpError::WrongSize { expected, found } => {
                write!(f, "Wrong buffer size: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for FrameDumpError {}

impl From<io::Error> for FrameDumpError {
    fn from(e: io::Error) -> Self {
        FrameDumpError::Io(e)
    }
}

impl From<png::EncodingError> for FrameDumpError {
    fn from(e: png::EncodingError) -> Self {
        FrameDumpError::PngEncoding(e)
    }
}

/// Save the destination buffer to a timestamped PNG under `frame_dumps/`
///
/// # Arguments
///
/// * `pixels` - the swap565 destination buffer (1280×720)
///
/// # Returns
///
/// Result containing the path to the saved file or an error
pub fn save_frame_dump_auto(pixels: &[u16]) -> Result<PathBuf, FrameDumpError> {
    let dir = PathBuf::from("frame_dumps");
    fs::create_dir_all(&dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("frame_{}.png", timestamp));
    save_frame_dump(pixels, &path)?;
    Ok(path)
}

/// Save the destination buffer as a PNG file
///
/// Converts swap565 pixels to RGB888 and encodes them at the fixed display
/// resolution.
///
/// # Arguments
///
/// * `pixels` - the swap565 destination buffer (1280×720)
/// * `path` - where to write the PNG
pub fn save_frame_dump(pixels: &[u16], path: &Path) -> Result<(), FrameDumpError> {
    let expected = DISPLAY_WIDTH * DISPLAY_HEIGHT;
    if pixels.len() != expected {
        return Err(FrameDumpError::WrongSize {
            expected,
            found: pixels.len(),
        });
    }

    let rgb_data = native_to_rgb(pixels);
    save_png(path, &rgb_data, DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32)
}

/// Convert swap565 pixels to RGB888 bytes
fn native_to_rgb(pixels: &[u16]) -> Vec<u8> {
    let mut rgb_data = Vec::with_capacity(pixels.len() * 3);
    for &pixel in pixels {
        rgb_data.extend_from_slice(&native_to_rgb888(pixel));
    }
    rgb_data
}

/// Save RGB data as a PNG file
fn save_png(path: &Path, data: &[u8], width: u32, height: u32) -> Result<(), FrameDumpError> {
    let file = fs::File::create(path)?;
    let w = io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;

    Ok(())
}
