// Common test utilities for engine integration tests
//
// Provides a display sink that records every transfer it receives, so
// tests can assert exactly which destination rectangles a render pass
// touched and with which pixel data.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tilestream::DisplaySink;

/// Maximum time to wait for the scheduler thread in threaded tests
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// One recorded transfer: the declared window plus the streamed pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
}

impl Transfer {
    /// Whether this transfer covers the whole destination
    pub fn is_full_frame(&self) -> bool {
        self.x == 0
            && self.y == 0
            && self.width == tilestream::config::DISPLAY_WIDTH
            && self.height == tilestream::config::DISPLAY_HEIGHT
    }
}

/// Shared log of recorded transfers
pub type TransferLog = Arc<Mutex<Vec<Transfer>>>;

/// A display sink that records windows and pixel blocks
pub struct RecordingSink {
    log: TransferLog,
    window: Option<(usize, usize, usize, usize)>,
}

impl RecordingSink {
    pub fn new() -> (Self, TransferLog) {
        let log: TransferLog = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
                window: None,
            },
            log,
        )
    }
}

impl DisplaySink for RecordingSink {
    fn begin(&mut self) {}

    fn set_window(&mut self, x: usize, y: usize, width: usize, height: usize) {
        self.window = Some((x, y, width, height));
    }

    fn write_pixels(&mut self, pixels: &[u16]) {
        let Some((x, y, width, height)) = self.window.take() else {
            panic!("write_pixels without a declared window");
        };
        assert_eq!(
            pixels.len(),
            width * height,
            "pixel block length must match the window area"
        );
        self.log.lock().unwrap().push(Transfer {
            x,
            y,
            width,
            height,
            pixels: pixels.to_vec(),
        });
    }

    fn end(&mut self) {}
}

/// Block until the log contains at least `count` transfers or the wait
/// times out
///
/// # Panics
/// Panics on timeout, with the number of transfers seen so far.
pub fn wait_for_transfers(log: &TransferLog, count: usize) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        let seen = log.lock().unwrap().len();
        if seen >= count {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {} transfers (saw {})",
            count,
            seen
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}
