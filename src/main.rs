// tilestream - Main Entry Point
//
// This is a demonstration of the display-update engine with a synthetic
// producer: one thread writes a moving pattern into the shared framebuffer
// and signals frames, while the engine's scheduler renders dirty tiles into
// a memory sink that a window presents on screen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tilestream::config::{SCREEN_HEIGHT, SCREEN_WIDTH};
use tilestream::{
    run_display, DisplayEngine, EngineConfig, MemorySink, ProducerHandle, WindowConfig,
};

/// Size of the moving square in source pixels
const BOX_SIZE: usize = 48;

/// Demo producer: bounce a colored square around the framebuffer
///
/// Every write goes through the producer handle, which both stores the byte
/// and marks the covering tile dirty, exactly as an emulation core would.
fn run_producer(handle: ProducerHandle, running: Arc<AtomicBool>) {
    let mut x: i32 = 8;
    let mut y: i32 = 8;
    let mut dx: i32 = 3;
    let mut dy: i32 = 2;
    let mut color: u8 = 1;

    while running.load(Ordering::Relaxed) {
        // Erase the old square, move, repaint
        draw_box(&handle, x as usize, y as usize, 0);

        x += dx;
        y += dy;
        if x <= 0 || x as usize + BOX_SIZE >= SCREEN_WIDTH {
            dx = -dx;
            x += dx;
            color = color.wrapping_add(1).max(1);
        }
        if y <= 0 || y as usize + BOX_SIZE >= SCREEN_HEIGHT {
            dy = -dy;
            y += dy;
            color = color.wrapping_add(1).max(1);
        }

        draw_box(&handle, x as usize, y as usize, color);
        handle.signal_frame_ready();

        thread::sleep(Duration::from_millis(33));
    }
}

/// Fill a BOX_SIZE square at (x, y) with one palette index
fn draw_box(handle: &ProducerHandle, x: usize, y: usize, index: u8) {
    let row = [index; BOX_SIZE];
    for dy in 0..BOX_SIZE {
        handle.write_slice((y + dy) * SCREEN_WIDTH + x, &row);
    }
}

/// Build a demo palette: index 0 is dark gray, the rest a color wheel
fn demo_palette() -> Vec<[u8; 3]> {
    let mut colors = vec![[40, 40, 48]];
    for i in 1..256u32 {
        let phase = i * 360 / 255;
        colors.push(match phase / 60 {
            0 => [255, (phase * 255 / 60) as u8, 0],
            1 => [(255 - (phase - 60) * 255 / 60) as u8, 255, 0],
            2 => [0, 255, ((phase - 120) * 255 / 60) as u8],
            3 => [0, (255 - (phase - 180) * 255 / 60) as u8, 255],
            4 => [((phase - 240) * 255 / 60) as u8, 0, 255],
            _ => [255, 0, (255 - (phase - 300) * 255 / 60) as u8],
        });
    }
    colors
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("tilestream v0.1.0");
    println!("=================");
    println!();

    // Load or create the engine configuration
    let config = EngineConfig::load_or_default();
    println!("Engine configuration: {:?}", config.tracking);
    println!();

    // The sink's shared destination memory backs the window presentation
    let sink = MemorySink::new().ok_or("Failed to allocate display memory")?;
    let dest = sink.pixels();

    let mut engine = DisplayEngine::init(config, Box::new(sink))?;
    engine.set_palette(&demo_palette());

    // Start the demo producer
    let producer_running = Arc::new(AtomicBool::new(true));
    let producer = {
        let handle = engine.handle();
        let running = Arc::clone(&producer_running);
        thread::Builder::new()
            .name("tilestream-producer".to_string())
            .spawn(move || run_producer(handle, running))?
    };

    println!("Press S to save a frame dump, Escape or close to exit.");
    println!();

    run_display(WindowConfig::new(), dest)?;

    // Window closed: stop the producer, then the engine
    producer_running.store(false, Ordering::Relaxed);
    let _ = producer.join();
    engine.shutdown();

    println!("Display window closed.");
    Ok(())
}
