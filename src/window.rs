// Window module - demo presentation of the destination buffer
//
// Opens a 1280×720 window with winit and blits the shared destination
// memory of a `MemorySink` into a pixels surface, converting swap565 to
// RGBA on each redraw. This stands in for the display hardware the sink
// would normally drive.
//
// Keys: S saves a PNG frame dump, Escape / close button exits.

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::palette::native_to_rgb888;
use crate::snapshot::save_frame_dump_auto;
use pixels::{Pixels, SurfaceTexture};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Window configuration
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Presentation frame rate in Hz
    pub target_fps: u32,
    /// Whether to enable VSync-style waiting in the event loop
    pub vsync: bool,
}

impl WindowConfig {
    /// Create a new window configuration with default values (60 FPS, VSync)
    pub fn new() -> Self {
        Self {
            target_fps: 60,
            vsync: true,
        }
    }

    /// Set the presentation frame rate
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps.max(1);
        self
    }

    /// Set VSync enabled or disabled
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Get the frame duration for the target FPS
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.target_fps as u64)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Presentation window for the rendered destination buffer
pub struct DisplayWindow {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    config: WindowConfig,
    dest: Arc<Mutex<Vec<u16>>>,
    last_frame_time: Instant,
}

impl DisplayWindow {
    /// Create a new display window (created for real when the loop starts)
    ///
    /// # Arguments
    /// * `config` - Window configuration
    /// * `dest` - Shared destination memory of the engine's `MemorySink`
    pub fn new(config: WindowConfig, dest: Arc<Mutex<Vec<u16>>>) -> Self {
        Self {
            window: None,
            pixels: None,
            config,
            dest,
            last_frame_time: Instant::now(),
        }
    }

    /// Blit the shared destination buffer to the surface
    fn render(&mut self) -> Result<(), pixels::Error> {
        if let Some(pixels) = &mut self.pixels {
            let frame = pixels.frame_mut();
            {
                let dest = self.dest.lock().unwrap_or_else(|e| e.into_inner());
                for (rgba, &pixel) in frame.chunks_exact_mut(4).zip(dest.iter()) {
                    let [r, g, b] = native_to_rgb888(pixel);
                    rgba[0] = r;
                    rgba[1] = g;
                    rgba[2] = b;
                    rgba[3] = 0xFF;
                }
            }
            pixels.render()?;
        }
        Ok(())
    }

    /// Check if enough time has passed for the next frame
    fn should_render_frame(&mut self) -> bool {
        let elapsed = self.last_frame_time.elapsed();
        if elapsed >= self.config.frame_duration() {
            self.last_frame_time = Instant::now();
            true
        } else {
            false
        }
    }

    /// Save the current destination buffer as a PNG frame dump
    fn dump_frame(&self) {
        let copy = self
            .dest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match save_frame_dump_auto(&copy) {
            Ok(path) => println!("Frame dump saved to {}", path.display()),
            Err(e) => eprintln!("Frame dump failed: {}", e),
        }
    }
}

impl ApplicationHandler for DisplayWindow {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(format!("tilestream - {}x{}", DISPLAY_WIDTH, DISPLAY_HEIGHT))
            .with_inner_size(LogicalSize::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32))
            .with_resizable(false);

        let window = event_loop
            .create_window(window_attributes)
            .expect("Failed to create window");

        let window = Arc::new(window);
        let window_size = window.inner_size();

        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window.clone());

        let pixels = Pixels::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32, surface_texture)
            .expect("Failed to create pixel buffer");

        self.window = Some(window);
        self.pixels = Some(pixels);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                println!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match physical_key {
                PhysicalKey::Code(KeyCode::KeyS) => self.dump_frame(),
                PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                if self.should_render_frame() {
                    if let Err(err) = self.render() {
                        eprintln!("Render error: {}", err);
                        event_loop.exit();
                    }
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Create and run the display window until it is closed
///
/// # Arguments
/// * `config` - Window configuration
/// * `dest` - Shared destination memory of the engine's `MemorySink`
pub fn run_display(
    config: WindowConfig,
    dest: Arc<Mutex<Vec<u16>>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;

    if config.vsync {
        event_loop.set_control_flow(ControlFlow::Wait);
    } else {
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    let mut display = DisplayWindow::new(config, dest);

    println!("Starting display window...");
    println!("  Resolution: {}x{}", DISPLAY_WIDTH, DISPLAY_HEIGHT);
    println!("  Target FPS: {}", config.target_fps);
    println!("  VSync: {}", config.vsync);

    event_loop.run_app(&mut display)?;

    Ok(())
}
