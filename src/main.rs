//! Windowed frontend (feature `display`): winit window + pixels surface.
//!
//! Usage: `gamate <rom.bin> <bios.bin>`
//!
//! Key map: arrows = d-pad, A = A, S = B, Q = Start, W = Select,
//! Escape quits. With the `screenshot` feature, P saves `frame.png`.

#[cfg(feature = "display")]
mod frontend {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use pixels::{Pixels, SurfaceTexture};
    use winit::application::ApplicationHandler;
    use winit::dpi::LogicalSize;
    use winit::event::{ElementState, WindowEvent};
    use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
    use winit::keyboard::{KeyCode, PhysicalKey};
    use winit::window::{Window, WindowId};

    use gamate::controller::Button;
    use gamate::lcd::{HEIGHT, WIDTH};
    use gamate::machine::{FrameResult, Machine};

    const SCALE: u32 = 4;
    // The LCD refreshes a little above standard video rates.
    const FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / 68);

    struct App {
        machine: Machine,
        window: Option<Arc<Window>>,
        pixels: Option<Pixels<'static>>,
        last_frame: Instant,
    }

    impl App {
        fn new(machine: Machine) -> Self {
            Self {
                machine,
                window: None,
                pixels: None,
                last_frame: Instant::now(),
            }
        }

        fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, pressed: bool) {
            let controller = &mut self.machine.bus.controller;
            match code {
                KeyCode::ArrowUp => controller.set_button(Button::Up, pressed),
                KeyCode::ArrowDown => controller.set_button(Button::Down, pressed),
                KeyCode::ArrowLeft => controller.set_button(Button::Left, pressed),
                KeyCode::ArrowRight => controller.set_button(Button::Right, pressed),
                KeyCode::KeyA => controller.set_button(Button::A, pressed),
                KeyCode::KeyS => controller.set_button(Button::B, pressed),
                KeyCode::KeyQ => controller.set_button(Button::Start, pressed),
                KeyCode::KeyW => controller.set_button(Button::Select, pressed),
                KeyCode::Escape if pressed => {
                    self.machine.request_quit();
                    event_loop.exit();
                }
                #[cfg(feature = "screenshot")]
                KeyCode::KeyP if pressed => {
                    if let Err(e) = gamate::screenshot::save_png(
                        "frame.png",
                        self.machine.framebuffer(),
                        WIDTH as u32,
                        HEIGHT as u32,
                    ) {
                        eprintln!("{e}");
                    }
                }
                _ => {}
            }
        }
    }

    impl ApplicationHandler for App {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            let size = LogicalSize::new((WIDTH as u32 * SCALE) as f64, (HEIGHT as u32 * SCALE) as f64);
            let window = Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title("Gamate")
                            .with_inner_size(size),
                    )
                    .expect("Failed to create window"),
            );

            let inner = window.inner_size();
            let surface_texture = SurfaceTexture::new(inner.width, inner.height, window.clone());
            let pixels = Pixels::new(WIDTH as u32, HEIGHT as u32, surface_texture)
                .expect("Failed to create pixel surface");

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
                    self.machine.request_quit();
                    event_loop.exit();
                }
                WindowEvent::Resized(size) => {
                    if let Some(pixels) = self.pixels.as_mut() {
                        if pixels.resize_surface(size.width, size.height).is_err() {
                            event_loop.exit();
                        }
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.handle_key(event_loop, code, event.state == ElementState::Pressed);
                    }
                }
                WindowEvent::RedrawRequested => {
                    // Pace the emulation to the LCD refresh.
                    let elapsed = self.last_frame.elapsed();
                    if elapsed < FRAME_TIME {
                        std::thread::sleep(FRAME_TIME - elapsed);
                    }
                    self.last_frame = Instant::now();

                    match self.machine.run_frame() {
                        FrameResult::Quit => {
                            event_loop.exit();
                            return;
                        }
                        FrameResult::Presented(_) => {}
                    }

                    if let Some(pixels) = self.pixels.as_mut() {
                        for (dst, src) in pixels
                            .frame_mut()
                            .chunks_exact_mut(4)
                            .zip(self.machine.framebuffer())
                        {
                            dst.copy_from_slice(&src.to_le_bytes());
                        }
                        if pixels.render().is_err() {
                            event_loop.exit();
                        }
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

    pub fn run() {
        let mut args = std::env::args().skip(1);
        let (Some(rom_path), Some(bios_path)) = (args.next(), args.next()) else {
            eprintln!("Usage: gamate <rom.bin> <bios.bin>");
            std::process::exit(2);
        };

        let rom = std::fs::read(&rom_path)
            .unwrap_or_else(|e| panic!("Could not open ROM file {rom_path}: {e}"));
        let bios = std::fs::read(&bios_path)
            .unwrap_or_else(|e| panic!("Could not open BIOS file {bios_path}: {e}"));

        let mut machine = Machine::new();
        machine.load_rom(&rom).expect("ROM image rejected");
        machine.load_bios(&bios).expect("BIOS image rejected");
        machine.reset(false);

        let event_loop = EventLoop::new().expect("Failed to create event loop");
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(machine);
        event_loop.run_app(&mut app).expect("Event loop error");
    }
}

#[cfg(feature = "display")]
fn main() {
    frontend::run();
}

#[cfg(not(feature = "display"))]
fn main() {
    eprintln!("gamate was built without a frontend; rebuild with --features display");
}
