use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::demos::{Demo, DemoFrame, DemoInputs, DemoKind, DemoSetup};
use crate::image_data::MediaDir;
use crate::input::{InputState, KeyCode, MouseButton};
use crate::render::GpuContext;
use crate::ui::UiOverlay;

/// Prints one `slug<TAB>name` line per demo.
pub fn write_demo_list(out: &mut impl Write) -> io::Result<()> {
    for kind in DemoKind::ALL {
        writeln!(out, "{}\t{}", kind.slug(), kind.name())?;
    }
    Ok(())
}

/// Builds every demo's meshes on the CPU and prints their sizes.
pub fn write_summary(out: &mut impl Write, media: &MediaDir) -> io::Result<()> {
    writeln!(out, "Media directory: {}", media.root().display())?;
    for kind in DemoKind::ALL {
        let stats = kind.geometry_stats(media);
        writeln!(out, "{} ({}): {} vertices", kind.name(), kind.slug(), stats.vertex_count())?;
        for (name, slice) in &stats.meshes {
            writeln!(out, " - {name}: {} vertices at {}", slice.count, slice.start)?;
        }
    }
    Ok(())
}

/// Opens the window and runs the selected demo until it is closed.
pub fn run(config: AppConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp::new(config);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Smoothed frame timing for the demo selector.
#[derive(Debug, Clone, Copy)]
struct FrameClock {
    start: Instant,
    last: Instant,
    average: f32,
}

impl FrameClock {
    fn new(now: Instant) -> Self {
        Self {
            start: now,
            last: now,
            average: 0.0,
        }
    }

    /// Returns (seconds since start, seconds since the previous tick).
    fn tick(&mut self, now: Instant) -> (f32, f32) {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        self.average = if self.average == 0.0 {
            delta
        } else {
            self.average * 0.95 + delta * 0.05
        };
        (now.saturating_duration_since(self.start).as_secs_f32(), delta)
    }
}

struct DemoApp {
    config: AppConfig,
    media: MediaDir,
    input: InputState,
    running: Option<Running>,
    error: Option<anyhow::Error>,
}

/// Everything that needs the window.
struct Running {
    gpu: GpuContext,
    ui: UiOverlay,
    demos: HashMap<DemoKind, Box<dyn Demo>>,
    active: DemoKind,
    clock: FrameClock,
}

impl DemoApp {
    fn new(config: AppConfig) -> Self {
        Self {
            media: MediaDir::new(config.media_dir.clone()),
            config,
            input: InputState::new(),
            running: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        event_loop.exit();
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let (width, height) = self.config.window_size;
        let attributes = Window::default_attributes()
            .with_title("Render demos")
            .with_inner_size(LogicalSize::new(width as f64, height as f64));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let gpu = block_on(GpuContext::new(window, self.config.vsync))
            .context("failed to initialise the GPU")?;
        let mut ui = UiOverlay::new(&gpu);

        let active = self.config.demo;
        let demo = active
            .create(&mut DemoSetup {
                gpu: &gpu,
                ui: &mut ui,
                media: &self.media,
            })
            .with_context(|| format!("failed to create the {active} demo"))?;
        info!("Started demo '{active}'");

        Ok(Running {
            gpu,
            ui,
            demos: HashMap::from([(active, demo)]),
            active,
            clock: FrameClock::new(Instant::now()),
        })
    }

    fn handle_key(&self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = KeyCode::from_winit(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }

    fn handle_mouse_button(&self, state: ElementState, button: winit::event::MouseButton) {
        let button = MouseButton::from_winit(button);
        match state {
            ElementState::Pressed => self.input.set_mouse_button_down(button),
            ElementState::Released => self.input.set_mouse_button_up(button),
        }
    }
}

impl Running {
    /// Builds `kind` the first time it is selected. The previous demo stays
    /// active when construction fails.
    fn activate(&mut self, kind: DemoKind, media: &MediaDir) {
        if !self.demos.contains_key(&kind) {
            let mut setup = DemoSetup {
                gpu: &self.gpu,
                ui: &mut self.ui,
                media,
            };
            match kind.create(&mut setup) {
                Ok(demo) => {
                    self.demos.insert(kind, demo);
                }
                Err(err) => {
                    error!("Failed to create the {kind} demo: {err:#}");
                    return;
                }
            }
        }
        if self.active != kind {
            info!("Switched to demo '{kind}'");
        }
        self.active = kind;
    }

    fn demo_selector(&self, average_frame_time: f32) -> DemoKind {
        let mut selected = self.active;
        egui::Window::new("Demos").show(self.ui.context(), |ui| {
            egui::ComboBox::from_label("demo")
                .selected_text(selected.name())
                .show_ui(ui, |ui| {
                    for kind in DemoKind::ALL {
                        ui.selectable_value(&mut selected, kind, kind.name());
                    }
                });
            let fps = if average_frame_time > 0.0 {
                1.0 / average_frame_time
            } else {
                0.0
            };
            ui.label(format!(
                "{:.2} ms/frame ({fps:.0} FPS)",
                average_frame_time * 1000.0
            ));
        });
        selected
    }

    fn redraw(&mut self, input: &InputState, media: &MediaDir) -> Result<()> {
        let (time, delta_time) = self.clock.tick(Instant::now());

        let frame = match self.gpu.acquire() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timeout; skipping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(anyhow!("GPU is out of memory")),
            Err(wgpu::SurfaceError::Other) => {
                warn!("Surface unavailable; skipping frame");
                return Ok(());
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.ui.begin(self.gpu.window());
        let selected = self.demo_selector(self.clock.average);
        if selected != self.active {
            self.activate(selected, media);
        }

        let size = self.gpu.size();
        let inputs = DemoInputs {
            window_size: (size.width, size.height),
            camera: input.camera_inputs(delta_time),
            time,
            delta_time,
        };
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        if let Some(demo) = self.demos.get_mut(&self.active) {
            let mut demo_frame = DemoFrame {
                gpu: &self.gpu,
                encoder: &mut encoder,
                target: &view,
                ui: self.ui.context(),
                inputs,
            };
            demo.update_and_render(&mut demo_frame);
        }

        let uploads = self.ui.end_and_paint(&self.gpu, &mut encoder, &view);
        self.gpu.queue.submit(uploads.into_iter().chain(Some(encoder.finish())));
        self.gpu.window().pre_present_notify();
        frame.present();
        Ok(())
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        if window_id != running.gpu.window_id() {
            return;
        }
        let consumed = running.ui.on_window_event(running.gpu.window(), &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => running.gpu.resize(size),
            WindowEvent::Focused(false) => self.input.clear(),
            WindowEvent::KeyboardInput { event: key, .. } => {
                let escape =
                    key.physical_key == PhysicalKey::Code(winit::keyboard::KeyCode::Escape);
                if escape && key.state == ElementState::Pressed && !consumed {
                    event_loop.exit();
                } else if !consumed || key.state == ElementState::Released {
                    self.handle_key(&key);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if !consumed || state == ElementState::Released {
                    self.handle_mouse_button(state, button);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = running.redraw(&self.input, &self.media) {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            let over_ui = self
                .running
                .as_ref()
                .is_some_and(|running| running.ui.wants_pointer());
            if !over_ui {
                self.input.add_mouse_motion(Vec2::new(delta.0 as f32, delta.1 as f32));
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.gpu.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.take() {
            info!("Closing with {} demo(s) built", running.demos.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn demo_list_has_one_line_per_demo() {
        let mut out = Vec::new();
        write_demo_list(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), DemoKind::ALL.len());
        assert!(text.contains("normal-map\tNormal map"));
    }

    #[test]
    fn summary_lists_every_demo_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        write_summary(&mut out, &MediaDir::new(dir.path())).unwrap();
        let text = String::from_utf8(out).unwrap();
        for kind in DemoKind::ALL {
            assert!(text.contains(kind.name()), "{kind} missing from:\n{text}");
        }
        assert!(text.contains(" - skybox: 36 vertices at 0"));
    }

    #[test]
    fn frame_clock_reports_elapsed_and_delta() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start);
        let (time, delta) = clock.tick(start + Duration::from_millis(20));
        assert!((time - 0.02).abs() < 1e-6);
        assert!((delta - 0.02).abs() < 1e-6);
        assert!((clock.average - 0.02).abs() < 1e-6);

        let (time, delta) = clock.tick(start + Duration::from_millis(30));
        assert!((time - 0.03).abs() < 1e-6);
        assert!((delta - 0.01).abs() < 1e-6);
        assert!(clock.average < 0.02 && clock.average > 0.01);
    }

    #[test]
    fn panic_messages_are_extracted() {
        assert_eq!(panic_message(Box::new("no display")), "no display");
        assert_eq!(panic_message(Box::new(String::from("boom"))), "boom");
        assert_eq!(panic_message(Box::new(7)), "unknown panic");
    }
}
