//! Frameflight demo - clears the window with an animated color
//!
//! Resize the window to exercise swapchain recreation; minimizing pauses
//! rendering until the window has a drawable size again.

use frameflight_engine::frameflight::device::{CommandTargetId, DeviceConfig, Extent2D, GraphicsDevice};
use frameflight_engine::frameflight::frame::{FrameInfo, FrameScheduler, FrameStatus, SchedulerConfig};
use frameflight_engine::frameflight::log::LogSeverity;
use frameflight_engine::frameflight::{Engine, Result};
use frameflight_engine::{engine_error, engine_info};
use frameflight_engine_renderer_vulkan::frameflight::VulkanGraphicsDevice;
use glam::Vec4;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const SOURCE: &str = "frameflight::demo";

/// Log a status line every N presented frames
const REPORT_INTERVAL: u64 = 600;

struct App {
    // Dropped before the window: the surface must not outlive it
    scheduler: Option<FrameScheduler<VulkanGraphicsDevice>>,
    window: Option<Window>,
    start: Instant,
    minimized: bool,
}

impl App {
    fn new() -> Self {
        Self {
            scheduler: None,
            window: None,
            start: Instant::now(),
            minimized: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("Frameflight Demo")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720));
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| frameflight_engine::frameflight::Error::InitializationFailed(e.to_string()))?;

        let config = DeviceConfig {
            app_name: "Frameflight Demo".to_string(),
            ..DeviceConfig::default()
        };
        let device = VulkanGraphicsDevice::new(&window, &config)?;
        let scheduler = FrameScheduler::new(
            device,
            Extent2D::from(window.inner_size()),
            SchedulerConfig::default(),
        )?;

        engine_info!(
            SOURCE,
            "Rendering at {} with {} swapchain images",
            Extent2D::from(window.inner_size()),
            scheduler.image_count()
        );

        self.scheduler = Some(scheduler);
        self.window = Some(window);
        Ok(())
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        // Skip while minimized, the scheduler would block waiting for a drawable size
        if self.minimized {
            return;
        }
        let Some(scheduler) = self.scheduler.as_mut() else {
            return;
        };

        let t = self.start.elapsed().as_secs_f32();
        let blend = t.sin() * 0.5 + 0.5;
        let color = Vec4::new(0.05, 0.1, 0.3, 1.0).lerp(Vec4::new(0.8, 0.35, 0.1, 1.0), blend);

        let mut recorder =
            |device: &mut VulkanGraphicsDevice, target: CommandTargetId, frame: &FrameInfo| -> Result<()> {
                device.begin_render_pass(target, frame.framebuffer, color.to_array())?;
                device.end_render_pass(target)
            };

        match scheduler.run_frame(&mut recorder) {
            Ok(FrameStatus::Presented(presented)) => {
                if presented.frame_number > 0 && presented.frame_number % REPORT_INTERVAL == 0 {
                    let stats = scheduler.stats();
                    engine_info!(
                        SOURCE,
                        "Frame {} ({} recreations, {} stale acquires)",
                        presented.frame_number, stats.recreations, stats.stale_acquires
                    );
                }
            }
            Ok(FrameStatus::AcquireTimedOut) => {}
            Err(e) => {
                engine_error!(SOURCE, "Frame failed: {}", e);
                // A failed rebuild leaves no chain; give it one explicit retry
                if scheduler.recreate_swapchain().is_err() {
                    self.shutdown(event_loop);
                }
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut scheduler) = self.scheduler.take() {
            if let Err(e) = scheduler.shutdown() {
                engine_error!(SOURCE, "Shutdown failed: {}", e);
            }
            let stats = scheduler.stats();
            engine_info!(
                SOURCE,
                "Presented {} frames, {} swapchain recreations",
                stats.frames_presented, stats.recreations
            );
            scheduler.device().print_validation_report();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            engine_error!(SOURCE, "Initialization failed: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                let extent = Extent2D::from(size);
                self.minimized = extent.is_degenerate();
                if let Some(scheduler) = self.scheduler.as_ref() {
                    scheduler.notify_resized(extent);
                }
            }
            WindowEvent::RedrawRequested => self.draw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() {
    Engine::set_min_severity(LogSeverity::Info);
    engine_info!(SOURCE, "Starting Frameflight demo");

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            engine_error!(SOURCE, "Failed to create event loop: {}", e);
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    if let Err(e) = event_loop.run_app(&mut app) {
        engine_error!(SOURCE, "Event loop error: {}", e);
    }
}
