// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod driver;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use strata_core::init_tracing;
use strata_render::RenderContext;
use strata_render_vk::AshBackend;
use tracing::{error, info};

use strata_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::{AppCfg, DEFAULT_CONFIG_PATH};
use driver::{FrameDriver, TickOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Borderless fullscreen on the current monitor
    #[arg(long)]
    fullscreen: bool,
    /// Enable VK_LAYER_KHRONOS_validation (fails if not installed)
    #[arg(long)]
    validation: bool,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
}

struct App {
    cfg: AppCfg,
    window: Option<Window>,
    driver: Option<FrameDriver<AshBackend>>,
    paused: bool,
    exiting: bool,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = strata_platform::window_attributes(
            &self.cfg.window.title,
            self.cfg.window.width,
            self.cfg.window.height,
            self.cfg.render.fullscreen,
        );
        let window = event_loop.create_window(attrs).context("create_window")?;
        let target = strata_platform::surface_target(&window)?;

        let ctx = RenderContext::init(AshBackend::new(), &target, self.cfg.render.clone())
            .context("render init")?;
        let device = ctx.selected_device();
        info!(
            "rendering on {:?} ({}), {}x{}",
            device.candidate.name,
            device.candidate.device_type_name(),
            ctx.width(),
            ctx.height()
        );

        self.paused = target.size.is_empty();
        self.driver = Some(FrameDriver::new(ctx, &self.cfg.render));
        self.window = Some(window);
        Ok(())
    }

    /// Drops the driver (which shuts the render context down) before the window.
    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.driver = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                error!("startup failed: {e:#}");
                self.stop(event_loop);
                return;
            }
        }
        info!("resumed, paused={}", self.paused);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.stop(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = strata_platform::render_size(new_size);
                self.paused = size.is_empty();
                info!("Resized {}x{} (paused={})", size.width, size.height, self.paused);
                if let Some(driver) = &mut self.driver {
                    driver.resize(size);
                }
                if !self.paused {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::Occluded(occluded) => {
                let minimized = self
                    .window
                    .as_ref()
                    .is_some_and(|w| strata_platform::render_size(w.inner_size()).is_empty());
                self.paused = occluded || minimized;
                info!("Occluded={} (paused={})", occluded, self.paused);
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                let Some(driver) = &mut self.driver else {
                    return;
                };
                match driver.tick(Instant::now()) {
                    Ok(TickOutcome::Presented | TickOutcome::Skipped) => {}
                    Ok(TickOutcome::Paused) => self.paused = true,
                    Err(e) => {
                        error!("frame failed: {e:#}");
                        self.stop(event_loop);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        // Present mode pacing (FIFO/MAILBOX) and the fence wait throttle us.
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    init_tracing("info");
    let args = Args::parse();

    let mut cfg = AppCfg::load(&args.config)?;
    cfg.apply_args(&args);
    info!(
        "config: {}x{}, buffering depth {}, validation={}",
        cfg.window.width, cfg.window.height, cfg.render.buffering_depth, cfg.render.validation
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        window: None,
        driver: None,
        paused: false,
        exiting: false,
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
