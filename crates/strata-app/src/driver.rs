// SPDX-License-Identifier: CEPL-1.0
//! Per-tick frame driving: fixed updates, then one start/record/end cycle.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use strata_core::FixedTimestep;
use strata_render::{FrameStatus, GpuBackend, RenderConfig, RenderContext, RenderSize};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Presented,
    /// The swapchain went stale; it is rebuilt at the start of the next tick.
    Skipped,
    /// Zero-area window: nothing is acquired or drawn.
    Paused,
}

pub struct FrameDriver<B: GpuBackend> {
    ctx: RenderContext<B>,
    clock: FixedTimestep,
    clear_color: [f32; 4],
    window_size: RenderSize,
    needs_rebuild: bool,
    last_tick: Option<Instant>,
    simulated: Duration,

    frames: u32,
    last_report: Option<Instant>,
}

impl<B: GpuBackend> FrameDriver<B> {
    pub fn new(ctx: RenderContext<B>, config: &RenderConfig) -> Self {
        let window_size = RenderSize::new(ctx.width(), ctx.height());
        FrameDriver {
            ctx,
            clock: FixedTimestep::new(config.fixed_timestep_hz, config.max_catch_up_steps),
            clear_color: config.clear_color,
            window_size,
            needs_rebuild: false,
            last_tick: None,
            simulated: Duration::ZERO,
            frames: 0,
            last_report: None,
        }
    }

    pub fn context(&self) -> &RenderContext<B> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<B> {
        &mut self.ctx
    }

    /// Simulation time advanced by fixed updates so far.
    pub fn simulated(&self) -> Duration {
        self.simulated
    }

    pub fn resize(&mut self, size: RenderSize) {
        if self.window_size.is_empty() && !size.is_empty() {
            // Time spent minimized is not simulated.
            self.clock.reset();
            self.last_tick = None;
        }
        if size != self.window_size {
            self.window_size = size;
            self.needs_rebuild = true;
        }
    }

    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        let elapsed = self
            .last_tick
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        self.last_tick = Some(now);

        let steps = self.clock.advance(elapsed);
        for _ in 0..steps {
            self.update(self.clock.step());
        }

        if self.window_size.is_empty() {
            return Ok(TickOutcome::Paused);
        }
        if self.needs_rebuild {
            self.ctx
                .recreate(self.window_size.width, self.window_size.height)
                .context("recreate swapchain")?;
            self.needs_rebuild = false;
        }

        match self.ctx.start_frame().context("start_frame")? {
            FrameStatus::Success => {}
            FrameStatus::NeedsUpdate => {
                self.needs_rebuild = true;
                return Ok(TickOutcome::Skipped);
            }
        }

        self.ctx.begin_main_pass(self.clear_color)?;
        self.ctx.end_main_pass()?;

        let outcome = match self.ctx.end_frame().context("end_frame")? {
            FrameStatus::Success => TickOutcome::Presented,
            FrameStatus::NeedsUpdate => {
                self.needs_rebuild = true;
                TickOutcome::Skipped
            }
        };
        if outcome == TickOutcome::Presented {
            self.frames += 1;
        }
        self.report(now);
        Ok(outcome)
    }

    // Scene simulation is external; the driver only keeps the fixed clock.
    fn update(&mut self, step: Duration) {
        self.simulated += step;
    }

    fn report(&mut self, now: Instant) {
        let Some(since) = self.last_report else {
            self.last_report = Some(now);
            return;
        };
        if now.saturating_duration_since(since) < Duration::from_secs(1) {
            return;
        }
        match self.ctx.last_gpu_frame_time() {
            Some(gpu) => info!(
                "fps ~ {}, gpu {:.2} ms",
                self.frames,
                gpu.as_secs_f64() * 1000.0
            ),
            None => info!("fps ~ {}", self.frames),
        }
        if self.clock.dropped() > Duration::ZERO {
            debug!(
                "frame clock dropped {:.1} ms total",
                self.clock.dropped().as_secs_f64() * 1000.0
            );
        }
        self.frames = 0;
        self.last_report = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;
    use strata_render::mock::{MockBackend, MockOp};
    use strata_render::FramePhase;

    use super::*;

    fn driver() -> FrameDriver<MockBackend> {
        let config = RenderConfig::default();
        let ctx = RenderContext::init(
            MockBackend::new(),
            &MockBackend::surface_target(800, 600),
            config.clone(),
        )
        .expect("init");
        FrameDriver::new(ctx, &config)
    }

    #[test]
    fn test_ticks_present_frames() {
        let mut d = driver();
        let t0 = Instant::now();
        for i in 0..5 {
            let now = t0 + Duration::from_millis(16 * i);
            assert_eq!(d.tick(now).unwrap(), TickOutcome::Presented);
        }
        assert_eq!(d.context().frames_presented(), 5);
    }

    #[test]
    fn test_fixed_updates_follow_elapsed_time() {
        let mut d = driver();
        let t0 = Instant::now();
        d.tick(t0).unwrap();
        d.tick(t0 + Duration::from_millis(50)).unwrap();
        assert_eq!(d.simulated(), d.clock.step() * 3);

        // A long stall is clamped to max_catch_up_steps.
        d.tick(t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(d.simulated(), d.clock.step() * 8);
    }

    #[test]
    fn test_resize_rebuilds_before_next_frame() {
        let mut d = driver();
        let now = Instant::now();
        d.tick(now).unwrap();
        d.resize(RenderSize::new(1024, 768));
        assert_eq!(d.tick(now).unwrap(), TickOutcome::Presented);
        assert_eq!((d.context().width(), d.context().height()), (1024, 768));
    }

    #[test]
    fn test_minimized_window_pauses() {
        let mut d = driver();
        let now = Instant::now();
        d.resize(RenderSize::new(0, 0));
        assert_eq!(d.tick(now).unwrap(), TickOutcome::Paused);
        d.resize(RenderSize::new(640, 480));
        assert_eq!(d.tick(now).unwrap(), TickOutcome::Presented);
        assert_eq!(d.context().width(), 640);
    }

    #[test]
    fn test_restore_from_minimized_skips_paused_time() {
        let mut d = driver();
        let t0 = Instant::now();
        d.tick(t0).unwrap();
        d.tick(t0 + Duration::from_millis(25)).unwrap();
        assert_eq!(d.simulated(), d.clock.step());
        assert!(d.clock.alpha() > 0.0);

        d.resize(RenderSize::new(0, 0));
        d.resize(RenderSize::new(800, 600));
        assert_eq!(d.clock.alpha(), 0.0);

        assert_eq!(
            d.tick(t0 + Duration::from_secs(10)).unwrap(),
            TickOutcome::Presented
        );
        assert_eq!(d.simulated(), d.clock.step());
    }

    #[test]
    fn test_stale_present_skips_then_recovers() {
        let mut d = driver();
        let now = Instant::now();
        let ledger = d.context().backend().ledger();
        d.context_mut().backend_mut().present_script.push_back(Ok(true));

        assert_eq!(d.tick(now).unwrap(), TickOutcome::Skipped);
        assert_eq!(d.context().phase(), FramePhase::NeedsRebuild);
        assert_eq!(d.tick(now).unwrap(), TickOutcome::Presented);
        assert_eq!(ledger.borrow().swapchain_descs().len(), 2);
        assert_eq!(ledger.borrow().live_of(MockOp::Swapchain), 1);
    }

    #[test]
    fn test_device_loss_stops_the_loop() {
        let mut d = driver();
        d.context_mut()
            .backend_mut()
            .submit_script
            .push_back(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(d.tick(Instant::now()).is_err());
        assert_eq!(d.context().phase(), FramePhase::Error);
    }
}
