// SPDX-License-Identifier: CEPL-1.0
//! Device bring-up and the frame lifecycle.
//!
//! [`RenderContext`] owns every GPU object the core creates: instance,
//! surface, logical device and queues, the command pool, the frame slots,
//! the swapchain, the main render pass and its framebuffers.
//!
//! Construction order (each step needs the previous one):
//! 1. instance (+ debug messenger when validating)
//! 2. surface
//! 3. device selection
//! 4. logical device
//! 5. queues
//! 6. acquire / completion semaphores per slot
//! 7. timestamp query pools per slot
//! 8. command pool, command buffers, in-flight fences
//! 9. swapchain, render pass, framebuffers
//!
//! Teardown runs the same list backwards after all in-flight work is done.

use std::time::Duration;

use ash::vk;
use tracing::{debug, error, info, warn};

use crate::backend::{
    DeviceDesc, GpuBackend, InstanceDesc, PresentDesc, RenderPassBegin, SubmitDesc, SurfaceTarget,
    VALIDATION_LAYER,
};
use crate::candidate::{DeviceCandidate, DeviceFeatures};
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::frame::{
    classify_acquire, classify_present, gpu_frame_time, Acquired, FrameContext, FramePhase,
    FrameSlot, FrameStatus, TIMESTAMPS_PER_SLOT,
};
use crate::guard::{Created, InitGuard};
use crate::selector::{select_device, SelectedDevice};
use crate::swapchain::SwapchainState;
use crate::RenderSize;

pub const APP_NAME: &str = "Strata";

/// Fence waits never time out; a hung GPU surfaces as device loss.
const FENCE_TIMEOUT: Duration = Duration::MAX;

pub struct RenderContext<B: GpuBackend> {
    backend: B,
    config: RenderConfig,

    surface: vk::SurfaceKHR,
    device: SelectedDevice,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    debug_messenger: bool,

    command_pool: vk::CommandPool,
    slots: Vec<FrameSlot>,

    swapchain: Option<SwapchainState>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    phase: FramePhase,
    slot_index: usize,
    image_index: u32,
    requested: RenderSize,
    /// Fence of the slot being recorded: reset but not yet submitted.
    unsubmitted_fence: Option<vk::Fence>,
    timestamps_supported: bool,
    last_gpu_frame_time: Option<Duration>,
    frames_presented: u64,
}

struct InitParts {
    surface: vk::SurfaceKHR,
    device: SelectedDevice,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    debug_messenger: bool,
    command_pool: vk::CommandPool,
    slots: Vec<FrameSlot>,
    swapchain: SwapchainState,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
}

impl<B: GpuBackend> RenderContext<B> {
    /// Brings up everything from instance to framebuffers.
    ///
    /// On failure every object created so far is destroyed, in reverse
    /// order, before the error is returned.
    pub fn init(mut backend: B, target: &SurfaceTarget, config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;

        let parts = {
            let mut guard = InitGuard::new(&mut backend);
            let parts = build_parts(&mut guard, target, &config)?;
            guard.disarm();
            parts
        };

        let family = parts.device.candidate.family(parts.device.graphics_family);
        let timestamps_supported = family.is_some_and(|f| f.timestamp_valid_bits > 0)
            && parts.device.candidate.timestamp_period > 0.0;

        info!(
            "render context ready: {} slots, {}x{}, fullscreen={}, validation={}",
            parts.slots.len(),
            parts.swapchain.extent.width,
            parts.swapchain.extent.height,
            config.fullscreen,
            config.validation
        );

        Ok(Self {
            backend,
            requested: target.size,
            config,
            surface: parts.surface,
            device: parts.device,
            graphics_queue: parts.graphics_queue,
            present_queue: parts.present_queue,
            debug_messenger: parts.debug_messenger,
            command_pool: parts.command_pool,
            slots: parts.slots,
            swapchain: Some(parts.swapchain),
            render_pass: parts.render_pass,
            framebuffers: parts.framebuffers,
            phase: FramePhase::Idle,
            slot_index: 0,
            image_index: 0,
            unsubmitted_fence: None,
            timestamps_supported,
            last_gpu_frame_time: None,
            frames_presented: 0,
        })
    }

    // --- frame lifecycle ---

    /// Waits for the current slot's previous submission, acquires an image
    /// and opens the slot's command buffer for recording.
    ///
    /// `NeedsUpdate` means the frame is skipped: call [`Self::recreate`]
    /// and do not call `end_frame` this tick.
    pub fn start_frame(&mut self) -> RenderResult<FrameStatus> {
        match self.phase {
            FramePhase::Idle => {}
            FramePhase::NeedsRebuild => {
                // Still waiting on a usable surface; counts as a skipped frame.
                self.advance_slot();
                return Ok(FrameStatus::NeedsUpdate);
            }
            found => {
                return Err(RenderError::InvalidPhase {
                    expected: FramePhase::Idle,
                    found,
                })
            }
        }

        let result = self.acquire_and_begin();
        if result.is_err() {
            self.phase = FramePhase::Error;
        }
        result
    }

    fn acquire_and_begin(&mut self) -> RenderResult<FrameStatus> {
        self.phase = FramePhase::Acquiring;
        let slot = self.slots[self.slot_index];
        let swapchain = self.swapchain_handle()?;

        // Backpressure: blocks until the GPU is done with this slot.
        self.backend.wait_for_fences(&[slot.in_flight], FENCE_TIMEOUT)?;

        let index = match classify_acquire(self.backend.acquire_next_image(swapchain, slot.acquire)) {
            Ok(Acquired::Image(index)) => index,
            Ok(Acquired::Stale) => {
                debug!("acquire: swapchain out of date, skipping frame");
                self.phase = FramePhase::NeedsRebuild;
                self.advance_slot();
                return Ok(FrameStatus::NeedsUpdate);
            }
            Err(e) => {
                error!("acquire_next_image: {e:?}");
                return Err(e.into());
            }
        };
        if index as usize >= self.framebuffers.len() {
            return Err(RenderError::Surface(format!(
                "presentation engine returned image {index} of {}",
                self.framebuffers.len()
            )));
        }

        if slot.timestamps_pending {
            self.read_timestamps(self.slot_index)?;
        }

        // Only reset once an image is guaranteed; a skipped frame must leave
        // the fence signaled or the next wait on this slot never returns.
        self.backend.reset_fence(slot.in_flight)?;
        self.unsubmitted_fence = Some(slot.in_flight);

        let cmd = slot.command_buffer;
        self.backend.reset_command_buffer(cmd)?;
        self.backend.begin_command_buffer(cmd)?;
        if self.timestamps_supported {
            self.backend
                .cmd_reset_query_pool(cmd, slot.timestamps, TIMESTAMPS_PER_SLOT);
            self.backend.cmd_write_timestamp(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                slot.timestamps,
                0,
            );
        }

        self.image_index = index;
        self.phase = FramePhase::Recording;
        Ok(FrameStatus::Success)
    }

    /// Submits the recorded commands and presents the acquired image.
    pub fn end_frame(&mut self) -> RenderResult<FrameStatus> {
        if self.phase != FramePhase::Recording {
            return Err(RenderError::InvalidPhase {
                expected: FramePhase::Recording,
                found: self.phase,
            });
        }

        let result = self.submit_and_present();
        if result.is_err() {
            self.phase = FramePhase::Error;
        }
        result
    }

    fn submit_and_present(&mut self) -> RenderResult<FrameStatus> {
        let slot = self.slots[self.slot_index];
        let swapchain = self.swapchain_handle()?;
        let cmd = slot.command_buffer;

        if self.timestamps_supported {
            self.backend.cmd_write_timestamp(
                cmd,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                slot.timestamps,
                1,
            );
        }
        self.backend.end_command_buffer(cmd)?;

        let submit = SubmitDesc {
            command_buffer: cmd,
            wait_semaphore: slot.acquire,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.complete,
            fence: slot.in_flight,
        };
        if let Err(e) = self.backend.queue_submit(self.graphics_queue, &submit) {
            error!("queue_submit: {e:?}");
            return Err(e.into());
        }
        self.unsubmitted_fence = None;
        self.slots[self.slot_index].timestamps_pending = self.timestamps_supported;
        self.phase = FramePhase::Submitted;

        let present = PresentDesc {
            swapchain,
            image_index: self.image_index,
            wait_semaphore: slot.complete,
        };
        self.phase = FramePhase::Presenting;
        let status = match classify_present(self.backend.queue_present(self.present_queue, &present))
        {
            Ok(status) => status,
            Err(e) => {
                error!("queue_present: {e:?}");
                return Err(e.into());
            }
        };

        self.advance_slot();
        match status {
            FrameStatus::Success => {
                self.frames_presented += 1;
                self.phase = FramePhase::Idle;
            }
            FrameStatus::NeedsUpdate => {
                debug!("present: swapchain out of date or suboptimal");
                self.phase = FramePhase::NeedsRebuild;
            }
        }
        Ok(status)
    }

    /// Begins the main render pass on the current frame's framebuffer.
    pub fn begin_main_pass(&mut self, clear_color: [f32; 4]) -> RenderResult<()> {
        let frame = self.frame().ok_or(RenderError::InvalidPhase {
            expected: FramePhase::Recording,
            found: self.phase,
        })?;
        let begin = RenderPassBegin {
            render_pass: frame.render_pass,
            framebuffer: frame.framebuffer,
            extent: frame.extent,
            clear_color,
        };
        self.backend.cmd_begin_render_pass(frame.command_buffer, &begin);
        Ok(())
    }

    pub fn end_main_pass(&mut self) -> RenderResult<()> {
        let frame = self.frame().ok_or(RenderError::InvalidPhase {
            expected: FramePhase::Recording,
            found: self.phase,
        })?;
        self.backend.cmd_end_render_pass(frame.command_buffer);
        Ok(())
    }

    fn advance_slot(&mut self) {
        self.slot_index = (self.slot_index + 1) % self.slots.len();
    }

    fn read_timestamps(&mut self, index: usize) -> RenderResult<()> {
        let pool = self.slots[index].timestamps;
        if let Some(ticks) = self.backend.timestamp_results(pool, TIMESTAMPS_PER_SLOT)? {
            self.last_gpu_frame_time =
                gpu_frame_time(&ticks, self.device.candidate.timestamp_period);
        }
        self.slots[index].timestamps_pending = false;
        Ok(())
    }

    // --- swapchain rebuild ---

    /// Rebuilds the swapchain for a new surface size.
    ///
    /// A zero-sized request (minimized window) is deferred: the context stays
    /// in `NeedsRebuild` and frames keep reporting `NeedsUpdate`.
    pub fn recreate(&mut self, width: u32, height: u32) -> RenderResult<()> {
        match self.phase {
            FramePhase::Idle | FramePhase::NeedsRebuild => {}
            found => {
                return Err(RenderError::InvalidPhase {
                    expected: FramePhase::NeedsRebuild,
                    found,
                })
            }
        }

        self.requested = RenderSize::new(width, height);
        if self.requested.is_empty() {
            debug!("recreate deferred: surface is {width}x{height}");
            self.phase = FramePhase::NeedsRebuild;
            return Ok(());
        }

        match self.rebuild_swapchain() {
            Ok(true) => self.phase = FramePhase::Idle,
            Ok(false) => self.phase = FramePhase::NeedsRebuild,
            Err(e) => {
                self.phase = FramePhase::Error;
                return Err(e);
            }
        }
        Ok(())
    }

    /// `Ok(false)` when the surface itself reports zero area; the current
    /// swapchain is left untouched and the rebuild is retried later.
    fn rebuild_swapchain(&mut self) -> RenderResult<bool> {
        // Nothing in flight may still reference the old images.
        self.backend.device_wait_idle()?;

        let Some(mut desc) = SwapchainState::describe(
            &mut self.backend,
            &self.device,
            self.surface,
            self.requested,
            self.config.buffering_depth,
        )?
        else {
            debug!("recreate deferred: surface reports a zero-area extent");
            return Ok(false);
        };

        for fb in self.framebuffers.drain(..) {
            self.backend.destroy_framebuffer(fb);
        }
        let old_format = self.swapchain.as_ref().map(|sc| sc.format);
        let old = match self.swapchain.take() {
            Some(sc) => sc.destroy_views(&mut self.backend),
            None => vk::SwapchainKHR::null(),
        };

        desc.old_swapchain = old;
        let built = SwapchainState::create(&mut self.backend, &desc);
        if old != vk::SwapchainKHR::null() {
            self.backend.destroy_swapchain(old);
        }
        self.swapchain = Some(built?);

        let (format, extent, views) = match &self.swapchain {
            Some(sc) => (sc.format, sc.extent, sc.views.clone()),
            None => return Err(RenderError::NotInitialized("swapchain")),
        };
        if old_format != Some(format) {
            debug!("surface format changed, recreating render pass");
            let render_pass = self.backend.create_render_pass(format)?;
            self.backend.destroy_render_pass(self.render_pass);
            self.render_pass = render_pass;
        }
        self.framebuffers = create_framebuffers(&mut self.backend, self.render_pass, &views, extent)?;
        self.replace_semaphores()?;

        info!(
            "swapchain rebuilt: {}x{}, {} images",
            extent.width,
            extent.height,
            views.len()
        );
        Ok(true)
    }

    /// A skipped frame can leave an acquire semaphore signaled with nobody
    /// waiting on it, so every slot gets fresh semaphores after a rebuild.
    fn replace_semaphores(&mut self) -> RenderResult<()> {
        for i in 0..self.slots.len() {
            let acquire = self.backend.create_semaphore()?;
            let complete = match self.backend.create_semaphore() {
                Ok(s) => s,
                Err(e) => {
                    self.backend.destroy_semaphore(acquire);
                    return Err(e);
                }
            };
            let slot = &mut self.slots[i];
            self.backend.destroy_semaphore(slot.acquire);
            self.backend.destroy_semaphore(slot.complete);
            slot.acquire = acquire;
            slot.complete = complete;
        }
        Ok(())
    }

    // --- teardown ---

    /// Waits for the GPU and destroys everything in reverse construction
    /// order. Safe to call more than once; `Drop` calls it too.
    pub fn shutdown(&mut self) {
        if self.phase == FramePhase::Shutdown {
            return;
        }

        // A fence reset for a frame that never got submitted would never signal.
        let fences: Vec<vk::Fence> = self
            .slots
            .iter()
            .map(|s| s.in_flight)
            .filter(|&f| Some(f) != self.unsubmitted_fence)
            .collect();
        if !fences.is_empty() {
            if let Err(e) = self.backend.wait_for_fences(&fences, FENCE_TIMEOUT) {
                warn!("shutdown: waiting for in-flight fences failed: {e}");
            }
        }
        if let Err(e) = self.backend.device_wait_idle() {
            warn!("shutdown: device_wait_idle failed: {e}");
        }

        for fb in self.framebuffers.drain(..) {
            self.backend.destroy_framebuffer(fb);
        }
        if let Some(sc) = self.swapchain.take() {
            sc.destroy(&mut self.backend);
        }
        self.backend.destroy_render_pass(self.render_pass);

        let buffers: Vec<vk::CommandBuffer> =
            self.slots.iter().map(|s| s.command_buffer).collect();
        if !buffers.is_empty() {
            self.backend.free_command_buffers(self.command_pool, &buffers);
        }
        for slot in &self.slots {
            self.backend.destroy_semaphore(slot.acquire);
            self.backend.destroy_semaphore(slot.complete);
        }
        for slot in &self.slots {
            self.backend.destroy_fence(slot.in_flight);
        }
        for slot in &self.slots {
            self.backend.destroy_query_pool(slot.timestamps);
        }
        self.slots.clear();
        self.backend.destroy_command_pool(self.command_pool);

        self.backend.destroy_device();
        if self.debug_messenger {
            self.backend.destroy_debug_messenger();
        }
        self.backend.destroy_surface(self.surface);
        self.backend.destroy_instance();

        self.phase = FramePhase::Shutdown;
        info!("render context shut down after {} frames", self.frames_presented);
    }

    // --- accessors ---

    fn swapchain_handle(&self) -> RenderResult<vk::SwapchainKHR> {
        self.swapchain
            .as_ref()
            .map(|sc| sc.handle)
            .ok_or(RenderError::NotInitialized("swapchain"))
    }

    /// Recording state for the current frame; `None` outside `Recording`.
    pub fn frame(&self) -> Option<FrameContext> {
        if self.phase != FramePhase::Recording {
            return None;
        }
        let slot = self.slots.get(self.slot_index)?;
        let sc = self.swapchain.as_ref()?;
        Some(FrameContext {
            slot: self.slot_index,
            image_index: self.image_index,
            command_buffer: slot.command_buffer,
            render_pass: self.render_pass,
            framebuffer: *self.framebuffers.get(self.image_index as usize)?,
            extent: sc.extent,
            timestamps: slot.timestamps,
        })
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn current_slot(&self) -> usize {
        self.slot_index
    }

    pub fn buffering_depth(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    pub fn swapchain(&self) -> Option<&SwapchainState> {
        self.swapchain.as_ref()
    }

    /// Current swapchain extent, or the last requested size when there is
    /// no swapchain.
    pub fn extent(&self) -> vk::Extent2D {
        match &self.swapchain {
            Some(sc) => sc.extent,
            None => vk::Extent2D {
                width: self.requested.width,
                height: self.requested.height,
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.extent().width
    }

    pub fn height(&self) -> u32 {
        self.extent().height
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn selected_device(&self) -> &SelectedDevice {
        &self.device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// For collaborators allocating their own one-off command buffers.
    /// Submissions from them must be serialized with the frame loop.
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// GPU time of the most recently completed frame, when timestamps are
    /// supported on the graphics queue.
    pub fn last_gpu_frame_time(&self) -> Option<Duration> {
        self.last_gpu_frame_time
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GpuBackend> Drop for RenderContext<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_parts<B: GpuBackend>(
    guard: &mut InitGuard<'_, B>,
    target: &SurfaceTarget,
    config: &RenderConfig,
) -> RenderResult<InitParts> {
    let depth = config.buffering_depth;

    // 1) instance
    let layers = if config.validation {
        let available = guard.backend().instance_layers()?;
        if !available.iter().any(|l| l == VALIDATION_LAYER) {
            return Err(RenderError::MissingValidationLayer(VALIDATION_LAYER.into()));
        }
        vec![VALIDATION_LAYER.to_string()]
    } else {
        Vec::new()
    };
    guard.backend().create_instance(&InstanceDesc {
        app_name: APP_NAME.into(),
        display: target.display,
        layers,
        debug_utils: config.validation,
    })?;
    guard.push(Created::Instance);

    let debug_messenger = if config.validation {
        guard.backend().create_debug_messenger()?;
        guard.push(Created::DebugMessenger);
        true
    } else {
        false
    };

    // 2) surface
    let surface = guard.backend().create_surface(target)?;
    guard.push(Created::Surface(surface));

    // 3) device selection
    let physical = guard.backend().enumerate_physical_devices()?;
    let mut candidates = Vec::with_capacity(physical.len());
    for pd in physical {
        match DeviceCandidate::query(guard.backend(), pd, surface) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => debug!("skipping physical device {pd:?}: {e}"),
        }
    }
    let device = select_device(&candidates, surface)?;
    check_budgets(&device.candidate, config);

    // 4) logical device
    let missing = DeviceFeatures::REQUIRED - device.candidate.features;
    if !missing.is_empty() {
        return Err(RenderError::MissingFeature(missing.describe()));
    }
    let features =
        DeviceFeatures::REQUIRED | (device.candidate.features & DeviceFeatures::OPTIONAL);
    guard.backend().create_device(&DeviceDesc {
        physical_device: device.physical_device(),
        queue_families: device.unique_families(),
        extensions: vec![ash::khr::swapchain::NAME.to_string_lossy().into_owned()],
        features,
    })?;
    guard.push(Created::Device);
    debug!("logical device features [{}]", features.describe());

    // 5) queues
    let graphics_queue = guard.backend().device_queue(device.graphics_family, 0)?;
    let present_queue = guard.backend().device_queue(device.present_family, 0)?;

    // 6) semaphores
    let mut semaphores = Vec::with_capacity(depth as usize);
    for _ in 0..depth {
        let acquire = guard.backend().create_semaphore()?;
        guard.push(Created::Semaphore(acquire));
        let complete = guard.backend().create_semaphore()?;
        guard.push(Created::Semaphore(complete));
        semaphores.push((acquire, complete));
    }

    // 7) timestamp pools
    let mut pools = Vec::with_capacity(depth as usize);
    for _ in 0..depth {
        let pool = guard.backend().create_timestamp_pool(TIMESTAMPS_PER_SLOT)?;
        guard.push(Created::QueryPool(pool));
        pools.push(pool);
    }

    // 8) command pool, buffers, fences
    let command_pool = guard.backend().create_command_pool(device.graphics_family)?;
    guard.push(Created::CommandPool(command_pool));
    let buffers = guard.backend().allocate_command_buffers(command_pool, depth)?;
    guard.push(Created::CommandBuffers(command_pool, buffers.clone()));
    let mut fences = Vec::with_capacity(depth as usize);
    for _ in 0..depth {
        let fence = guard.backend().create_fence(true)?;
        guard.push(Created::Fence(fence));
        fences.push(fence);
    }

    let slots = semaphores
        .into_iter()
        .zip(pools)
        .zip(buffers.into_iter().zip(fences))
        .map(|(((acquire, complete), timestamps), (command_buffer, in_flight))| FrameSlot {
            acquire,
            complete,
            in_flight,
            command_buffer,
            timestamps,
            timestamps_pending: false,
        })
        .collect();

    // 9) swapchain and presentation targets
    let desc = SwapchainState::describe(guard.backend(), &device, surface, target.size, depth)?
        .ok_or_else(|| RenderError::Surface("surface reports a zero-area extent".into()))?;
    let swapchain = SwapchainState::create(guard.backend(), &desc)?;
    guard.push(Created::Swapchain(swapchain.clone()));

    let render_pass = guard.backend().create_render_pass(swapchain.format)?;
    guard.push(Created::RenderPass(render_pass));

    let framebuffers = create_framebuffers(
        guard.backend(),
        render_pass,
        &swapchain.views,
        swapchain.extent,
    )?;
    for &fb in &framebuffers {
        guard.push(Created::Framebuffer(fb));
    }

    Ok(InitParts {
        surface,
        device,
        graphics_queue,
        present_queue,
        debug_messenger,
        command_pool,
        slots,
        swapchain,
        render_pass,
        framebuffers,
    })
}

/// One framebuffer per view; nothing is left behind on failure.
fn create_framebuffers<B: GpuBackend>(
    backend: &mut B,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> RenderResult<Vec<vk::Framebuffer>> {
    let mut out = Vec::with_capacity(views.len());
    for &view in views {
        match backend.create_framebuffer(render_pass, view, extent) {
            Ok(fb) => out.push(fb),
            Err(e) => {
                for fb in out {
                    backend.destroy_framebuffer(fb);
                }
                return Err(e);
            }
        }
    }
    Ok(out)
}

fn check_budgets(candidate: &DeviceCandidate, config: &RenderConfig) {
    if config.device_local_budget > candidate.device_local_bytes {
        warn!(
            "device-local budget {} MiB exceeds {} MiB available on {:?}",
            config.device_local_budget >> 20,
            candidate.device_local_bytes >> 20,
            candidate.name
        );
    }
    if config.host_budget_total() > candidate.host_visible_bytes {
        warn!(
            "host-visible + staging budget {} MiB exceeds {} MiB available on {:?}",
            config.host_budget_total() >> 20,
            candidate.host_visible_bytes >> 20,
            candidate.name
        );
    }
}
