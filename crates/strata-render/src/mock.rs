// SPDX-License-Identifier: CEPL-1.0
//! In-memory [`GpuBackend`] for exercising the render core without a GPU.
//!
//! Every created object gets a unique handle and is tracked until destroyed,
//! so tests can check for leaks and teardown order. Submissions stay pending
//! until something waits on their fence (or the device idles), which lets
//! tests catch a command buffer or fence being reused while still in flight.
//!
//! Per-frame results can be scripted (`acquire_script`, `present_script`,
//! `submit_script`) and any creation call can be made to fail with
//! `fail_on`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::c_char;
use std::rc::Rc;
use std::time::Duration;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};

use crate::backend::{
    DeviceDesc, GpuBackend, InstanceDesc, PresentDesc, RenderPassBegin, SubmitDesc,
    SurfaceTarget, SwapchainDesc, VALIDATION_LAYER,
};
use crate::candidate::DeviceFeatures;
use crate::error::{RenderError, RenderResult};
use crate::RenderSize;

const PHYSICAL_DEVICE_BASE: u64 = 0x1000;
const QUEUE_BASE: u64 = 0x2000;
const FIRST_HANDLE: u64 = 0x1_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    Instance,
    DebugMessenger,
    Surface,
    Device,
    Semaphore,
    Fence,
    QueryPool,
    CommandPool,
    CommandBuffer,
    Swapchain,
    ImageView,
    RenderPass,
    Framebuffer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockEvent {
    Create(MockOp, u64),
    Destroy(MockOp, u64),
    WaitFences(Vec<u64>),
    ResetFence(u64),
    ResetCommandBuffer(u64),
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    Submit { command_buffer: u64, fence: u64 },
    Acquire { swapchain: u64 },
    Present { swapchain: u64, image_index: u32 },
    BeginRenderPass { framebuffer: u64 },
    EndRenderPass,
    DeviceWaitIdle,
}

#[derive(Clone, Debug)]
pub struct MockQueueFamily {
    pub graphics: bool,
    pub present: bool,
    pub queue_count: u32,
    pub timestamp_valid_bits: u32,
}

/// A fake physical device and what it reports for the test surface.
#[derive(Clone, Debug)]
pub struct MockDevice {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub families: Vec<MockQueueFamily>,
    pub extensions: Vec<String>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub features: DeviceFeatures,
    pub device_local_bytes: u64,
    pub host_visible_bytes: u64,
    pub timestamp_period: f32,
    /// Every surface query against this device fails with this result.
    pub surface_error: Option<vk::Result>,
}

impl MockDevice {
    /// One family doing graphics and present, swapchain support, every
    /// feature, a free-sized surface.
    pub fn eligible(name: &str) -> Self {
        MockDevice {
            name: name.to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            families: vec![MockQueueFamily {
                graphics: true,
                present: true,
                queue_count: 1,
                timestamp_valid_bits: 64,
            }],
            extensions: vec![ash::khr::swapchain::NAME.to_string_lossy().into_owned()],
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            features: DeviceFeatures::REQUIRED | DeviceFeatures::OPTIONAL,
            device_local_bytes: 4u64 << 30,
            host_visible_bytes: 2u64 << 30,
            timestamp_period: 1.0,
            surface_error: None,
        }
    }

    /// Graphics and present on separate families.
    pub fn with_split_queues(mut self) -> Self {
        self.families = vec![
            MockQueueFamily {
                graphics: true,
                present: false,
                queue_count: 1,
                timestamp_valid_bits: 64,
            },
            MockQueueFamily {
                graphics: false,
                present: true,
                queue_count: 1,
                timestamp_valid_bits: 0,
            },
        ];
        self
    }
}

/// What the mock observed. Shared through [`MockBackend::ledger`] so tests
/// can still inspect it after the backend has been moved into (or dropped
/// by) a render context.
#[derive(Debug, Default)]
pub struct MockLedger {
    live: HashMap<u64, MockOp>,
    events: Vec<MockEvent>,
    framebuffer_views: HashMap<u64, u64>,
    instance_desc: Option<InstanceDesc>,
    device_desc: Option<DeviceDesc>,
    swapchain_descs: Vec<SwapchainDesc>,
    fence_violations: usize,
    deadlocks: usize,
    invalid_destroys: usize,
    max_pending: usize,
}

pub struct MockBackend {
    pub devices: Vec<MockDevice>,
    pub layers: Vec<String>,
    pub acquire_script: VecDeque<VkResult<(u32, bool)>>,
    pub present_script: VecDeque<VkResult<bool>>,
    pub submit_script: VecDeque<VkResult<()>>,
    /// Fail the n-th (zero-based) creation of this kind.
    pub fail_on: Option<(MockOp, usize)>,
    /// Images granted on top of the requested minimum.
    pub extra_images: u32,
    pub gpu_ticks_per_frame: u64,

    ledger: Rc<RefCell<MockLedger>>,
    next_handle: u64,
    attempts: HashMap<MockOp, usize>,
    fences: HashMap<u64, bool>,
    /// Submitted, not yet completed: (command buffer, fence).
    pending: Vec<(u64, u64)>,
    swapchains: HashMap<u64, Vec<vk::Image>>,
    written_timestamps: HashSet<u64>,
    next_image: u32,

    instance: Option<u64>,
    debug_messenger: Option<u64>,
    device: Option<u64>,
}

impl MockLedger {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_of(&self, op: MockOp) -> usize {
        self.live.values().filter(|&&o| o == op).count()
    }

    pub fn is_live(&self, handle: u64) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Kinds of destroyed objects in order, consecutive repeats collapsed.
    pub fn destroy_order(&self) -> Vec<MockOp> {
        let mut out: Vec<MockOp> = Vec::new();
        for event in &self.events {
            if let MockEvent::Destroy(op, _) = event {
                if out.last() != Some(op) {
                    out.push(*op);
                }
            }
        }
        out
    }

    /// Resets or re-begins of in-flight objects, and submits with a
    /// signaled fence.
    pub fn fence_violations(&self) -> usize {
        self.fence_violations
    }

    /// Waits on a fence that nothing will ever signal.
    pub fn deadlocks(&self) -> usize {
        self.deadlocks
    }

    /// Destroys of unknown handles, or of a handle as the wrong kind.
    pub fn invalid_destroys(&self) -> usize {
        self.invalid_destroys
    }

    /// Most submissions ever outstanding at once.
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn submit_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MockEvent::Submit { .. }))
            .count()
    }

    pub fn instance_desc(&self) -> Option<&InstanceDesc> {
        self.instance_desc.as_ref()
    }

    pub fn device_desc(&self) -> Option<&DeviceDesc> {
        self.device_desc.as_ref()
    }

    pub fn swapchain_descs(&self) -> &[SwapchainDesc] {
        &self.swapchain_descs
    }

    /// Every live framebuffer was built from a live image view.
    pub fn framebuffers_reference_live_views(&self) -> bool {
        self.live
            .iter()
            .filter(|(_, &op)| op == MockOp::Framebuffer)
            .all(|(fb, _)| {
                self.framebuffer_views
                    .get(fb)
                    .is_some_and(|view| self.live.get(view) == Some(&MockOp::ImageView))
            })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_devices(vec![MockDevice::eligible("Mock GPU")])
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        MockBackend {
            devices,
            layers: vec![VALIDATION_LAYER.to_string()],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            submit_script: VecDeque::new(),
            fail_on: None,
            extra_images: 0,
            gpu_ticks_per_frame: 1_000_000,
            ledger: Rc::new(RefCell::new(MockLedger::default())),
            next_handle: FIRST_HANDLE,
            attempts: HashMap::new(),
            fences: HashMap::new(),
            pending: Vec::new(),
            swapchains: HashMap::new(),
            written_timestamps: HashSet::new(),
            next_image: 0,
            instance: None,
            debug_messenger: None,
            device: None,
        }
    }

    /// An Xlib-flavoured target; the handles are never dereferenced.
    pub fn surface_target(width: u32, height: u32) -> SurfaceTarget {
        SurfaceTarget {
            display: RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
            window: RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
            size: RenderSize::new(width, height),
        }
    }

    pub fn ledger(&self) -> Rc<RefCell<MockLedger>> {
        Rc::clone(&self.ledger)
    }

    pub fn pending_submissions(&self) -> usize {
        self.pending.len()
    }

    // --- bookkeeping ---

    fn check_fail(&mut self, op: MockOp) -> RenderResult<()> {
        let attempt = self.attempts.entry(op).or_insert(0);
        let n = *attempt;
        *attempt += 1;
        if self.fail_on == Some((op, n)) {
            return Err(RenderError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        Ok(())
    }

    fn register(&mut self, op: MockOp) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        let mut ledger = self.ledger.borrow_mut();
        ledger.live.insert(handle, op);
        ledger.events.push(MockEvent::Create(op, handle));
        handle
    }

    fn create(&mut self, op: MockOp) -> RenderResult<u64> {
        self.check_fail(op)?;
        Ok(self.register(op))
    }

    fn destroy(&mut self, op: MockOp, handle: u64) {
        if handle == 0 {
            return;
        }
        let mut ledger = self.ledger.borrow_mut();
        match ledger.live.remove(&handle) {
            Some(found) if found == op => {}
            Some(found) => {
                ledger.invalid_destroys += 1;
                ledger.live.insert(handle, found);
            }
            None => ledger.invalid_destroys += 1,
        }
        ledger.events.push(MockEvent::Destroy(op, handle));
    }

    fn log(&self, event: MockEvent) {
        self.ledger.borrow_mut().events.push(event);
    }

    fn device(&self, pd: vk::PhysicalDevice) -> RenderResult<&MockDevice> {
        pd.as_raw()
            .checked_sub(PHYSICAL_DEVICE_BASE)
            .and_then(|i| self.devices.get(i as usize))
            .ok_or(RenderError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED))
    }

    fn surface_device(&self, pd: vk::PhysicalDevice) -> RenderResult<&MockDevice> {
        let dev = self.device(pd)?;
        match dev.surface_error {
            Some(e) => Err(RenderError::Vulkan(e)),
            None => Ok(dev),
        }
    }

    fn complete_where(&mut self, done: impl Fn(&(u64, u64)) -> bool) {
        let mut still = Vec::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            if done(&entry) {
                self.fences.insert(entry.1, true);
            } else {
                still.push(entry);
            }
        }
        self.pending = still;
    }

    fn in_flight_cb(&self, cmd: u64) -> bool {
        self.pending.iter().any(|&(cb, _)| cb == cmd)
    }
}

impl GpuBackend for MockBackend {
    fn instance_layers(&mut self) -> RenderResult<Vec<String>> {
        Ok(self.layers.clone())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> RenderResult<()> {
        let handle = self.create(MockOp::Instance)?;
        self.instance = Some(handle);
        self.ledger.borrow_mut().instance_desc = Some(desc.clone());
        Ok(())
    }

    fn destroy_instance(&mut self) {
        if let Some(handle) = self.instance.take() {
            self.destroy(MockOp::Instance, handle);
        }
    }

    fn create_debug_messenger(&mut self) -> RenderResult<()> {
        self.debug_messenger = Some(self.create(MockOp::DebugMessenger)?);
        Ok(())
    }

    fn destroy_debug_messenger(&mut self) {
        if let Some(handle) = self.debug_messenger.take() {
            self.destroy(MockOp::DebugMessenger, handle);
        }
    }

    fn create_surface(&mut self, _target: &SurfaceTarget) -> RenderResult<vk::SurfaceKHR> {
        Ok(vk::SurfaceKHR::from_raw(self.create(MockOp::Surface)?))
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        self.destroy(MockOp::Surface, surface.as_raw());
    }

    fn enumerate_physical_devices(&mut self) -> RenderResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.devices.len() as u64)
            .map(|i| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + i))
            .collect())
    }

    fn physical_device_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceProperties> {
        let dev = self.device(pd)?;
        let mut props = vk::PhysicalDeviceProperties {
            device_type: dev.device_type,
            ..Default::default()
        };
        props.limits.timestamp_period = dev.timestamp_period;
        let max = props.device_name.len() - 1;
        for (dst, b) in props.device_name.iter_mut().zip(dev.name.bytes().take(max)) {
            *dst = b as c_char;
        }
        Ok(props)
    }

    fn physical_device_features(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceFeatures> {
        Ok(self.device(pd)?.features.to_vk())
    }

    fn memory_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceMemoryProperties> {
        let dev = self.device(pd)?;
        let mut mem = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 2,
            memory_type_count: 2,
            ..Default::default()
        };
        mem.memory_heaps[0] = vk::MemoryHeap {
            size: dev.device_local_bytes,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        mem.memory_heaps[1] = vk::MemoryHeap {
            size: dev.host_visible_bytes,
            flags: vk::MemoryHeapFlags::empty(),
        };
        mem.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        mem.memory_types[1] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 1,
        };
        Ok(mem)
    }

    fn queue_family_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self
            .device(pd)?
            .families
            .iter()
            .map(|f| vk::QueueFamilyProperties {
                queue_flags: if f.graphics {
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER
                } else {
                    vk::QueueFlags::TRANSFER
                },
                queue_count: f.queue_count,
                timestamp_valid_bits: f.timestamp_valid_bits,
                ..Default::default()
            })
            .collect())
    }

    fn device_extensions(&mut self, pd: vk::PhysicalDevice) -> RenderResult<Vec<String>> {
        Ok(self.device(pd)?.extensions.clone())
    }

    fn surface_support(
        &mut self,
        pd: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> RenderResult<bool> {
        Ok(self
            .surface_device(pd)?
            .families
            .get(family as usize)
            .is_some_and(|f| f.present))
    }

    fn surface_capabilities(
        &mut self,
        pd: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> RenderResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.surface_device(pd)?.capabilities)
    }

    fn surface_formats(
        &mut self,
        pd: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> RenderResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.surface_device(pd)?.formats.clone())
    }

    fn surface_present_modes(
        &mut self,
        pd: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> RenderResult<Vec<vk::PresentModeKHR>> {
        Ok(self.surface_device(pd)?.present_modes.clone())
    }

    fn create_device(&mut self, desc: &DeviceDesc) -> RenderResult<()> {
        let handle = self.create(MockOp::Device)?;
        self.device = Some(handle);
        self.ledger.borrow_mut().device_desc = Some(desc.clone());
        Ok(())
    }

    fn destroy_device(&mut self) {
        if let Some(handle) = self.device.take() {
            self.destroy(MockOp::Device, handle);
        }
    }

    fn device_queue(&mut self, family: u32, _index: u32) -> RenderResult<vk::Queue> {
        Ok(vk::Queue::from_raw(QUEUE_BASE + u64::from(family)))
    }

    fn device_wait_idle(&mut self) -> RenderResult<()> {
        self.log(MockEvent::DeviceWaitIdle);
        self.complete_where(|_| true);
        Ok(())
    }

    fn create_semaphore(&mut self) -> RenderResult<vk::Semaphore> {
        Ok(vk::Semaphore::from_raw(self.create(MockOp::Semaphore)?))
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        self.destroy(MockOp::Semaphore, semaphore.as_raw());
    }

    fn create_fence(&mut self, signaled: bool) -> RenderResult<vk::Fence> {
        let handle = self.create(MockOp::Fence)?;
        self.fences.insert(handle, signaled);
        Ok(vk::Fence::from_raw(handle))
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        self.fences.remove(&fence.as_raw());
        self.destroy(MockOp::Fence, fence.as_raw());
    }

    fn wait_for_fences(&mut self, fences: &[vk::Fence], _timeout: Duration) -> RenderResult<()> {
        let raw: Vec<u64> = fences.iter().map(|f| f.as_raw()).collect();
        self.log(MockEvent::WaitFences(raw.clone()));
        for fence in raw {
            if self.fences.get(&fence) == Some(&true) {
                continue;
            }
            if self.pending.iter().any(|&(_, f)| f == fence) {
                self.complete_where(|&(_, f)| f == fence);
            } else {
                self.ledger.borrow_mut().deadlocks += 1;
                return Err(RenderError::Vulkan(vk::Result::TIMEOUT));
            }
        }
        Ok(())
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> RenderResult<()> {
        let raw = fence.as_raw();
        if self.pending.iter().any(|&(_, f)| f == raw) {
            self.ledger.borrow_mut().fence_violations += 1;
        }
        self.fences.insert(raw, false);
        self.log(MockEvent::ResetFence(raw));
        Ok(())
    }

    fn create_timestamp_pool(&mut self, _count: u32) -> RenderResult<vk::QueryPool> {
        Ok(vk::QueryPool::from_raw(self.create(MockOp::QueryPool)?))
    }

    fn destroy_query_pool(&mut self, pool: vk::QueryPool) {
        self.written_timestamps.remove(&pool.as_raw());
        self.destroy(MockOp::QueryPool, pool.as_raw());
    }

    fn timestamp_results(
        &mut self,
        pool: vk::QueryPool,
        _count: u32,
    ) -> RenderResult<Option<Vec<u64>>> {
        if self.written_timestamps.remove(&pool.as_raw()) {
            Ok(Some(vec![1_000, 1_000 + self.gpu_ticks_per_frame]))
        } else {
            Ok(None)
        }
    }

    fn create_command_pool(&mut self, _family: u32) -> RenderResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.create(MockOp::CommandPool)?))
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        self.destroy(MockOp::CommandPool, pool.as_raw());
    }

    fn allocate_command_buffers(
        &mut self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> RenderResult<Vec<vk::CommandBuffer>> {
        self.check_fail(MockOp::CommandBuffer)?;
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.register(MockOp::CommandBuffer)))
            .collect())
    }

    fn free_command_buffers(&mut self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        for cb in buffers {
            self.destroy(MockOp::CommandBuffer, cb.as_raw());
        }
    }

    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        if self.in_flight_cb(cmd.as_raw()) {
            self.ledger.borrow_mut().fence_violations += 1;
        }
        self.log(MockEvent::ResetCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        if self.in_flight_cb(cmd.as_raw()) {
            self.ledger.borrow_mut().fence_violations += 1;
        }
        self.log(MockEvent::BeginCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        self.log(MockEvent::EndCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    fn cmd_reset_query_pool(&mut self, _cmd: vk::CommandBuffer, pool: vk::QueryPool, _count: u32) {
        self.written_timestamps.remove(&pool.as_raw());
    }

    fn cmd_write_timestamp(
        &mut self,
        _cmd: vk::CommandBuffer,
        _stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        if query == 1 {
            self.written_timestamps.insert(pool.as_raw());
        }
    }

    fn cmd_begin_render_pass(&mut self, _cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.log(MockEvent::BeginRenderPass {
            framebuffer: begin.framebuffer.as_raw(),
        });
    }

    fn cmd_end_render_pass(&mut self, _cmd: vk::CommandBuffer) {
        self.log(MockEvent::EndRenderPass);
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> RenderResult<vk::SwapchainKHR> {
        let handle = self.create(MockOp::Swapchain)?;
        let count = desc.min_image_count + self.extra_images;
        let images = (0..count)
            .map(|_| {
                let raw = self.next_handle;
                self.next_handle += 1;
                vk::Image::from_raw(raw)
            })
            .collect();
        self.swapchains.insert(handle, images);
        self.ledger.borrow_mut().swapchain_descs.push(desc.clone());
        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.swapchains.remove(&swapchain.as_raw());
        self.destroy(MockOp::Swapchain, swapchain.as_raw());
    }

    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>> {
        self.swapchains
            .get(&swapchain.as_raw())
            .cloned()
            .ok_or(RenderError::NotInitialized("swapchain"))
    }

    fn create_image_view(
        &mut self,
        _image: vk::Image,
        _format: vk::Format,
    ) -> RenderResult<vk::ImageView> {
        Ok(vk::ImageView::from_raw(self.create(MockOp::ImageView)?))
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.destroy(MockOp::ImageView, view.as_raw());
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> RenderResult<vk::RenderPass> {
        Ok(vk::RenderPass::from_raw(self.create(MockOp::RenderPass)?))
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.destroy(MockOp::RenderPass, render_pass.as_raw());
    }

    fn create_framebuffer(
        &mut self,
        _render_pass: vk::RenderPass,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        let handle = self.create(MockOp::Framebuffer)?;
        self.ledger.borrow_mut().framebuffer_views.insert(handle, view.as_raw());
        Ok(vk::Framebuffer::from_raw(handle))
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        self.ledger.borrow_mut().framebuffer_views.remove(&framebuffer.as_raw());
        self.destroy(MockOp::Framebuffer, framebuffer.as_raw());
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.log(MockEvent::Acquire {
            swapchain: swapchain.as_raw(),
        });
        if let Some(result) = self.acquire_script.pop_front() {
            return result;
        }
        let count = match self.swapchains.get(&swapchain.as_raw()) {
            Some(images) if !images.is_empty() => images.len() as u32,
            _ => return Err(vk::Result::ERROR_SURFACE_LOST_KHR),
        };
        let index = self.next_image % count;
        self.next_image = self.next_image.wrapping_add(1);
        Ok((index, false))
    }

    fn queue_submit(&mut self, _queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        if let Some(Err(e)) = self.submit_script.pop_front() {
            return Err(e);
        }
        let cmd = submit.command_buffer.as_raw();
        let fence = submit.fence.as_raw();
        if self.fences.get(&fence) != Some(&false) {
            self.ledger.borrow_mut().fence_violations += 1;
        }
        self.pending.push((cmd, fence));
        let pending = self.pending.len();
        let mut ledger = self.ledger.borrow_mut();
        ledger.max_pending = ledger.max_pending.max(pending);
        ledger.events.push(MockEvent::Submit {
            command_buffer: cmd,
            fence,
        });
        Ok(())
    }

    fn queue_present(&mut self, _queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        self.log(MockEvent::Present {
            swapchain: present.swapchain.as_raw(),
            image_index: present.image_index,
        });
        self.present_script.pop_front().unwrap_or(Ok(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_tracked_until_destroyed() {
        let mut mock = MockBackend::new();
        let a = mock.create_semaphore().unwrap();
        let b = mock.create_fence(true).unwrap();
        assert_eq!(mock.ledger().borrow().live_count(), 2);
        assert_ne!(a.as_raw(), b.as_raw());

        mock.destroy_semaphore(a);
        assert_eq!(mock.ledger().borrow().live_of(MockOp::Semaphore), 0);
        mock.destroy_semaphore(a);
        assert_eq!(mock.ledger().borrow().invalid_destroys(), 1);
    }

    #[test]
    fn test_fail_on_nth_creation() {
        let mut mock = MockBackend::new();
        mock.fail_on = Some((MockOp::Fence, 1));
        assert!(mock.create_fence(true).is_ok());
        assert!(mock.create_fence(true).is_err());
        assert!(mock.create_fence(true).is_ok());
        assert_eq!(mock.ledger().borrow().live_of(MockOp::Fence), 2);
    }

    #[test]
    fn test_reset_of_in_flight_fence_is_a_violation() {
        let mut mock = MockBackend::new();
        let fence = mock.create_fence(false).unwrap();
        let cmd = vk::CommandBuffer::from_raw(7);
        let submit = SubmitDesc {
            command_buffer: cmd,
            wait_semaphore: vk::Semaphore::null(),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: vk::Semaphore::null(),
            fence,
        };
        mock.queue_submit(vk::Queue::null(), &submit).unwrap();

        mock.begin_command_buffer(cmd).unwrap();
        assert_eq!(mock.ledger().borrow().fence_violations(), 1);

        mock.wait_for_fences(&[fence], Duration::MAX).unwrap();
        assert_eq!(mock.pending_submissions(), 0);
        mock.reset_fence(fence).unwrap();
        mock.begin_command_buffer(cmd).unwrap();
        assert_eq!(mock.ledger().borrow().fence_violations(), 1);
    }

    #[test]
    fn test_waiting_on_unsubmitted_fence_deadlocks() {
        let mut mock = MockBackend::new();
        let fence = mock.create_fence(false).unwrap();
        assert!(mock.wait_for_fences(&[fence], Duration::MAX).is_err());
        assert_eq!(mock.ledger().borrow().deadlocks(), 1);
    }

    #[test]
    fn test_acquire_cycles_images() {
        let mut mock = MockBackend::new();
        let desc = SwapchainDesc {
            surface: vk::SurfaceKHR::null(),
            min_image_count: 2,
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: Vec::new(),
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            old_swapchain: vk::SwapchainKHR::null(),
        };
        let sc = mock.create_swapchain(&desc).unwrap();
        let sem = vk::Semaphore::null();
        let seen: Vec<u32> = (0..4)
            .map(|_| mock.acquire_next_image(sc, sem).unwrap().0)
            .collect();
        assert_eq!(seen, vec![0, 1, 0, 1]);

        mock.acquire_script
            .push_back(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(
            mock.acquire_next_image(sc, sem),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR)
        );
    }
}
