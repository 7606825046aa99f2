// SPDX-License-Identifier: CEPL-1.0
//! The seam between the render core and the GPU API.
//!
//! [`GpuBackend`] is a thin, handle-in/handle-out mirror of the Vulkan calls
//! the core makes. The real implementation lives in `strata-render-vk`
//! (`AshBackend`); tests drive the core through [`crate::mock::MockBackend`].
//!
//! The backend owns the instance- and device-level dispatch tables, so
//! `create_instance` / `create_device` store their result instead of
//! returning it. Every other object is a plain `vk` handle owned by the
//! caller, who is responsible for destroying it.
//!
//! Per-frame calls whose result the core has to classify (`acquire`,
//! `submit`, `present`) return the raw [`VkResult`] so the status code is
//! preserved.

use std::time::Duration;

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::candidate::DeviceFeatures;
use crate::error::RenderResult;
use crate::RenderSize;

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Native handles the surface is created from, plus the initial client size.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceTarget {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
    pub size: RenderSize,
}

#[derive(Clone, Debug)]
pub struct InstanceDesc {
    pub app_name: String,
    pub display: RawDisplayHandle,
    /// Layers to enable; already checked against the enumerated list.
    pub layers: Vec<String>,
    /// Enable `VK_EXT_debug_utils`.
    pub debug_utils: bool,
}

#[derive(Clone, Debug)]
pub struct DeviceDesc {
    pub physical_device: vk::PhysicalDevice,
    /// One queue (priority 1.0) is created per entry.
    pub queue_families: Vec<u32>,
    pub extensions: Vec<String>,
    pub features: DeviceFeatures,
}

#[derive(Clone, Debug)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub image_usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    /// Only meaningful for `CONCURRENT` sharing.
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub old_swapchain: vk::SwapchainKHR,
}

#[derive(Clone, Copy, Debug)]
pub struct SubmitDesc {
    pub command_buffer: vk::CommandBuffer,
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal_semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

#[derive(Clone, Copy, Debug)]
pub struct PresentDesc {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait_semaphore: vk::Semaphore,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

pub trait GpuBackend {
    // --- instance ---
    fn instance_layers(&mut self) -> RenderResult<Vec<String>>;
    fn create_instance(&mut self, desc: &InstanceDesc) -> RenderResult<()>;
    fn destroy_instance(&mut self);
    fn create_debug_messenger(&mut self) -> RenderResult<()>;
    fn destroy_debug_messenger(&mut self);

    // --- surface ---
    fn create_surface(&mut self, target: &SurfaceTarget) -> RenderResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    // --- physical device queries ---
    fn enumerate_physical_devices(&mut self) -> RenderResult<Vec<vk::PhysicalDevice>>;
    fn physical_device_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceProperties>;
    fn physical_device_features(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceFeatures>;
    fn memory_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceMemoryProperties>;
    fn queue_family_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<Vec<vk::QueueFamilyProperties>>;
    fn device_extensions(&mut self, pd: vk::PhysicalDevice) -> RenderResult<Vec<String>>;
    fn surface_support(
        &mut self,
        pd: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<bool>;
    fn surface_capabilities(
        &mut self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &mut self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &mut self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Vec<vk::PresentModeKHR>>;

    // --- logical device ---
    fn create_device(&mut self, desc: &DeviceDesc) -> RenderResult<()>;
    fn destroy_device(&mut self);
    fn device_queue(&mut self, family: u32, index: u32) -> RenderResult<vk::Queue>;
    fn device_wait_idle(&mut self) -> RenderResult<()>;

    // --- sync ---
    fn create_semaphore(&mut self) -> RenderResult<vk::Semaphore>;
    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore);
    fn create_fence(&mut self, signaled: bool) -> RenderResult<vk::Fence>;
    fn destroy_fence(&mut self, fence: vk::Fence);
    fn wait_for_fences(&mut self, fences: &[vk::Fence], timeout: Duration) -> RenderResult<()>;
    fn reset_fence(&mut self, fence: vk::Fence) -> RenderResult<()>;

    // --- queries ---
    fn create_timestamp_pool(&mut self, count: u32) -> RenderResult<vk::QueryPool>;
    fn destroy_query_pool(&mut self, pool: vk::QueryPool);
    /// `Ok(None)` while results are not yet available.
    fn timestamp_results(
        &mut self,
        pool: vk::QueryPool,
        count: u32,
    ) -> RenderResult<Option<Vec<u64>>>;

    // --- commands ---
    fn create_command_pool(&mut self, family: u32) -> RenderResult<vk::CommandPool>;
    fn destroy_command_pool(&mut self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RenderResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()>;
    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()>;
    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()>;
    fn cmd_reset_query_pool(&mut self, cmd: vk::CommandBuffer, pool: vk::QueryPool, count: u32);
    fn cmd_write_timestamp(
        &mut self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    );
    fn cmd_begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin);
    fn cmd_end_render_pass(&mut self, cmd: vk::CommandBuffer);

    // --- swapchain and presentation targets ---
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> RenderResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);
    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>>;
    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> RenderResult<vk::ImageView>;
    fn destroy_image_view(&mut self, view: vk::ImageView);
    fn create_render_pass(&mut self, format: vk::Format) -> RenderResult<vk::RenderPass>;
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);
    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer>;
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);

    // --- per frame ---
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()>;
    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool>;
}
