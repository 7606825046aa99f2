// SPDX-License-Identifier: CEPL-1.0
//! Vulkan implementation of [`GpuBackend`] on top of `ash`.
//!
//! `AshBackend` holds the entry point and the instance/device dispatch
//! tables. It does not track the objects it creates; `RenderContext`
//! owns their lifetimes and destroys them in order.

mod debug;

use std::ffi::{c_char, CStr, CString};
use std::time::Duration;

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Device, Entry, Instance};
use tracing::{info, warn};

use strata_render::backend::{
    DeviceDesc, GpuBackend, InstanceDesc, PresentDesc, RenderPassBegin, SubmitDesc,
    SurfaceTarget, SwapchainDesc,
};
use strata_render::{RenderError, RenderResult};

pub struct AshBackend {
    entry: Entry,
    instance: Option<Instance>,
    surface_loader: Option<surface::Instance>,
    debug_loader: Option<debug_utils::Instance>,
    debug_messenger: vk::DebugUtilsMessengerEXT,
    device: Option<Device>,
    swapchain_loader: Option<swapchain::Device>,
}

impl Default for AshBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AshBackend {
    pub fn new() -> Self {
        AshBackend {
            entry: Entry::linked(),
            instance: None,
            surface_loader: None,
            debug_loader: None,
            debug_messenger: vk::DebugUtilsMessengerEXT::null(),
            device: None,
            swapchain_loader: None,
        }
    }

    /// For collaborators that build their own Vulkan objects (allocators,
    /// pipelines) on the same instance.
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    fn instance_ref(&self) -> RenderResult<&Instance> {
        self.instance
            .as_ref()
            .ok_or(RenderError::NotInitialized("instance"))
    }

    fn surface_ref(&self) -> RenderResult<&surface::Instance> {
        self.surface_loader
            .as_ref()
            .ok_or(RenderError::NotInitialized("surface loader"))
    }

    fn device_ref(&self) -> RenderResult<&Device> {
        self.device
            .as_ref()
            .ok_or(RenderError::NotInitialized("device"))
    }

    fn swapchain_ref(&self) -> RenderResult<&swapchain::Device> {
        self.swapchain_loader
            .as_ref()
            .ok_or(RenderError::NotInitialized("swapchain loader"))
    }
}

impl Drop for AshBackend {
    fn drop(&mut self) {
        if self.device.is_some() || self.instance.is_some() {
            warn!("AshBackend dropped with live device/instance; destroying");
            self.destroy_device();
            self.destroy_debug_messenger();
            self.destroy_instance();
        }
    }
}

fn c_strings(names: &[String]) -> RenderResult<Vec<CString>> {
    names
        .iter()
        .map(|n| CString::new(n.as_str()).map_err(|e| RenderError::Config(e.to_string())))
        .collect()
}

fn name_of(raw: &[c_char]) -> String {
    // SAFETY: Vulkan name arrays are null-terminated fixed buffers.
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

impl GpuBackend for AshBackend {
    fn instance_layers(&mut self) -> RenderResult<Vec<String>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties()? };
        Ok(layers.iter().map(|l| name_of(&l.layer_name)).collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> RenderResult<()> {
        let app_name = CString::new(desc.app_name.as_str())
            .map_err(|e| RenderError::Config(e.to_string()))?;

        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: app_name.as_ptr(),
            application_version: 0,
            p_engine_name: app_name.as_ptr(),
            engine_version: 0,
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };

        let mut extensions = ash_window::enumerate_required_extensions(desc.display)?.to_vec();
        if desc.debug_utils {
            extensions.push(debug_utils::NAME.as_ptr());
        }
        let layers = c_strings(&desc.layers)?;
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            ..Default::default()
        };

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        self.surface_loader = Some(surface::Instance::new(&self.entry, &instance));
        self.instance = Some(instance);
        info!(
            "Vulkan instance created ({} extensions, layers {:?})",
            extensions.len(),
            desc.layers
        );
        Ok(())
    }

    fn destroy_instance(&mut self) {
        self.surface_loader = None;
        self.debug_loader = None;
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(&mut self) -> RenderResult<()> {
        let loader = debug_utils::Instance::new(&self.entry, self.instance_ref()?);
        let create_info = debug::messenger_create_info();
        self.debug_messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        self.debug_loader = Some(loader);
        Ok(())
    }

    fn destroy_debug_messenger(&mut self) {
        if let Some(loader) = self.debug_loader.take() {
            if self.debug_messenger != vk::DebugUtilsMessengerEXT::null() {
                unsafe { loader.destroy_debug_utils_messenger(self.debug_messenger, None) };
            }
        }
        self.debug_messenger = vk::DebugUtilsMessengerEXT::null();
    }

    fn create_surface(&mut self, target: &SurfaceTarget) -> RenderResult<vk::SurfaceKHR> {
        let instance = self.instance_ref()?;
        let surface = unsafe {
            ash_window::create_surface(&self.entry, instance, target.display, target.window, None)
        }
        .map_err(|e| RenderError::Surface(format!("create_surface: {e}")))?;
        Ok(surface)
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loader) = &self.surface_loader {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&mut self) -> RenderResult<Vec<vk::PhysicalDevice>> {
        Ok(unsafe { self.instance_ref()?.enumerate_physical_devices()? })
    }

    fn physical_device_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceProperties> {
        Ok(unsafe { self.instance_ref()?.get_physical_device_properties(pd) })
    }

    fn physical_device_features(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceFeatures> {
        Ok(unsafe { self.instance_ref()?.get_physical_device_features(pd) })
    }

    fn memory_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<vk::PhysicalDeviceMemoryProperties> {
        Ok(unsafe { self.instance_ref()?.get_physical_device_memory_properties(pd) })
    }

    fn queue_family_properties(
        &mut self,
        pd: vk::PhysicalDevice,
    ) -> RenderResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe {
            self.instance_ref()?
                .get_physical_device_queue_family_properties(pd)
        })
    }

    fn device_extensions(&mut self, pd: vk::PhysicalDevice) -> RenderResult<Vec<String>> {
        let props = unsafe { self.instance_ref()?.enumerate_device_extension_properties(pd)? };
        Ok(props.iter().map(|e| name_of(&e.extension_name)).collect())
    }

    fn surface_support(
        &mut self,
        pd: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<bool> {
        Ok(unsafe {
            self.surface_ref()?
                .get_physical_device_surface_support(pd, family, surface)?
        })
    }

    fn surface_capabilities(
        &mut self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe {
            self.surface_ref()?
                .get_physical_device_surface_capabilities(pd, surface)?
        })
    }

    fn surface_formats(
        &mut self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe {
            self.surface_ref()?
                .get_physical_device_surface_formats(pd, surface)?
        })
    }

    fn surface_present_modes(
        &mut self,
        pd: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Vec<vk::PresentModeKHR>> {
        Ok(unsafe {
            self.surface_ref()?
                .get_physical_device_surface_present_modes(pd, surface)?
        })
    }

    fn create_device(&mut self, desc: &DeviceDesc) -> RenderResult<()> {
        let instance = self.instance_ref()?;

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = desc
            .queue_families
            .iter()
            .map(|&family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let extensions = c_strings(&desc.extensions)?;
        let ext_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let features = desc.features.to_vk();

        let create_info = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };

        let device = unsafe { instance.create_device(desc.physical_device, &create_info, None)? };
        let loader = swapchain::Device::new(instance, &device);
        self.swapchain_loader = Some(loader);
        self.device = Some(device);
        Ok(())
    }

    fn destroy_device(&mut self) {
        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn device_queue(&mut self, family: u32, index: u32) -> RenderResult<vk::Queue> {
        Ok(unsafe { self.device_ref()?.get_device_queue(family, index) })
    }

    fn device_wait_idle(&mut self) -> RenderResult<()> {
        Ok(unsafe { self.device_ref()?.device_wait_idle()? })
    }

    fn create_semaphore(&mut self) -> RenderResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_semaphore(&info, None)? })
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_semaphore(semaphore, None) };
        }
    }

    fn create_fence(&mut self, signaled: bool) -> RenderResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_fence(&info, None)? })
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_fence(fence, None) };
        }
    }

    fn wait_for_fences(&mut self, fences: &[vk::Fence], timeout: Duration) -> RenderResult<()> {
        let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        Ok(unsafe { self.device_ref()?.wait_for_fences(fences, true, nanos)? })
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> RenderResult<()> {
        Ok(unsafe { self.device_ref()?.reset_fences(&[fence])? })
    }

    fn create_timestamp_pool(&mut self, count: u32) -> RenderResult<vk::QueryPool> {
        let info = vk::QueryPoolCreateInfo {
            s_type: vk::StructureType::QUERY_POOL_CREATE_INFO,
            query_type: vk::QueryType::TIMESTAMP,
            query_count: count,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_query_pool(&info, None)? })
    }

    fn destroy_query_pool(&mut self, pool: vk::QueryPool) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_query_pool(pool, None) };
        }
    }

    fn timestamp_results(
        &mut self,
        pool: vk::QueryPool,
        count: u32,
    ) -> RenderResult<Option<Vec<u64>>> {
        let mut ticks = vec![0u64; count as usize];
        let result = unsafe {
            self.device_ref()?
                .get_query_pool_results(pool, 0, &mut ticks, vk::QueryResultFlags::TYPE_64)
        };
        match result {
            Ok(()) => Ok(Some(ticks)),
            Err(vk::Result::NOT_READY) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create_command_pool(&mut self, family: u32) -> RenderResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: family,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_command_pool(&info, None)? })
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RenderResult<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.allocate_command_buffers(&info)? })
    }

    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if let Some(d) = &self.device {
            unsafe { d.free_command_buffers(pool, buffers) };
        }
    }

    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        Ok(unsafe {
            self.device_ref()?
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?
        })
    }

    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.begin_command_buffer(cmd, &begin)? })
    }

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        Ok(unsafe { self.device_ref()?.end_command_buffer(cmd)? })
    }

    fn cmd_reset_query_pool(&mut self, cmd: vk::CommandBuffer, pool: vk::QueryPool, count: u32) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_reset_query_pool(cmd, pool, 0, count) };
        }
    }

    fn cmd_write_timestamp(
        &mut self,
        cmd: vk::CommandBuffer,
        stage: vk::PipelineStageFlags,
        pool: vk::QueryPool,
        query: u32,
    ) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_write_timestamp(cmd, stage, pool, query) };
        }
    }

    fn cmd_begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        let Some(d) = &self.device else { return };
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: begin.clear_color,
            },
        }];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: begin.render_pass,
            framebuffer: begin.framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: begin.extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe { d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE) };
    }

    fn cmd_end_render_pass(&mut self, cmd: vk::CommandBuffer) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_end_render_pass(cmd) };
        }
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> RenderResult<vk::SwapchainKHR> {
        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: desc.surface,
            min_image_count: desc.min_image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: desc.image_usage,
            image_sharing_mode: desc.sharing_mode,
            queue_family_index_count: desc.queue_family_indices.len() as u32,
            p_queue_family_indices: desc.queue_family_indices.as_ptr(),
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            old_swapchain: desc.old_swapchain,
            ..Default::default()
        };
        Ok(unsafe { self.swapchain_ref()?.create_swapchain(&info, None)? })
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        if let Some(loader) = &self.swapchain_loader {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>> {
        Ok(unsafe { self.swapchain_ref()?.get_swapchain_images(swapchain)? })
    }

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> RenderResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_image_view(&info, None)? })
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_image_view(view, None) };
        }
    }

    /// Single color attachment, cleared on load and left in `PRESENT_SRC_KHR`.
    fn create_render_pass(&mut self, format: vk::Format) -> RenderResult<vk::RenderPass> {
        let color = vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        // The layout transition must wait for the acquire semaphore.
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_render_pass(&info, None)? })
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        let info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        Ok(unsafe { self.device_ref()?.create_framebuffer(&info, None)? })
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let loader = self
            .swapchain_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        unsafe { loader.acquire_next_image(swapchain, u64::MAX, semaphore, vk::Fence::null()) }
    }

    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        let device = self
            .device
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &submit.wait_semaphore,
            p_wait_dst_stage_mask: &submit.wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &submit.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &submit.signal_semaphore,
            ..Default::default()
        };
        unsafe { device.queue_submit(queue, std::slice::from_ref(&info), submit.fence) }
    }

    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        let loader = self
            .swapchain_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &present.wait_semaphore,
            swapchain_count: 1,
            p_swapchains: &present.swapchain,
            p_image_indices: &present.image_index,
            ..Default::default()
        };
        unsafe { loader.queue_present(queue, &info) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_stop_at_nul() {
        let mut raw = [0 as c_char; 16];
        for (dst, b) in raw.iter_mut().zip(b"VK_KHR_swapchain".iter().take(15)) {
            *dst = *b as c_char;
        }
        assert_eq!(name_of(&raw), "VK_KHR_swapchai");
    }

    #[test]
    fn test_c_strings_reject_interior_nul() {
        let ok = c_strings(&["VK_KHR_swapchain".to_string()]).expect("valid");
        assert_eq!(ok[0].as_bytes(), b"VK_KHR_swapchain");
        assert!(matches!(
            c_strings(&["bad\0name".to_string()]),
            Err(RenderError::Config(_))
        ));
    }

    #[test]
    fn test_uninitialized_backend_reports_missing_device() {
        let mut backend = AshBackend::new();
        assert!(matches!(
            backend.create_semaphore(),
            Err(RenderError::NotInitialized("device"))
        ));
        assert_eq!(
            backend.acquire_next_image(vk::SwapchainKHR::null(), vk::Semaphore::null()),
            Err(vk::Result::ERROR_INITIALIZATION_FAILED)
        );
    }
}
