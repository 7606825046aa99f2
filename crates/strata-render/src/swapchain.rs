// SPDX-License-Identifier: CEPL-1.0
//! Swapchain construction and teardown.

use ash::vk;
use tracing::{debug, info};

use crate::backend::{GpuBackend, SwapchainDesc};
use crate::error::RenderResult;
use crate::selector::SelectedDevice;
use crate::surface::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, format_name,
    present_mode_name,
};
use crate::RenderSize;

/// Swapchain images are also copied out of (cubemap capture passes).
pub const SWAPCHAIN_IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_SRC.as_raw(),
);

/// A live swapchain with one view per image.
///
/// `images.len() == views.len()` always; the count is what the platform
/// granted, which can exceed what was requested.
#[derive(Clone, Debug)]
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
}

impl SwapchainState {
    /// Queries the surface afresh and picks format, present mode, extent and
    /// image count for `requested`.
    ///
    /// `Ok(None)` when the surface currently has zero area (a minimized
    /// window on platforms that pin `current_extent`); nothing can be built
    /// until it grows again. The returned description has no
    /// `old_swapchain`; rebuilds fill it in.
    pub fn describe<B: GpuBackend>(
        backend: &mut B,
        device: &SelectedDevice,
        surface: vk::SurfaceKHR,
        requested: RenderSize,
        buffering_depth: u32,
    ) -> RenderResult<Option<SwapchainDesc>> {
        let pd = device.physical_device();
        // capabilities: image counts, transform, current extent (or u32::MAX)
        let caps = backend.surface_capabilities(pd, surface)?;
        let extent = choose_extent(&caps, requested);
        if extent.width == 0 || extent.height == 0 {
            debug!("surface extent is {}x{}", extent.width, extent.height);
            return Ok(None);
        }
        let formats = backend.surface_formats(pd, surface)?;
        let modes = backend.surface_present_modes(pd, surface)?;

        let (sharing_mode, queue_family_indices) = if device.shares_queue_family() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (
                vk::SharingMode::CONCURRENT,
                vec![device.graphics_family, device.present_family],
            )
        };

        Ok(Some(SwapchainDesc {
            surface,
            min_image_count: choose_image_count(&caps, buffering_depth),
            format: choose_surface_format(&formats),
            extent,
            present_mode: choose_present_mode(&modes),
            image_usage: SWAPCHAIN_IMAGE_USAGE,
            sharing_mode,
            queue_family_indices,
            pre_transform: caps.current_transform,
            old_swapchain: vk::SwapchainKHR::null(),
        }))
    }

    /// Creates the swapchain and one view per granted image.
    ///
    /// `desc.old_swapchain` is passed through and is not destroyed here.
    /// On failure nothing created by this call is left alive.
    pub fn create<B: GpuBackend>(backend: &mut B, desc: &SwapchainDesc) -> RenderResult<Self> {
        let handle = backend.create_swapchain(desc)?;

        let images = match backend.swapchain_images(handle) {
            Ok(images) => images,
            Err(e) => {
                backend.destroy_swapchain(handle);
                return Err(e);
            }
        };

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            match backend.create_image_view(image, desc.format.format) {
                Ok(view) => views.push(view),
                Err(e) => {
                    for view in views {
                        backend.destroy_image_view(view);
                    }
                    backend.destroy_swapchain(handle);
                    return Err(e);
                }
            }
        }

        info!(
            "swapchain: format {} / {:?}, present_mode {}, extent {}x{}, images (requested {} -> granted {})",
            format_name(desc.format.format),
            desc.format.color_space,
            present_mode_name(desc.present_mode),
            desc.extent.width,
            desc.extent.height,
            desc.min_image_count,
            images.len()
        );

        Ok(SwapchainState {
            handle,
            format: desc.format.format,
            color_space: desc.format.color_space,
            extent: desc.extent,
            present_mode: desc.present_mode,
            images,
            views,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Views first; images belong to the swapchain and go with it.
    pub fn destroy<B: GpuBackend>(self, backend: &mut B) {
        let handle = self.destroy_views(backend);
        backend.destroy_swapchain(handle);
        debug!("swapchain destroyed");
    }

    /// Used on rebuild, where the old handle must outlive the new
    /// swapchain's creation.
    pub fn destroy_views<B: GpuBackend>(self, backend: &mut B) -> vk::SwapchainKHR {
        for view in self.views {
            backend.destroy_image_view(view);
        }
        self.handle
    }
}
