// SPDX-License-Identifier: CEPL-1.0
//! Render core: device bring-up, swapchain management and the frame loop.
//!
//! The core is written against [`GpuBackend`] so it can be driven by the
//! Vulkan backend in `strata-render-vk` or, under test, by
//! [`mock::MockBackend`].

pub mod backend;
pub mod candidate;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
mod guard;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod selector;
pub mod surface;
pub mod swapchain;

pub use backend::{GpuBackend, SurfaceTarget};
pub use candidate::{DeviceCandidate, DeviceFeatures, QueueFamily};
pub use config::RenderConfig;
pub use context::RenderContext;
pub use error::{RenderError, RenderResult};
pub use frame::{FrameContext, FramePhase, FrameStatus};
pub use selector::{select_device, SelectedDevice};
pub use swapchain::SwapchainState;

/// Client-area size of the render target, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero-area surface; nothing can be built for it.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
