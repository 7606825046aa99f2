// SPDX-License-Identifier: CEPL-1.0
//! Scoped unwinding for context construction.
//!
//! Vulkan has no automatic cleanup, so every object made during init is
//! recorded here as it is created. If init bails out, dropping the guard
//! destroys them in reverse creation order. On success the caller disarms it
//! and takes ownership of everything.

use ash::vk;
use tracing::debug;

use crate::backend::GpuBackend;
use crate::swapchain::SwapchainState;

#[derive(Debug)]
pub(crate) enum Created {
    Instance,
    DebugMessenger,
    Surface(vk::SurfaceKHR),
    Device,
    Semaphore(vk::Semaphore),
    QueryPool(vk::QueryPool),
    CommandPool(vk::CommandPool),
    CommandBuffers(vk::CommandPool, Vec<vk::CommandBuffer>),
    Fence(vk::Fence),
    Swapchain(SwapchainState),
    RenderPass(vk::RenderPass),
    Framebuffer(vk::Framebuffer),
}

impl Created {
    fn destroy<B: GpuBackend>(self, backend: &mut B) {
        match self {
            Created::Instance => backend.destroy_instance(),
            Created::DebugMessenger => backend.destroy_debug_messenger(),
            Created::Surface(s) => backend.destroy_surface(s),
            Created::Device => backend.destroy_device(),
            Created::Semaphore(s) => backend.destroy_semaphore(s),
            Created::QueryPool(q) => backend.destroy_query_pool(q),
            Created::CommandPool(p) => backend.destroy_command_pool(p),
            Created::CommandBuffers(p, bufs) => backend.free_command_buffers(p, &bufs),
            Created::Fence(f) => backend.destroy_fence(f),
            Created::Swapchain(sc) => sc.destroy(backend),
            Created::RenderPass(rp) => backend.destroy_render_pass(rp),
            Created::Framebuffer(fb) => backend.destroy_framebuffer(fb),
        }
    }
}

pub(crate) struct InitGuard<'a, B: GpuBackend> {
    backend: &'a mut B,
    created: Vec<Created>,
}

impl<'a, B: GpuBackend> InitGuard<'a, B> {
    pub(crate) fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            created: Vec::new(),
        }
    }

    pub(crate) fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    pub(crate) fn push(&mut self, obj: Created) {
        self.created.push(obj);
    }

    /// Hands ownership of everything created to the caller.
    pub(crate) fn disarm(mut self) {
        self.created.clear();
    }
}

impl<B: GpuBackend> Drop for InitGuard<'_, B> {
    fn drop(&mut self) {
        if self.created.is_empty() {
            return;
        }
        debug!("init failed, unwinding {} objects", self.created.len());
        while let Some(obj) = self.created.pop() {
            obj.destroy(&mut *self.backend);
        }
    }
}
