// SPDX-License-Identifier: CEPL-1.0
//! Frame slots and the per-frame state machine vocabulary.
//!
//! ```text
//! Idle -> Acquiring -> Recording -> Submitted -> Presenting -> Idle
//!            |                                      |
//!            +------------> NeedsRebuild <----------+
//! any unexpected status -> Error
//! explicit teardown     -> Shutdown
//! ```
//!
//! A slot is reused every `buffering_depth` frames. Its fence is signaled by
//! the submission that last used it, and `start_frame` waits on it before the
//! command buffer is reset. That wait is the only thing stopping the CPU from
//! running more than `buffering_depth` frames ahead of the GPU.

use ash::prelude::VkResult;
use ash::vk;

/// Queries per slot: frame begin and frame end.
pub const TIMESTAMPS_PER_SLOT: u32 = 2;

/// Synchronization and recording objects for one buffering index.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlot {
    /// Signaled by the presentation engine when the acquired image is ready.
    pub acquire: vk::Semaphore,
    /// Signaled by the frame's submission, waited on by present.
    pub complete: vk::Semaphore,
    /// Created signaled so the first wait returns immediately.
    pub in_flight: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
    pub timestamps: vk::QueryPool,
    /// A submission wrote both timestamps and they have not been read back.
    pub timestamps_pending: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    NeedsRebuild,
    Error,
    Shutdown,
}

/// Outcome of `start_frame` / `end_frame`.
///
/// The third outcome, an unrecoverable error, is the `Err` arm of the
/// surrounding `RenderResult`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Success,
    /// Swapchain is out of date or suboptimal: rebuild and skip this frame.
    NeedsUpdate,
}

/// What a collaborator needs to record draws for the current frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    pub slot: usize,
    pub image_index: u32,
    pub command_buffer: vk::CommandBuffer,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub timestamps: vk::QueryPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    Image(u32),
    Stale,
}

/// ash reports suboptimal as `Ok((_, true))`. It counts as stale: the frame
/// is skipped and the swapchain rebuilt.
pub fn classify_acquire(result: VkResult<(u32, bool)>) -> VkResult<Acquired> {
    match result {
        Ok((index, false)) => Ok(Acquired::Image(index)),
        Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::Stale),
        Err(e) => Err(e),
    }
}

pub fn classify_present(result: VkResult<bool>) -> VkResult<FrameStatus> {
    match result {
        Ok(false) => Ok(FrameStatus::Success),
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::NeedsUpdate),
        Err(e) => Err(e),
    }
}

/// GPU time between the two timestamps of a slot.
pub fn gpu_frame_time(ticks: &[u64], timestamp_period: f32) -> Option<std::time::Duration> {
    match ticks {
        [begin, end, ..] if end >= begin => {
            let nanos = (end - begin) as f64 * f64::from(timestamp_period);
            Some(std::time::Duration::from_nanos(nanos as u64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_acquire_classification() {
        assert_eq!(classify_acquire(Ok((2, false))), Ok(Acquired::Image(2)));
        assert_eq!(classify_acquire(Ok((2, true))), Ok(Acquired::Stale));
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            Ok(Acquired::Stale)
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(vk::Result::ERROR_DEVICE_LOST)
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(vk::Result::ERROR_SURFACE_LOST_KHR)
        );
    }

    #[test]
    fn test_present_classification() {
        assert_eq!(classify_present(Ok(false)), Ok(FrameStatus::Success));
        assert_eq!(classify_present(Ok(true)), Ok(FrameStatus::NeedsUpdate));
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            Ok(FrameStatus::NeedsUpdate)
        );
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(vk::Result::ERROR_DEVICE_LOST)
        );
        // Suboptimal only ever arrives as Ok(true); any other status is an error.
        assert_eq!(
            classify_present(Err(vk::Result::SUBOPTIMAL_KHR)),
            Err(vk::Result::SUBOPTIMAL_KHR)
        );
    }

    #[test]
    fn test_gpu_frame_time() {
        assert_eq!(
            gpu_frame_time(&[1_000, 3_000], 0.5),
            Some(Duration::from_nanos(1_000))
        );
        assert_eq!(gpu_frame_time(&[5, 1], 1.0), None);
        assert_eq!(gpu_frame_time(&[5], 1.0), None);
    }
}
