// SPDX-License-Identifier: CEPL-1.0
//! Error types for the render core.

use ash::vk;
use thiserror::Error;

use crate::frame::FramePhase;

#[derive(Error, Debug)]
pub enum RenderError {
    /// A Vulkan call returned a status the core does not recover from.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("no physical device offers graphics + present queues, swapchain support and surface formats")]
    NoSuitableDevice,

    #[error("validation layer {0} was requested but is not installed")]
    MissingValidationLayer(String),

    #[error("selected device lacks required feature(s): {0}")]
    MissingFeature(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("frame call out of order: expected {expected:?}, context is {found:?}")]
    InvalidPhase {
        expected: FramePhase,
        found: FramePhase,
    },

    #[error("{0} has not been created")]
    NotInitialized(&'static str),

    #[error("config error: {0}")]
    Config(String),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
