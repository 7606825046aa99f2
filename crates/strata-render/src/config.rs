// SPDX-License-Identifier: CEPL-1.0
//! Render core configuration.
//!
//! Everything arrives through [`RenderConfig`]; the core never reads the
//! environment or files itself. The application layer deserializes it from
//! TOML and applies command-line overrides on top.

use serde::Deserialize;

use crate::error::{RenderError, RenderResult};

/// Triple buffering.
pub const DEFAULT_BUFFERING_DEPTH: u32 = 3;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub fullscreen: bool,
    /// Enables `VK_LAYER_KHRONOS_validation`; init fails if it is missing.
    pub validation: bool,
    /// Number of frame slots (frames the CPU may run ahead of the GPU).
    pub buffering_depth: u32,
    /// Byte budgets handed to the external allocators. The core only
    /// checks them against the device heaps and warns on overrun.
    pub device_local_budget: u64,
    pub host_visible_budget: u64,
    pub staging_budget: u64,
    pub fixed_timestep_hz: u32,
    /// Upper bound on fixed updates run in a single tick.
    pub max_catch_up_steps: u32,
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            fullscreen: false,
            validation: false,
            buffering_depth: DEFAULT_BUFFERING_DEPTH,
            device_local_budget: 256 * 1024 * 1024,
            host_visible_budget: 64 * 1024 * 1024,
            staging_budget: 32 * 1024 * 1024,
            fixed_timestep_hz: 60,
            max_catch_up_steps: 5,
            clear_color: [0.02, 0.02, 0.04, 1.0],
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> RenderResult<()> {
        if self.buffering_depth == 0 {
            return Err(RenderError::Config(
                "buffering_depth must be at least 1".into(),
            ));
        }
        if self.fixed_timestep_hz == 0 {
            return Err(RenderError::Config(
                "fixed_timestep_hz must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Sum of the host-side budgets (host-visible pool plus staging).
    pub fn host_budget_total(&self) -> u64 {
        self.host_visible_budget.saturating_add(self.staging_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_triple_buffered() {
        let cfg = RenderConfig::default();
        assert_eq!(cfg.buffering_depth, 3);
        assert!(!cfg.validation);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: RenderConfig = toml::from_str(
            r#"
            fullscreen = true
            validation = true
            staging_budget = 1024
            "#,
        )
        .unwrap();

        assert!(cfg.fullscreen);
        assert!(cfg.validation);
        assert_eq!(cfg.staging_budget, 1024);
        assert_eq!(cfg.buffering_depth, DEFAULT_BUFFERING_DEPTH);
        assert_eq!(cfg.host_budget_total(), 64 * 1024 * 1024 + 1024);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let cfg: RenderConfig = toml::from_str("buffering_depth = 0").unwrap();
        assert!(matches!(cfg.validate(), Err(RenderError::Config(_))));
    }
}
