// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Shared runtime pieces: tracing setup and the fixed-timestep clock.

pub mod timing;

pub use timing::FixedTimestep;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Targets are kept so driver messages (target `vulkan`) can be filtered
/// separately, e.g. `RUST_LOG=info,vulkan=warn`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt().with_env_filter(filter).compact().try_init();
}
