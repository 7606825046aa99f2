// SPDX-License-Identifier: CEPL-1.0
//! Window-side glue. winit is used as-is and re-exported so the app has a
//! single place it comes from.

pub use winit;

use anyhow::{Context, Result};
use strata_render::{RenderSize, SurfaceTarget};
use tracing::debug;
use winit::dpi::PhysicalSize;
use winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::{Fullscreen, Window, WindowAttributes};

/// Raw handles and current client size of `window`, for surface creation.
pub fn surface_target(window: &Window) -> Result<SurfaceTarget> {
    let display = window
        .display_handle()
        .context("display_handle")?
        .as_raw();
    let handle = window.window_handle().context("window_handle")?.as_raw();
    let size = render_size(window.inner_size());
    debug!("surface target {}x{}", size.width, size.height);
    Ok(SurfaceTarget {
        display,
        window: handle,
        size,
    })
}

pub fn render_size(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize::new(size.width, size.height)
}

/// Borderless fullscreen on the current monitor when `fullscreen` is set.
pub fn window_attributes(title: &str, width: u32, height: u32, fullscreen: bool) -> WindowAttributes {
    let attrs = Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)));
    if fullscreen {
        attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
    } else {
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_size_from_physical() {
        let size = render_size(PhysicalSize::new(1280, 0));
        assert_eq!(size, RenderSize::new(1280, 0));
        assert!(size.is_empty());
    }

    #[test]
    fn test_window_attributes() {
        let windowed = window_attributes("strata", 800, 600, false);
        assert_eq!(windowed.title, "strata");
        assert!(windowed.fullscreen.is_none());
        assert!(windowed.inner_size.is_some());

        let full = window_attributes("strata", 0, 0, true);
        assert!(matches!(full.fullscreen, Some(Fullscreen::Borderless(None))));
    }
}
