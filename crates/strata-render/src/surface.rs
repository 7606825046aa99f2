// SPDX-License-Identifier: CEPL-1.0
//! Surface format, present mode, extent and image count policy.

use ash::vk;

use crate::RenderSize;

/// Used when the surface has no preference (a lone `UNDEFINED` entry) and
/// searched for first otherwise.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    match formats {
        [] => PREFERRED_SURFACE_FORMAT,
        [only] if only.format == vk::Format::UNDEFINED => PREFERRED_SURFACE_FORMAT,
        _ => formats
            .iter()
            .copied()
            .find(|f| {
                f.format == PREFERRED_SURFACE_FORMAT.format
                    && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
            })
            .unwrap_or(formats[0]),
    }
}

/// MAILBOX, then IMMEDIATE, then FIFO (which every surface supports).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// `u32::MAX` in `current_extent` means the window size is ours to pick.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Requested image count, clamped into what the surface allows
/// (`max_image_count == 0` means no upper bound).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, buffering_depth: u32) -> u32 {
    let wanted = buffering_depth.max(caps.min_image_count);
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

pub fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::A2B10G10R10_UNORM_PACK32 => "A2B10G10R10_UNORM",
        vk::Format::R16G16B16A16_SFLOAT => "R16G16B16A16_SFLOAT",
        _ => "OTHER",
    }
}

pub fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn free_size_caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        }
    }

    fn same(a: vk::SurfaceFormatKHR, b: vk::SurfaceFormatKHR) -> bool {
        a.format == b.format && a.color_space == b.color_space
    }

    #[test]
    fn test_undefined_sentinel_uses_preferred_format() {
        let formats = [fmt(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        assert!(same(choose_surface_format(&formats), PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn test_exact_preferred_match_wins() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert!(same(choose_surface_format(&formats), formats[2]));
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let formats = [
            fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert!(same(choose_surface_format(&formats), formats[0]));
    }

    #[test]
    fn test_format_choice_is_idempotent() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let first = choose_surface_format(&formats);
        assert!(same(first, choose_surface_format(&formats)));
        assert_eq!(first.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn test_present_mode_priority() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&[P::FIFO, P::IMMEDIATE, P::MAILBOX]), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::FIFO, P::IMMEDIATE]), P::IMMEDIATE);
        assert_eq!(choose_present_mode(&[P::FIFO_RELAXED, P::FIFO]), P::FIFO);
        assert_eq!(choose_present_mode(&[]), P::FIFO);
    }

    #[test]
    fn test_extent_clamps_when_free_sized() {
        let caps = free_size_caps();
        let e = choose_extent(&caps, RenderSize::new(100, 100));
        assert_eq!((e.width, e.height), (100, 100));
        let e = choose_extent(&caps, RenderSize::new(1, 1));
        assert_eq!((e.width, e.height), (64, 64));
        let e = choose_extent(&caps, RenderSize::new(8192, 8192));
        assert_eq!((e.width, e.height), (4096, 4096));
    }

    #[test]
    fn test_extent_pinned_by_platform() {
        let mut caps = free_size_caps();
        caps.current_extent = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        let e = choose_extent(&caps, RenderSize::new(800, 600));
        assert_eq!((e.width, e.height), (1920, 1080));
    }

    #[test]
    fn test_image_count_clamped() {
        let mut caps = free_size_caps();
        assert_eq!(choose_image_count(&caps, 3), 3);
        assert_eq!(choose_image_count(&caps, 1), 2);
        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps, 3), 2);
        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps, 16), 16);
    }
}
