// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection.
//!
//! Candidates are checked in enumeration order and the first one that
//! passes every requirement wins. There is no scoring: a discrete GPU listed
//! after an eligible integrated one is not preferred.

use ash::vk;
use tracing::{debug, info};

use crate::candidate::DeviceCandidate;
use crate::error::{RenderError, RenderResult};

/// The chosen device and the queue families the context will use.
///
/// Both indices refer to families with at least one queue. They are equal
/// when one family does graphics and present.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub candidate: DeviceCandidate,
    pub graphics_family: u32,
    pub present_family: u32,
}

impl SelectedDevice {
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.candidate.physical_device
    }

    pub fn shares_queue_family(&self) -> bool {
        self.graphics_family == self.present_family
    }

    /// Distinct families in creation order (graphics first).
    pub fn unique_families(&self) -> Vec<u32> {
        if self.shares_queue_family() {
            vec![self.graphics_family]
        } else {
            vec![self.graphics_family, self.present_family]
        }
    }
}

/// Why a candidate was passed over. Only used for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    StaleSurface,
    NoSwapchainExtension,
    NoSurfaceFormats,
    NoGraphicsQueue,
    NoPresentQueue,
}

/// Checks one candidate; `Ok` carries `(graphics_family, present_family)`.
pub fn evaluate(
    candidate: &DeviceCandidate,
    surface: vk::SurfaceKHR,
) -> Result<(u32, u32), Rejection> {
    if candidate.surface != surface {
        return Err(Rejection::StaleSurface);
    }
    if !candidate.supports_extension(ash::khr::swapchain::NAME) {
        return Err(Rejection::NoSwapchainExtension);
    }
    if !candidate.has_surface_support() {
        return Err(Rejection::NoSurfaceFormats);
    }
    let graphics = candidate
        .graphics_family()
        .ok_or(Rejection::NoGraphicsQueue)?;
    let present = candidate
        .present_family()
        .ok_or(Rejection::NoPresentQueue)?;
    Ok((graphics, present))
}

pub fn select_device(
    candidates: &[DeviceCandidate],
    surface: vk::SurfaceKHR,
) -> RenderResult<SelectedDevice> {
    for candidate in candidates {
        match evaluate(candidate, surface) {
            Ok((graphics_family, present_family)) => {
                info!(
                    "selected {:?} ({}), graphics family {}, present family {}",
                    candidate.name,
                    candidate.device_type_name(),
                    graphics_family,
                    present_family
                );
                return Ok(SelectedDevice {
                    candidate: candidate.clone(),
                    graphics_family,
                    present_family,
                });
            }
            Err(reason) => debug!("skipping {:?}: {:?}", candidate.name, reason),
        }
    }
    Err(RenderError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{DeviceFeatures, QueueFamily};
    use ash::vk::Handle;

    fn surface() -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x51)
    }

    fn family(index: u32, graphics: bool, present: bool) -> QueueFamily {
        QueueFamily {
            index,
            queue_count: 1,
            supports_graphics: graphics,
            supports_present: present,
            timestamp_valid_bits: 64,
        }
    }

    fn candidate(raw: u64, families: Vec<QueueFamily>) -> DeviceCandidate {
        DeviceCandidate {
            physical_device: vk::PhysicalDevice::from_raw(raw),
            surface: surface(),
            name: format!("gpu-{raw}"),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families: families,
            extensions: ["VK_KHR_swapchain".to_string()].into_iter().collect(),
            surface_formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            features: DeviceFeatures::all(),
            device_local_bytes: 0,
            host_visible_bytes: 0,
            timestamp_period: 1.0,
        }
    }

    #[test]
    fn test_shared_family_selected() {
        let list = [candidate(1, vec![family(0, true, true)])];
        let sel = select_device(&list, surface()).unwrap();
        assert_eq!((sel.graphics_family, sel.present_family), (0, 0));
        assert!(sel.shares_queue_family());
        assert_eq!(sel.unique_families(), vec![0]);
    }

    #[test]
    fn test_split_families_take_first_of_each() {
        let list = [candidate(
            1,
            vec![
                family(0, false, false),
                family(1, true, false),
                family(2, true, true),
                family(3, false, true),
            ],
        )];
        let sel = select_device(&list, surface()).unwrap();
        assert_eq!((sel.graphics_family, sel.present_family), (1, 2));
        assert_eq!(sel.unique_families(), vec![1, 2]);
    }

    #[test]
    fn test_empty_families_are_ignored() {
        let mut empty = family(0, true, true);
        empty.queue_count = 0;
        let list = [candidate(1, vec![empty, family(1, true, true)])];
        let sel = select_device(&list, surface()).unwrap();
        assert_eq!(sel.graphics_family, 1);
    }

    #[test]
    fn test_first_eligible_wins_without_ranking() {
        let mut integrated = candidate(1, vec![family(0, true, true)]);
        integrated.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        let discrete = candidate(2, vec![family(0, true, true)]);

        let sel = select_device(&[integrated, discrete], surface()).unwrap();
        assert_eq!(sel.physical_device(), vk::PhysicalDevice::from_raw(1));
    }

    #[test]
    fn test_rejections() {
        let mut no_ext = candidate(1, vec![family(0, true, true)]);
        no_ext.extensions.clear();
        assert_eq!(evaluate(&no_ext, surface()), Err(Rejection::NoSwapchainExtension));

        let mut no_modes = candidate(2, vec![family(0, true, true)]);
        no_modes.present_modes.clear();
        assert_eq!(evaluate(&no_modes, surface()), Err(Rejection::NoSurfaceFormats));

        let mut no_formats = candidate(3, vec![family(0, true, true)]);
        no_formats.surface_formats.clear();
        assert_eq!(evaluate(&no_formats, surface()), Err(Rejection::NoSurfaceFormats));

        let compute_only = candidate(4, vec![family(0, false, true)]);
        assert_eq!(evaluate(&compute_only, surface()), Err(Rejection::NoGraphicsQueue));

        let headless = candidate(5, vec![family(0, true, false)]);
        assert_eq!(evaluate(&headless, surface()), Err(Rejection::NoPresentQueue));

        let stale = candidate(6, vec![family(0, true, true)]);
        assert_eq!(
            evaluate(&stale, vk::SurfaceKHR::from_raw(0x99)),
            Err(Rejection::StaleSurface)
        );

        let all = [no_ext, no_modes, no_formats, compute_only, headless];
        assert!(matches!(
            select_device(&all, surface()),
            Err(RenderError::NoSuitableDevice)
        ));
    }

    #[test]
    fn test_skips_ineligible_then_accepts() {
        let mut no_ext = candidate(1, vec![family(0, true, true)]);
        no_ext.extensions.clear();
        let good = candidate(2, vec![family(0, true, false), family(1, false, true)]);

        let sel = select_device(&[no_ext, good], surface()).unwrap();
        assert_eq!(sel.physical_device(), vk::PhysicalDevice::from_raw(2));
        assert_eq!((sel.graphics_family, sel.present_family), (0, 1));
    }
}
