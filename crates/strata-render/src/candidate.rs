// SPDX-License-Identifier: CEPL-1.0
//! Physical device capability snapshots.
//!
//! A [`DeviceCandidate`] is everything the selector needs to know about one
//! GPU, queried once against one surface. It owns no GPU objects beyond the
//! physical device handle and is never patched in place: if the surface
//! changes, candidates are queried again from scratch.

use std::collections::BTreeSet;
use std::ffi::CStr;

use ash::vk;
use bitflags::bitflags;
use tracing::debug;

use crate::backend::GpuBackend;
use crate::error::RenderResult;

bitflags! {
    /// The subset of `VkPhysicalDeviceFeatures` the renderer cares about.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DeviceFeatures: u32 {
        const TEXTURE_COMPRESSION_BC = 1 << 0;
        const IMAGE_CUBE_ARRAY = 1 << 1;
        const DEPTH_CLAMP = 1 << 2;
        const DEPTH_BIAS_CLAMP = 1 << 3;
        const FILL_MODE_NON_SOLID = 1 << 4;
        const DEPTH_BOUNDS = 1 << 5;
    }
}

impl DeviceFeatures {
    /// Features the logical device is always created with.
    pub const REQUIRED: Self = Self::TEXTURE_COMPRESSION_BC
        .union(Self::IMAGE_CUBE_ARRAY)
        .union(Self::DEPTH_CLAMP)
        .union(Self::DEPTH_BIAS_CLAMP)
        .union(Self::FILL_MODE_NON_SOLID);

    /// Enabled only when the device reports them.
    pub const OPTIONAL: Self = Self::DEPTH_BOUNDS;

    pub fn from_vk(f: &vk::PhysicalDeviceFeatures) -> Self {
        let mut out = Self::empty();
        out.set(Self::TEXTURE_COMPRESSION_BC, f.texture_compression_bc == vk::TRUE);
        out.set(Self::IMAGE_CUBE_ARRAY, f.image_cube_array == vk::TRUE);
        out.set(Self::DEPTH_CLAMP, f.depth_clamp == vk::TRUE);
        out.set(Self::DEPTH_BIAS_CLAMP, f.depth_bias_clamp == vk::TRUE);
        out.set(Self::FILL_MODE_NON_SOLID, f.fill_mode_non_solid == vk::TRUE);
        out.set(Self::DEPTH_BOUNDS, f.depth_bounds == vk::TRUE);
        out
    }

    pub fn to_vk(self) -> vk::PhysicalDeviceFeatures {
        let b = |flag: Self| if self.contains(flag) { vk::TRUE } else { vk::FALSE };
        vk::PhysicalDeviceFeatures {
            texture_compression_bc: b(Self::TEXTURE_COMPRESSION_BC),
            image_cube_array: b(Self::IMAGE_CUBE_ARRAY),
            depth_clamp: b(Self::DEPTH_CLAMP),
            depth_bias_clamp: b(Self::DEPTH_BIAS_CLAMP),
            fill_mode_non_solid: b(Self::FILL_MODE_NON_SOLID),
            depth_bounds: b(Self::DEPTH_BOUNDS),
            ..Default::default()
        }
    }

    /// Comma separated flag names, for logs and errors.
    pub fn describe(self) -> String {
        self.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamily {
    pub index: u32,
    pub queue_count: u32,
    pub supports_graphics: bool,
    /// Present support against the candidate's surface.
    pub supports_present: bool,
    /// 0 means the family cannot write timestamps.
    pub timestamp_valid_bits: u32,
}

#[derive(Clone, Debug)]
pub struct DeviceCandidate {
    pub physical_device: vk::PhysicalDevice,
    /// Surface the per-family present support and surface lists refer to.
    pub surface: vk::SurfaceKHR,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub queue_families: Vec<QueueFamily>,
    pub extensions: BTreeSet<String>,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub features: DeviceFeatures,
    pub device_local_bytes: u64,
    pub host_visible_bytes: u64,
    /// Nanoseconds per timestamp tick.
    pub timestamp_period: f32,
}

impl DeviceCandidate {
    /// Queries one physical device against `surface`.
    pub fn query<B: GpuBackend>(
        backend: &mut B,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Self> {
        let props = backend.physical_device_properties(physical_device)?;
        // SAFETY: the driver null-terminates device_name.
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let mut queue_families = Vec::new();
        for (i, q) in backend
            .queue_family_properties(physical_device)?
            .iter()
            .enumerate()
        {
            let index = i as u32;
            queue_families.push(QueueFamily {
                index,
                queue_count: q.queue_count,
                supports_graphics: q.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                supports_present: backend
                    .surface_support(physical_device, index, surface)
                    .unwrap_or_else(|e| {
                        debug!("{name:?}: present support query for family {index} failed: {e}");
                        false
                    }),
                timestamp_valid_bits: q.timestamp_valid_bits,
            });
        }

        let extensions = backend
            .device_extensions(physical_device)?
            .into_iter()
            .collect();
        let features = DeviceFeatures::from_vk(&backend.physical_device_features(physical_device)?);
        let memory = backend.memory_properties(physical_device)?;

        // A surface query failing on one device leaves it with empty lists,
        // which the selector rejects; the next device still gets a chance.
        let surface_formats = backend
            .surface_formats(physical_device, surface)
            .unwrap_or_else(|e| {
                debug!("{name:?}: surface format query failed: {e}");
                Vec::new()
            });
        let present_modes = backend
            .surface_present_modes(physical_device, surface)
            .unwrap_or_else(|e| {
                debug!("{name:?}: present mode query failed: {e}");
                Vec::new()
            });
        let capabilities = backend
            .surface_capabilities(physical_device, surface)
            .unwrap_or_else(|e| {
                debug!("{name:?}: surface capabilities query failed: {e}");
                vk::SurfaceCapabilitiesKHR::default()
            });

        let candidate = DeviceCandidate {
            physical_device,
            surface,
            name,
            device_type: props.device_type,
            queue_families,
            extensions,
            surface_formats,
            present_modes,
            capabilities,
            features,
            device_local_bytes: device_local_bytes(&memory),
            host_visible_bytes: host_visible_bytes(&memory),
            timestamp_period: props.limits.timestamp_period,
        };
        debug!(
            "candidate {:?} ({}): {} queue families, {} extensions, features [{}]",
            candidate.name,
            candidate.device_type_name(),
            candidate.queue_families.len(),
            candidate.extensions.len(),
            candidate.features.describe()
        );
        Ok(candidate)
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        name.to_str()
            .map(|n| self.extensions.contains(n))
            .unwrap_or(false)
    }

    pub fn has_surface_support(&self) -> bool {
        !self.surface_formats.is_empty() && !self.present_modes.is_empty()
    }

    /// First family (in index order) with queues and graphics capability.
    pub fn graphics_family(&self) -> Option<u32> {
        self.queue_families
            .iter()
            .find(|q| q.queue_count > 0 && q.supports_graphics)
            .map(|q| q.index)
    }

    /// First family (in index order) with queues that can present.
    pub fn present_family(&self) -> Option<u32> {
        self.queue_families
            .iter()
            .find(|q| q.queue_count > 0 && q.supports_present)
            .map(|q| q.index)
    }

    pub fn family(&self, index: u32) -> Option<&QueueFamily> {
        self.queue_families.iter().find(|q| q.index == index)
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "discrete",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual",
            vk::PhysicalDeviceType::CPU => "cpu",
            _ => "other",
        }
    }
}

fn device_local_bytes(mem: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    mem.memory_heaps
        .iter()
        .take(mem.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

fn host_visible_bytes(mem: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    let mut heaps = BTreeSet::new();
    for ty in mem.memory_types.iter().take(mem.memory_type_count as usize) {
        if ty
            .property_flags
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            heaps.insert(ty.heap_index as usize);
        }
    }
    heaps
        .into_iter()
        .filter(|&i| i < mem.memory_heap_count as usize)
        .map(|i| mem.memory_heaps[i].size)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockDevice};

    #[test]
    fn test_features_round_trip_through_vk() {
        let mut raw = vk::PhysicalDeviceFeatures::default();
        raw.depth_clamp = vk::TRUE;
        raw.fill_mode_non_solid = vk::TRUE;

        let f = DeviceFeatures::from_vk(&raw);
        assert_eq!(f, DeviceFeatures::DEPTH_CLAMP | DeviceFeatures::FILL_MODE_NON_SOLID);

        let back = f.to_vk();
        assert_eq!(back.depth_clamp, vk::TRUE);
        assert_eq!(back.depth_bounds, vk::FALSE);
    }

    #[test]
    fn test_required_excludes_depth_bounds() {
        assert!(!DeviceFeatures::REQUIRED.contains(DeviceFeatures::DEPTH_BOUNDS));
        assert!(DeviceFeatures::REQUIRED.contains(DeviceFeatures::IMAGE_CUBE_ARRAY));
        assert_eq!(
            (DeviceFeatures::REQUIRED - DeviceFeatures::DEPTH_CLAMP).bits().count_ones(),
            4
        );
    }

    #[test]
    fn test_heap_totals() {
        let mut mem = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 2,
            memory_type_count: 2,
            ..Default::default()
        };
        mem.memory_heaps[0] = vk::MemoryHeap {
            size: 8u64 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        mem.memory_heaps[1] = vk::MemoryHeap {
            size: 16u64 << 30,
            flags: vk::MemoryHeapFlags::empty(),
        };
        mem.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        mem.memory_types[1] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 1,
        };

        assert_eq!(device_local_bytes(&mem), 8u64 << 30);
        assert_eq!(host_visible_bytes(&mem), 16u64 << 30);
    }

    #[test]
    fn test_failed_surface_queries_leave_candidate_ineligible() {
        let mut dev = MockDevice::eligible("lost");
        dev.surface_error = Some(vk::Result::ERROR_SURFACE_LOST_KHR);
        let mut mock = MockBackend::with_devices(vec![dev]);
        let pd = mock.enumerate_physical_devices().unwrap()[0];

        let candidate = DeviceCandidate::query(&mut mock, pd, vk::SurfaceKHR::null()).unwrap();
        assert_eq!(candidate.name, "lost");
        assert!(!candidate.has_surface_support());
        assert_eq!(candidate.graphics_family(), Some(0));
        assert_eq!(candidate.present_family(), None);
    }
}
