// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the light capability used by light assignment, and the concrete lights.
//!
//! Lights are owned by the scene. The pipeline only asks three things of them:
//! where they reach ([`Light::bounding_volume`]), how much they matter to a given
//! renderable ([`Light::contribution_score`]) and what to upload ([`Light::gpu_data`]).

use crate::math::{Aabb, BoundingVolume, LinearRgba, Vec3};
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// The largest number of lights bound to a single draw.
pub const MAX_LIGHT_COUNT_PER_DRAW: usize = 4;

/// A scene light as seen by the forward pipeline.
pub trait Light: Send + Sync + Debug {
    /// The region of space this light affects.
    fn bounding_volume(&self) -> BoundingVolume;

    /// Importance of this light for a renderable with the given world bounds.
    ///
    /// Higher is more important. Only the relative order matters.
    fn contribution_score(&self, bounds: &Aabb) -> f32;

    /// The GPU representation of this light.
    fn gpu_data(&self) -> GpuLight;
}

/// GPU-side light data, 64 bytes, std140 compatible.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// Light position in world space (ignored for directional lights).
    pub position: [f32; 3],
    /// Maximum range of the light (point/spot lights only).
    pub range: f32,

    /// Light color (RGB, linear space).
    pub color: [f32; 3],
    /// Light intensity multiplier.
    pub intensity: f32,

    /// Light direction (normalized, for directional/spot lights).
    pub direction: [f32; 3],
    /// Light type: 0 = directional, 1 = point, 2 = spot.
    pub light_type: u32,

    /// Cosine of inner cone angle (spot lights only).
    pub inner_cone_cos: f32,
    /// Cosine of outer cone angle (spot lights only).
    pub outer_cone_cos: f32,
    /// Padding.
    pub _padding: [f32; 2],
}

impl GpuLight {
    /// Light type constant for directional lights.
    pub const TYPE_DIRECTIONAL: u32 = 0;
    /// Light type constant for point lights.
    pub const TYPE_POINT: u32 = 1;
    /// Light type constant for spot lights.
    pub const TYPE_SPOT: u32 = 2;
}

/// Byte layout of one per-draw light block in a light uniform buffer.
///
/// ```text
/// offset 0   u32 light count (+12 bytes padding)
/// offset 16  GpuLight[MAX_LIGHT_COUNT_PER_DRAW]
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LightBlockLayout;

impl LightBlockLayout {
    /// Offset of the light count.
    pub const LIGHT_COUNT_OFFSET: usize = 0;
    /// Offset of the first light.
    pub const LIGHTS_OFFSET: usize = 16;
    /// Stride between two lights.
    pub const LIGHT_SIZE: usize = std::mem::size_of::<GpuLight>();
    /// Unaligned size of a whole block.
    pub const TOTAL_SIZE: usize = Self::LIGHTS_OFFSET + Self::LIGHT_SIZE * MAX_LIGHT_COUNT_PER_DRAW;

    /// Size of a block once rounded up to the device's uniform offset alignment.
    #[inline]
    pub fn aligned_size(min_uniform_buffer_offset_alignment: u64) -> u64 {
        crate::math::align_up(Self::TOTAL_SIZE as u64, min_uniform_buffer_offset_alignment)
    }

    /// Writes a block for `lights` into `out`, which must hold at least `TOTAL_SIZE` bytes.
    ///
    /// Unused light slots are zeroed.
    pub fn write(out: &mut [u8], lights: &[GpuLight]) {
        debug_assert!(lights.len() <= MAX_LIGHT_COUNT_PER_DRAW);
        let out = &mut out[..Self::TOTAL_SIZE];
        out.fill(0);

        let count = lights.len() as u32;
        out[Self::LIGHT_COUNT_OFFSET..Self::LIGHT_COUNT_OFFSET + 4].copy_from_slice(&count.to_ne_bytes());
        for (i, light) in lights.iter().enumerate() {
            let start = Self::LIGHTS_OFFSET + i * Self::LIGHT_SIZE;
            out[start..start + Self::LIGHT_SIZE].copy_from_slice(bytemuck::bytes_of(light));
        }
    }
}

/// A directional light source that illuminates from a uniform direction.
///
/// Directional lights reach the whole scene, so their bounding volume is infinite
/// and their score is their raw intensity.
///
/// # Examples
///
/// ```
/// use prism_core::renderer::light::{DirectionalLight, Light};
/// use prism_core::math::{Aabb, BoundingVolume, Vec3};
///
/// let sun = DirectionalLight::default();
/// assert_eq!(sun.bounding_volume(), BoundingVolume::Infinite);
/// assert_eq!(sun.contribution_score(&Aabb::from_min_max(Vec3::ZERO, Vec3::ONE)), sun.intensity);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// The direction the light is pointing (normalized).
    pub direction: Vec3,
    /// The color of the light in linear RGB space.
    pub color: LinearRgba,
    /// The intensity multiplier for the light.
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, -0.5).normalize(),
            color: LinearRgba::WHITE,
            intensity: 1.0,
        }
    }
}

impl Light for DirectionalLight {
    fn bounding_volume(&self) -> BoundingVolume {
        BoundingVolume::Infinite
    }

    fn contribution_score(&self, _bounds: &Aabb) -> f32 {
        self.intensity
    }

    fn gpu_data(&self) -> GpuLight {
        GpuLight {
            position: [0.0; 3],
            range: 0.0,
            color: self.color.rgb_array(),
            intensity: self.intensity,
            direction: self.direction.to_array(),
            light_type: GpuLight::TYPE_DIRECTIONAL,
            inner_cone_cos: 0.0,
            outer_cone_cos: 0.0,
            _padding: [0.0; 2],
        }
    }
}

/// A point light source that emits light in all directions from a single point.
///
/// Its score is the intensity attenuated by the squared distance to the center of
/// the renderable's bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Position in world space.
    pub position: Vec3,
    /// The color of the light in linear RGB space.
    pub color: LinearRgba,
    /// The intensity of the light.
    pub intensity: f32,
    /// The maximum range of the light in world units.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: LinearRgba::WHITE,
            intensity: 100.0,
            range: 10.0,
        }
    }
}

impl Light for PointLight {
    fn bounding_volume(&self) -> BoundingVolume {
        BoundingVolume::Finite(Aabb::from_center_half_extents(self.position, Vec3::ONE * self.range))
    }

    fn contribution_score(&self, bounds: &Aabb) -> f32 {
        attenuated(self.intensity, self.position, bounds)
    }

    fn gpu_data(&self) -> GpuLight {
        GpuLight {
            position: self.position.to_array(),
            range: self.range,
            color: self.color.rgb_array(),
            intensity: self.intensity,
            direction: [0.0; 3],
            light_type: GpuLight::TYPE_POINT,
            inner_cone_cos: 0.0,
            outer_cone_cos: 0.0,
            _padding: [0.0; 2],
        }
    }
}

/// A spot light source that emits light in a cone from a single point.
///
/// The bounding volume is the conservative box of the full range sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    /// Position in world space.
    pub position: Vec3,
    /// The direction the spot light is pointing (normalized).
    pub direction: Vec3,
    /// The color of the light in linear RGB space.
    pub color: LinearRgba,
    /// The intensity of the light.
    pub intensity: f32,
    /// The maximum range of the light in world units.
    pub range: f32,
    /// Inner cone angle in radians, full intensity inside.
    pub inner_cone_angle: f32,
    /// Outer cone angle in radians, no light outside.
    pub outer_cone_angle: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: LinearRgba::WHITE,
            intensity: 200.0,
            range: 20.0,
            inner_cone_angle: 15.0_f32.to_radians(),
            outer_cone_angle: 30.0_f32.to_radians(),
        }
    }
}

impl Light for SpotLight {
    fn bounding_volume(&self) -> BoundingVolume {
        BoundingVolume::Finite(Aabb::from_center_half_extents(self.position, Vec3::ONE * self.range))
    }

    fn contribution_score(&self, bounds: &Aabb) -> f32 {
        attenuated(self.intensity, self.position, bounds)
    }

    fn gpu_data(&self) -> GpuLight {
        GpuLight {
            position: self.position.to_array(),
            range: self.range,
            color: self.color.rgb_array(),
            intensity: self.intensity,
            direction: self.direction.to_array(),
            light_type: GpuLight::TYPE_SPOT,
            inner_cone_cos: self.inner_cone_angle.cos(),
            outer_cone_cos: self.outer_cone_angle.cos(),
            _padding: [0.0; 2],
        }
    }
}

#[inline]
fn attenuated(intensity: f32, position: Vec3, bounds: &Aabb) -> f32 {
    intensity / (1.0 + position.distance_squared(bounds.center()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_light_size() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
        assert_eq!(LightBlockLayout::TOTAL_SIZE, 16 + 64 * MAX_LIGHT_COUNT_PER_DRAW);
    }

    #[test]
    fn test_block_aligned_size() {
        assert_eq!(LightBlockLayout::aligned_size(256), 512);
        assert_eq!(LightBlockLayout::aligned_size(16), LightBlockLayout::TOTAL_SIZE as u64);
    }

    #[test]
    fn test_block_write_count_and_padding() {
        let mut block = vec![0xAAu8; LightBlockLayout::TOTAL_SIZE];
        let light = PointLight::default().gpu_data();
        LightBlockLayout::write(&mut block, &[light]);

        assert_eq!(u32::from_ne_bytes(block[0..4].try_into().unwrap()), 1);
        let first = &block[16..16 + 64];
        assert_eq!(first, bytemuck::bytes_of(&light));
        assert!(block[16 + 64..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_point_light_score_falls_off() {
        let light = PointLight {
            position: Vec3::ZERO,
            intensity: 10.0,
            ..Default::default()
        };
        let near = Aabb::from_center_half_extents(Vec3::new(1.0, 0.0, 0.0), Vec3::ONE);
        let far = Aabb::from_center_half_extents(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE);
        assert!(light.contribution_score(&near) > light.contribution_score(&far));
    }

    #[test]
    fn test_point_light_bounds_follow_range() {
        let light = PointLight {
            position: Vec3::new(10.0, 0.0, 0.0),
            range: 2.0,
            ..Default::default()
        };
        let inside = Aabb::from_center_half_extents(Vec3::new(11.0, 0.0, 0.0), Vec3::ONE * 0.1);
        let outside = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        assert!(light.bounding_volume().intersects(&inside));
        assert!(!light.bounding_volume().intersects(&outside));
    }

    #[test]
    fn test_spot_light_gpu_data() {
        let spot = SpotLight::default();
        let data = spot.gpu_data();
        assert_eq!(data.light_type, GpuLight::TYPE_SPOT);
        assert!(data.inner_cone_cos > data.outer_cone_cos);
    }
}
