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

//! Viewers: a camera paired with a render target configuration.

use crate::math::{Extent2D, LinearRgba, Mat4, Rect, Vec3};
use bytemuck::{Pod, Zeroable};
use std::any::Any;

/// Camera data of a viewer, as uploaded to its uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerInstance {
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform.
    pub projection: Mat4,
    /// Camera position in world space, used for distance sorting.
    pub eye_position: Vec3,
    /// Size of the render target in pixels.
    pub target_size: Extent2D,
}

impl Default for ViewerInstance {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            eye_position: Vec3::ZERO,
            target_size: Extent2D::new(1, 1),
        }
    }
}

impl ViewerInstance {
    /// Squared distance from the eye to `point`.
    #[inline]
    pub fn distance_squared_to(&self, point: Vec3) -> f32 {
        self.eye_position.distance_squared(point)
    }

    /// The GPU blob of this instance.
    pub fn gpu_data(&self) -> GpuViewerData {
        let view_proj = self.projection * self.view;
        GpuViewerData {
            view: self.view.to_cols_array(),
            projection: self.projection.to_cols_array(),
            view_projection: view_proj.to_cols_array(),
            eye_position: self.eye_position.to_array(),
            _padding0: 0.0,
            target_size: [self.target_size.width as f32, self.target_size.height as f32],
            inv_target_size: [
                1.0 / self.target_size.width.max(1) as f32,
                1.0 / self.target_size.height.max(1) as f32,
            ],
        }
    }
}

/// GPU-side viewer data (std140 compatible).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuViewerData {
    /// World to view.
    pub view: [f32; 16],
    /// View to clip.
    pub projection: [f32; 16],
    /// World to clip.
    pub view_projection: [f32; 16],
    /// Eye position.
    pub eye_position: [f32; 3],
    /// Padding.
    pub _padding0: f32,
    /// Target size in pixels.
    pub target_size: [f32; 2],
    /// Reciprocal of the target size.
    pub inv_target_size: [f32; 2],
}

/// Something the pipeline renders a view for.
pub trait AbstractViewer: Send + Sync {
    /// Camera data for this viewer.
    fn viewer_instance(&self) -> &ViewerInstance;

    /// The region of the target drawn into.
    fn viewport(&self) -> Rect;

    /// The color the target is cleared to.
    fn clear_color(&self) -> LinearRgba;

    /// Size of the render target. Defaults to the instance's target size.
    fn target_size(&self) -> Extent2D {
        self.viewer_instance().target_size
    }

    /// Allows downcasting to the concrete viewer type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A plain perspective camera viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    instance: ViewerInstance,
    viewport: Rect,
    clear_color: LinearRgba,
}

impl Camera {
    /// Creates a camera covering the whole target.
    pub fn new(target_size: Extent2D) -> Self {
        Self {
            instance: ViewerInstance {
                target_size,
                ..Default::default()
            },
            viewport: Rect::from_extent(target_size),
            clear_color: LinearRgba::BLACK,
        }
    }

    /// Sets the view from an eye position and a target point.
    ///
    /// Degenerate inputs leave the previous view untouched and return `false`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) -> bool {
        match Mat4::look_at_rh(eye, target, up) {
            Some(view) => {
                self.instance.view = view;
                self.instance.eye_position = eye;
                true
            }
            None => false,
        }
    }

    /// Sets a perspective projection matching the target aspect ratio.
    pub fn set_perspective(&mut self, fov_y_radians: f32, z_near: f32, z_far: f32) {
        let size = self.instance.target_size;
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        self.instance.projection = Mat4::perspective_rh_zo(fov_y_radians, aspect, z_near, z_far);
    }

    /// Sets the clear color.
    pub fn set_clear_color(&mut self, color: LinearRgba) {
        self.clear_color = color;
    }

    /// Resizes the target and resets the viewport to cover it.
    pub fn resize(&mut self, target_size: Extent2D) {
        self.instance.target_size = target_size;
        self.viewport = Rect::from_extent(target_size);
    }
}

impl AbstractViewer for Camera {
    fn viewer_instance(&self) -> &ViewerInstance {
        &self.instance
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn clear_color(&self) -> LinearRgba {
        self.clear_color
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_4;

    #[test]
    fn test_gpu_viewer_data_is_std140_sized() {
        assert_eq!(std::mem::size_of::<GpuViewerData>() % 16, 0);
    }

    #[test]
    fn test_camera_look_at_updates_eye() {
        let mut camera = Camera::new(Extent2D::new(800, 600));
        assert!(camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y));
        assert_eq!(camera.viewer_instance().eye_position, Vec3::new(0.0, 0.0, 5.0));
        assert!(!camera.look_at(Vec3::ZERO, Vec3::ZERO, Vec3::Y));
        assert_eq!(camera.viewer_instance().eye_position, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_camera_resize_resets_viewport() {
        let mut camera = Camera::new(Extent2D::new(800, 600));
        camera.set_perspective(FRAC_PI_4, 0.1, 100.0);
        camera.resize(Extent2D::new(1024, 768));
        assert_eq!(camera.viewport(), Rect::new(0, 0, 1024, 768));
        assert_eq!(camera.target_size(), Extent2D::new(1024, 768));
    }
}
