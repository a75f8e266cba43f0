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

//! Render elements and the drawables that produce them.

use super::render_queue::RenderQueueRegistry;
use bytemuck::{Pod, Zeroable};
use prism_core::math::{Aabb, Mat4};
use prism_core::renderer::api::{BufferId, BufferView};
use prism_core::renderer::{Material, ViewerInstance};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Index of an element in its pass's element list, valid for one rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

impl ElementId {
    /// The element list index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An atomic unit of drawable work, immutable for the lifetime of a rebuild.
pub trait RenderElement: Send + Sync + Debug {
    /// Dense type id selecting the element renderer.
    fn element_type(&self) -> usize;

    /// Records the element's sort metadata (layer, pipeline, buffers...) in `registry`.
    ///
    /// Implementations must call `registry.register_element_type` exactly once.
    fn register(&self, registry: &mut RenderQueueRegistry);

    /// Sort key of the element for `viewer`. Smaller keys are drawn first.
    fn sorting_score(&self, viewer: &ViewerInstance, registry: &RenderQueueRegistry) -> u64;

    /// Downcasting support for element renderers.
    fn as_any(&self) -> &dyn Any;
}

/// An element as seen by element renderers.
#[derive(Clone, Copy)]
pub struct QueuedElement<'a> {
    /// Identity of the element in the current rebuild.
    pub id: ElementId,
    /// The element itself.
    pub element: &'a dyn RenderElement,
}

/// Per-element state the pipeline pass computes before renderer preparation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStates {
    /// Light block bound to the draw, if the pass uses lights.
    pub light_data: Option<BufferView>,
}

/// GPU-side world instance data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuWorldData {
    /// Object to world transform.
    pub world: [f32; 16],
}

/// A world transform shared by any number of drawables, with its uniform buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldInstance {
    world_matrix: Mat4,
    uniform_buffer: BufferId,
}

impl WorldInstance {
    /// Size of the uniform data.
    pub const UNIFORM_SIZE: u64 = std::mem::size_of::<GpuWorldData>() as u64;

    /// Wraps a transform and the buffer its data is uploaded to.
    pub fn new(world_matrix: Mat4, uniform_buffer: BufferId) -> Self {
        Self {
            world_matrix,
            uniform_buffer,
        }
    }

    /// Object to world transform.
    #[inline]
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// Replaces the transform. The caller is responsible for re-uploading.
    #[inline]
    pub fn set_world_matrix(&mut self, world_matrix: Mat4) {
        self.world_matrix = world_matrix;
    }

    /// The uniform buffer holding [`GpuWorldData`].
    #[inline]
    pub fn uniform_buffer(&self) -> BufferId {
        self.uniform_buffer
    }

    /// A view over the whole uniform data.
    #[inline]
    pub fn uniform_view(&self) -> BufferView {
        BufferView::new(self.uniform_buffer, 0, Self::UNIFORM_SIZE)
    }

    /// The GPU blob of this instance.
    pub fn gpu_data(&self) -> GpuWorldData {
        GpuWorldData {
            world: self.world_matrix.to_cols_array(),
        }
    }
}

/// A drawable that produces render elements for a pass, given a world instance.
///
/// Meshes, sprites or any other drawable type implement this; the pipeline only
/// ever sees this interface.
pub trait InstancedRenderable: Send + Sync {
    /// Bounds in object space.
    fn aabb(&self) -> Aabb;

    /// Appends the elements of this drawable for `pass_index` to `elements`.
    fn build_elements(
        &self,
        pass_index: usize,
        world_instance: &WorldInstance,
        elements: &mut Vec<Box<dyn RenderElement>>,
    );

    /// Number of materials used by the drawable.
    fn material_count(&self) -> usize;

    /// Material at `index`.
    fn material(&self, index: usize) -> Option<&Arc<Material>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::Vec3;

    #[test]
    fn test_world_instance_gpu_data() {
        let mut instance = WorldInstance::new(Mat4::IDENTITY, BufferId(3));
        instance.set_world_matrix(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(&instance.gpu_data().world[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(instance.uniform_view(), BufferView::new(BufferId(3), 0, 64));
    }
}
