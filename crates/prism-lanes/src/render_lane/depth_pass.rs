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

//! The depth pre-pass: unlit drawing of every renderable that has a depth material pass.

use super::element::{ElementId, RenderStates};
use super::element_renderer::{ElementRendererRegistry, ViewerContext};
use super::frame::RenderFrame;
use super::frame_graph::FramePassExecution;
use super::pipeline_pass::PassState;
use super::visibility::VisibleRenderable;
use crate::error::FramePipelineError;
use prism_core::math::Rect;
use prism_core::renderer::{Material, MaterialPass, MaterialPassId, RenderPass};
use std::sync::Arc;

/// Fills the depth buffer of one viewer before its forward pass.
pub struct DepthPipelinePass {
    state: PassState,
}

impl DepthPipelinePass {
    /// Creates the pass for material pass index `pass_index`.
    pub fn new(pass_index: usize) -> Self {
        Self {
            state: PassState::new("DepthPass", pass_index),
        }
    }

    /// The material pass index drawn by this pass.
    pub fn pass_index(&self) -> usize {
        self.state.pass_index()
    }

    /// See [`ForwardPipelinePass::register_material`](super::ForwardPipelinePass::register_material).
    pub fn register_material(&mut self, material: &Material) -> Option<Arc<MaterialPass>> {
        self.state.register_material(material)
    }

    /// See [`ForwardPipelinePass::unregister_material`](super::ForwardPipelinePass::unregister_material).
    pub fn unregister_material(&mut self, material: &Material) -> Option<MaterialPassId> {
        self.state.unregister_material(material)
    }

    /// Forgets every material pass, returning their ids.
    pub fn drain_materials(&mut self) -> Vec<MaterialPassId> {
        self.state.drain_materials()
    }

    /// Rebuilds the elements on the next [`prepare`](Self::prepare).
    pub fn force_rebuild(&mut self) {
        self.state.force_rebuild();
    }

    /// Drops the renderer data of `element_type` after its renderer was replaced.
    pub fn forget_element_renderer(&mut self, element_type: usize) {
        self.state.forget_element_renderer(element_type);
    }

    /// Brings elements and renderer data up to date for this frame.
    pub fn prepare(
        &mut self,
        frame: &mut RenderFrame<'_>,
        viewer: &ViewerContext<'_>,
        renderers: &ElementRendererRegistry,
        renderables: &[VisibleRenderable<'_>],
        visibility_hash: u64,
    ) -> Result<(), FramePipelineError> {
        self.state.poll_materials();

        if self.state.needs_rebuild(visibility_hash) {
            self.state.begin_rebuild(frame);
            for renderable in renderables {
                self.state.add_elements(renderable, RenderStates::default());
            }
            self.state.end_rebuild(visibility_hash);
        }

        self.state.sort(viewer.instance);
        self.state.prepare_renderers(frame, viewer, renderers)
    }

    /// Whether the frame graph must record this pass again or may replay it.
    pub fn execution_mode(&self) -> FramePassExecution {
        self.state.execution_mode()
    }

    /// Records the draws into `pass`.
    pub fn record(
        &mut self,
        viewer: &ViewerContext<'_>,
        viewport: Rect,
        renderers: &ElementRendererRegistry,
        pass: &mut dyn RenderPass,
    ) {
        self.state.record(viewer, viewport, renderers, pass);
    }

    /// Hands the elements to deferred release.
    pub fn release(&mut self, frame: &mut RenderFrame<'_>) {
        self.state.release(frame);
    }

    /// Number of render elements of the current rebuild.
    pub fn element_count(&self) -> usize {
        self.state.element_count()
    }

    /// Whether an element rebuild is pending.
    pub fn is_rebuild_forced(&self) -> bool {
        self.state.is_rebuild_forced()
    }

    /// Whether the next execution records commands.
    pub fn is_command_rebuild_pending(&self) -> bool {
        self.state.is_command_rebuild_pending()
    }

    /// Number of distinct material passes used by the pass.
    pub fn tracked_material_passes(&self) -> usize {
        self.state.tracked_material_passes()
    }

    /// Whether material pass `id` is used by the pass.
    pub fn tracks_material_pass(&self, id: MaterialPassId) -> bool {
        self.state.tracks_material_pass(id)
    }

    /// Element ids in draw order.
    pub fn draw_order(&self) -> &[ElementId] {
        self.state.queued_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::element::WorldInstance;
    use crate::render_lane::mock::MockDevice;
    use crate::render_lane::submesh::{Model, SubmeshRenderer, SUBMESH_ELEMENT_TYPE};
    use prism_core::math::{Aabb, Mat4, Vec3};
    use prism_core::renderer::api::{BindGroupId, BufferId, BufferView, GpuMesh, IndexFormat, RenderPipelineId};
    use prism_core::renderer::{FrameToken, RetirementQueue, ViewerInstance};

    fn mesh() -> GpuMesh {
        GpuMesh {
            vertex_buffer: BufferId(10),
            index_buffer: BufferId(11),
            index_count: 3,
            index_format: IndexFormat::Uint16,
        }
    }

    #[test]
    fn test_only_materials_with_a_depth_pass_produce_elements() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut renderers = ElementRendererRegistry::new();
        renderers.register(SUBMESH_ELEMENT_TYPE, Box::new(SubmeshRenderer));

        let depth = Arc::new(MaterialPass::new("Depth", RenderPipelineId(1), BindGroupId(1)));
        let forward = Arc::new(MaterialPass::new("Forward", RenderPipelineId(2), BindGroupId(2)));
        let opaque = Arc::new(Material::new().with_pass(0, depth).with_pass(1, forward.clone()));
        let forward_only = Arc::new(Material::new().with_pass(1, forward));

        let model = Model::new(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE))
            .with_submesh(mesh(), opaque.clone())
            .with_submesh(mesh(), forward_only.clone());
        let instance = WorldInstance::new(Mat4::IDENTITY, BufferId(20));

        let mut pass = DepthPipelinePass::new(0);
        assert!(pass.register_material(&opaque).is_some());
        assert!(pass.register_material(&forward_only).is_none());
        assert_eq!(pass.tracked_material_passes(), 1);

        let viewer_instance = ViewerInstance::default();
        let viewer = ViewerContext {
            instance: &viewer_instance,
            uniform_buffer: BufferView::new(BufferId(1), 0, 224),
        };
        let renderables = [VisibleRenderable {
            renderable: &model,
            world_instance: &instance,
        }];

        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &renderables, 3).unwrap();
        assert_eq!(pass.element_count(), 1);
        assert_eq!(pass.execution_mode(), FramePassExecution::UpdateAndExecute);
        assert_eq!(frame.finish().light_blocks_written, 0);

        let mut frame = RenderFrame::new(&device, FrameToken(1), &mut retired);
        pass.release(&mut frame);
        assert_eq!(pass.element_count(), 0);
        drop(frame);
        assert_eq!(retired.len(), 1);
    }
}
