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

//! The forward pipeline pass: lit drawing of every visible renderable.

use super::element::{ElementId, RenderStates};
use super::element_renderer::{ElementRendererRegistry, ViewerContext};
use super::frame::RenderFrame;
use super::frame_graph::FramePassExecution;
use super::light_assignment::{LightAssignment, LightUboPool, VisibleLight};
use super::pipeline_pass::PassState;
use super::visibility::VisibleRenderable;
use crate::error::FramePipelineError;
use prism_core::math::Rect;
use prism_core::renderer::api::{DeviceLimits, ForwardPipelineSettings};
use prism_core::renderer::{GraphicsDevice, Material, MaterialPass, MaterialPassId, RenderPass};
use std::sync::Arc;

/// Draws the elements of one viewer with their per-draw light blocks.
pub struct ForwardPipelinePass {
    state: PassState,
    lights: LightAssignment,
}

impl ForwardPipelinePass {
    /// Creates the pass for material pass index `pass_index`.
    pub fn new(pass_index: usize, limits: &DeviceLimits, settings: &ForwardPipelineSettings) -> Self {
        Self {
            state: PassState::new("ForwardPass", pass_index),
            lights: LightAssignment::new(limits, settings.light_blocks_per_chunk),
        }
    }

    /// The material pass index drawn by this pass.
    pub fn pass_index(&self) -> usize {
        self.state.pass_index()
    }

    /// Starts tracking the material's forward pass, if it has one.
    ///
    /// Returns the material pass when this is its first user in this pass.
    pub fn register_material(&mut self, material: &Material) -> Option<Arc<MaterialPass>> {
        self.state.register_material(material)
    }

    /// Stops tracking one use of the material's forward pass.
    ///
    /// Returns the material pass id when its last user is gone.
    pub fn unregister_material(&mut self, material: &Material) -> Option<MaterialPassId> {
        self.state.unregister_material(material)
    }

    /// Forgets every material pass, returning their ids.
    pub fn drain_materials(&mut self) -> Vec<MaterialPassId> {
        self.state.drain_materials()
    }

    /// Rebuilds the elements on the next [`prepare`](Self::prepare), whatever the visibility hash.
    pub fn force_rebuild(&mut self) {
        self.state.force_rebuild();
    }

    /// Drops the renderer data of `element_type` after its renderer was replaced.
    pub fn forget_element_renderer(&mut self, element_type: usize) {
        self.state.forget_element_renderer(element_type);
    }

    /// Brings elements, light blocks and renderer data up to date for this frame.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        &mut self,
        frame: &mut RenderFrame<'_>,
        viewer: &ViewerContext<'_>,
        renderers: &ElementRendererRegistry,
        light_pool: &mut LightUboPool,
        renderables: &[VisibleRenderable<'_>],
        lights: &[VisibleLight<'_>],
        visibility_hash: u64,
    ) -> Result<(), FramePipelineError> {
        self.state.poll_materials();

        if self.state.needs_rebuild(visibility_hash) {
            self.state.begin_rebuild(frame);
            self.lights.reset(frame);

            for renderable in renderables {
                let bounds = renderable
                    .renderable
                    .aabb()
                    .transform(renderable.world_instance.world_matrix());
                let light_data = self.lights.assign(frame, light_pool, &bounds, lights)?;
                self.state.add_elements(
                    renderable,
                    RenderStates {
                        light_data: Some(light_data),
                    },
                );
            }

            self.lights.flush(frame)?;
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

    /// Hands elements and light chunks to deferred release.
    pub fn release(&mut self, frame: &mut RenderFrame<'_>) {
        self.state.release(frame);
        self.lights.reset(frame);
    }

    /// Destroys the light chunks immediately. Only valid once the device is idle.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        self.lights.destroy(device);
    }

    /// Number of render elements of the current rebuild.
    pub fn element_count(&self) -> usize {
        self.state.element_count()
    }

    /// Number of elements mapped to a light block.
    pub fn light_view_count(&self) -> usize {
        self.state
            .render_states()
            .iter()
            .filter(|states| states.light_data.is_some())
            .count()
    }

    /// Light states of the elements, in build order.
    pub fn render_states(&self) -> &[RenderStates] {
        self.state.render_states()
    }

    /// Number of distinct light keys written in the current rebuild.
    pub fn distinct_light_keys(&self) -> usize {
        self.lights.distinct_keys()
    }

    /// Number of light chunks used by the current rebuild.
    pub fn light_chunk_count(&self) -> usize {
        self.lights.chunk_count()
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
    use crate::render_lane::element::{InstancedRenderable, WorldInstance};
    use crate::render_lane::handles::LightId;
    use crate::render_lane::mock::{MockDevice, Recorded};
    use crate::render_lane::submesh::{Model, SubmeshRenderer, SUBMESH_ELEMENT_TYPE};
    use prism_core::math::{Aabb, Mat4, Vec3};
    use prism_core::renderer::api::{BindGroupId, BufferId, BufferView, GpuMesh, IndexFormat, RenderPipelineId};
    use prism_core::renderer::{FrameToken, PointLight, RetirementQueue, ViewerInstance};
    use slotmap::SlotMap;

    struct Scene {
        pass: Arc<MaterialPass>,
        models: Vec<Model>,
        instances: Vec<WorldInstance>,
        lights: SlotMap<LightId, PointLight>,
    }

    impl Scene {
        fn new(model_count: usize) -> Self {
            let pass = Arc::new(MaterialPass::new("Lit", RenderPipelineId(1), BindGroupId(1)));
            let material = Arc::new(Material::new().with_pass(1, pass.clone()));
            let mesh = GpuMesh {
                vertex_buffer: BufferId(1000),
                index_buffer: BufferId(1001),
                index_count: 6,
                index_format: IndexFormat::Uint32,
            };
            let models = (0..model_count)
                .map(|_| {
                    Model::new(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE))
                        .with_submesh(mesh, material.clone())
                })
                .collect();
            let instances = (0..model_count)
                .map(|i| WorldInstance::new(Mat4::from_translation(Vec3::new(i as f32 * 3.0, 0.0, 0.0)), BufferId(2000 + i)))
                .collect();
            Self {
                pass,
                models,
                instances,
                lights: SlotMap::with_key(),
            }
        }

        fn renderables(&self) -> Vec<VisibleRenderable<'_>> {
            self.models
                .iter()
                .zip(&self.instances)
                .map(|(model, instance)| VisibleRenderable {
                    renderable: model,
                    world_instance: instance,
                })
                .collect()
        }

        fn visible_lights(&self) -> Vec<VisibleLight<'_>> {
            self.lights
                .iter()
                .map(|(id, light)| VisibleLight { id, light })
                .collect()
        }
    }

    fn renderers() -> ElementRendererRegistry {
        let mut registry = ElementRendererRegistry::new();
        registry.register(SUBMESH_ELEMENT_TYPE, Box::new(SubmeshRenderer));
        registry
    }

    #[test]
    fn test_prepare_is_a_no_op_when_nothing_changed() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut pool = LightUboPool::new();
        let renderers = renderers();
        let mut scene = Scene::new(2);
        scene.lights.insert(PointLight::default());

        let mut pass = ForwardPipelinePass::new(1, &DeviceLimits::default(), &ForwardPipelineSettings::default());
        for model in &scene.models {
            pass.register_material(model.material(0).unwrap());
        }
        let instance = ViewerInstance::default();
        let viewer = ViewerContext {
            instance: &instance,
            uniform_buffer: BufferView::new(BufferId(1), 0, 224),
        };

        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &mut pool, &scene.renderables(), &scene.visible_lights(), 7)
            .unwrap();
        let stats = frame.finish();
        assert_eq!(stats.element_rebuilds, 1);
        assert_eq!(stats.renderer_preparations, 1);
        assert_eq!(pass.execution_mode(), FramePassExecution::UpdateAndExecute);
        assert_eq!(pass.element_count(), 2);
        assert_eq!(pass.light_view_count(), 2);
        assert_eq!(pass.distinct_light_keys(), 1);

        let mut encoder = device.create_command_encoder(None);
        {
            let mut render_pass = encoder.begin_render_pass(&Default::default());
            pass.record(&viewer, Rect::new(0, 0, 8, 8), &renderers, render_pass.as_mut());
        }
        assert_eq!(pass.execution_mode(), FramePassExecution::Execute);
        let draws = device
            .take_log()
            .iter()
            .filter(|c| matches!(c, Recorded::DrawIndexed(_)))
            .count();
        assert_eq!(draws, 2);

        let writes = MockDevice::count(&device.writes);
        let mut frame = RenderFrame::new(&device, FrameToken(1), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &mut pool, &scene.renderables(), &scene.visible_lights(), 7)
            .unwrap();
        let stats = frame.finish();
        assert_eq!(stats.element_rebuilds, 0);
        assert_eq!(stats.renderer_preparations, 0);
        assert_eq!(stats.buffer_uploads, 0);
        assert_eq!(MockDevice::count(&device.writes), writes);
        assert_eq!(pass.execution_mode(), FramePassExecution::Execute);

        scene.pass.invalidate_pipeline();
        let mut frame = RenderFrame::new(&device, FrameToken(2), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &mut pool, &scene.renderables(), &scene.visible_lights(), 7)
            .unwrap();
        assert_eq!(frame.finish().element_rebuilds, 1);
    }

    #[test]
    fn test_binding_change_only_rerecords() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut pool = LightUboPool::new();
        let renderers = renderers();
        let scene = Scene::new(1);

        let mut pass = ForwardPipelinePass::new(1, &DeviceLimits::default(), &ForwardPipelineSettings::default());
        pass.register_material(scene.models[0].material(0).unwrap());
        let instance = ViewerInstance::default();
        let viewer = ViewerContext {
            instance: &instance,
            uniform_buffer: BufferView::new(BufferId(1), 0, 224),
        };

        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &mut pool, &scene.renderables(), &[], 1)
            .unwrap();
        drop(frame);
        let mut encoder = device.create_command_encoder(None);
        {
            let mut render_pass = encoder.begin_render_pass(&Default::default());
            pass.record(&viewer, Rect::default(), &renderers, render_pass.as_mut());
        }

        scene.pass.set_bind_group(BindGroupId(5));
        let mut frame = RenderFrame::new(&device, FrameToken(1), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &mut pool, &scene.renderables(), &[], 1)
            .unwrap();
        assert_eq!(frame.finish().element_rebuilds, 0);
        assert!(!pass.is_rebuild_forced());
        assert_eq!(pass.execution_mode(), FramePassExecution::UpdateAndExecute);
    }

    #[test]
    fn test_unlit_renderables_get_an_empty_light_block() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut pool = LightUboPool::new();
        let renderers = renderers();
        let scene = Scene::new(3);

        let mut pass = ForwardPipelinePass::new(1, &DeviceLimits::default(), &ForwardPipelineSettings::default());
        let instance = ViewerInstance::default();
        let viewer = ViewerContext {
            instance: &instance,
            uniform_buffer: BufferView::new(BufferId(1), 0, 224),
        };
        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        pass.prepare(&mut frame, &viewer, &renderers, &mut pool, &scene.renderables(), &[], 1)
            .unwrap();
        assert_eq!(pass.distinct_light_keys(), 1);
        assert_eq!(frame.finish().light_blocks_written, 1);
    }

    #[test]
    fn test_missing_element_renderer_is_reported() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut pool = LightUboPool::new();
        let scene = Scene::new(1);

        let mut pass = ForwardPipelinePass::new(1, &DeviceLimits::default(), &ForwardPipelineSettings::default());
        let instance = ViewerInstance::default();
        let viewer = ViewerContext {
            instance: &instance,
            uniform_buffer: BufferView::new(BufferId(1), 0, 224),
        };
        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        let err = pass
            .prepare(&mut frame, &viewer, &ElementRendererRegistry::new(), &mut pool, &scene.renderables(), &[], 1)
            .unwrap_err();
        assert!(matches!(err, FramePipelineError::MissingElementRenderer(SUBMESH_ELEMENT_TYPE)));
    }
}
