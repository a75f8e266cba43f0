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

//! The built-in submesh element, its renderer, and the [`Model`] renderable.

use super::element::{ElementId, InstancedRenderable, QueuedElement, RenderElement, RenderStates, WorldInstance};
use super::element_renderer::{ElementRenderer, ElementRendererData, ViewerContext};
use super::frame::RenderFrame;
use super::render_queue::RenderQueueRegistry;
use prism_core::math::{Aabb, Vec3};
use prism_core::renderer::api::{BindGroupId, BufferView, GpuMesh, RenderPipelineId};
use prism_core::renderer::{Material, MaterialPass, RenderPass, ResourceError, ViewerInstance};
use std::any::Any;
use std::sync::Arc;

/// Element type of [`SubmeshElement`].
pub const SUBMESH_ELEMENT_TYPE: usize = 0;

/// Uniform slot of the viewer data.
pub const VIEWER_UNIFORM_SLOT: u32 = 0;
/// Uniform slot of the world instance data.
pub const INSTANCE_UNIFORM_SLOT: u32 = 1;
/// Uniform slot of the light block.
pub const LIGHT_UNIFORM_SLOT: u32 = 2;
/// Bind group index of the material pass bindings.
pub const MATERIAL_BIND_GROUP: u32 = 0;

/// One submesh drawn with one material pass.
#[derive(Debug)]
pub struct SubmeshElement {
    material_pass: Arc<MaterialPass>,
    pipeline: RenderPipelineId,
    mesh: GpuMesh,
    world_instance: BufferView,
    world_center: Vec3,
}

impl SubmeshElement {
    /// Captures the pass pipeline as it is now; a later pipeline change forces a rebuild.
    pub fn new(
        material_pass: Arc<MaterialPass>,
        mesh: GpuMesh,
        world_instance: BufferView,
        world_center: Vec3,
    ) -> Self {
        Self {
            pipeline: material_pass.pipeline(),
            material_pass,
            mesh,
            world_instance,
            world_center,
        }
    }

    /// The material pass drawn with.
    pub fn material_pass(&self) -> &Arc<MaterialPass> {
        &self.material_pass
    }

    /// The pipeline captured at build time.
    pub fn pipeline(&self) -> RenderPipelineId {
        self.pipeline
    }

    /// The geometry.
    pub fn mesh(&self) -> &GpuMesh {
        &self.mesh
    }

    /// Uniform data of the world instance.
    pub fn world_instance(&self) -> BufferView {
        self.world_instance
    }
}

fn depth_bits(distance_squared: f32) -> u32 {
    // Non-negative floats order like their bit patterns.
    distance_squared.max(0.0).to_bits()
}

impl RenderElement for SubmeshElement {
    fn element_type(&self) -> usize {
        SUBMESH_ELEMENT_TYPE
    }

    fn register(&self, registry: &mut RenderQueueRegistry) {
        registry.register_element_type(SUBMESH_ELEMENT_TYPE);
        registry.register_layer(self.material_pass.layer());
        registry.register_pipeline(self.pipeline);
        registry.register_material_pass(self.material_pass.id());
        registry.register_vertex_buffer(self.mesh.vertex_buffer);
    }

    /// Opaque elements: `layer | pipeline | material pass | vertex buffer | coarse depth`,
    /// front to back. Depth sorted elements: `layer | 1 | depth`, back to front.
    fn sorting_score(&self, viewer: &ViewerInstance, registry: &RenderQueueRegistry) -> u64 {
        let layer = registry.layer_index(self.material_pass.layer()).unwrap_or(0) as u64 & 0xFF;
        let depth = depth_bits(viewer.distance_squared_to(self.world_center));

        if self.material_pass.is_depth_sorted() {
            return (layer << 56) | (1 << 55) | u64::from(!depth);
        }

        let pipeline = registry.pipeline_index(self.pipeline).unwrap_or(0) as u64 & 0x7FFF;
        let material_pass = registry
            .material_pass_index(self.material_pass.id())
            .unwrap_or(0) as u64
            & 0xFFFF;
        let vertex_buffer = registry
            .vertex_buffer_index(self.mesh.vertex_buffer)
            .unwrap_or(0) as u64
            & 0xFF;

        (layer << 56)
            | (pipeline << 40)
            | (material_pass << 24)
            | (vertex_buffer << 16)
            | u64::from(depth >> 16)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PreparedDraw {
    light_data: Option<BufferView>,
}

/// Draws of the current rebuild, indexed by [`ElementId`].
#[derive(Debug, Default)]
pub struct SubmeshRendererData {
    draws: Vec<Option<PreparedDraw>>,
    prepared: usize,
}

impl SubmeshRendererData {
    /// Number of draws prepared in the current rebuild.
    pub fn prepared_draws(&self) -> usize {
        self.prepared
    }

    fn draw(&self, id: ElementId) -> Option<&PreparedDraw> {
        self.draws.get(id.index())?.as_ref()
    }
}

fn submesh<'a>(element: &QueuedElement<'a>) -> &'a SubmeshElement {
    match element.element.as_any().downcast_ref::<SubmeshElement>() {
        Some(submesh) => submesh,
        None => panic!("element {:?} dispatched to the submesh renderer", element.id),
    }
}

fn renderer_data<T: 'static>(data: &dyn Any) -> &T {
    match data.downcast_ref::<T>() {
        Some(data) => data,
        None => panic!("element renderer data of an unexpected type"),
    }
}

fn renderer_data_mut<T: 'static>(data: &mut dyn Any) -> &mut T {
    match data.downcast_mut::<T>() {
        Some(data) => data,
        None => panic!("element renderer data of an unexpected type"),
    }
}

/// Renders [`SubmeshElement`]s, skipping redundant state changes.
#[derive(Debug, Default)]
pub struct SubmeshRenderer;

impl ElementRenderer for SubmeshRenderer {
    fn instantiate_data(&self) -> ElementRendererData {
        Box::new(SubmeshRendererData::default())
    }

    fn reset(&self, data: &mut dyn Any, _frame: &mut RenderFrame<'_>) {
        let data = renderer_data_mut::<SubmeshRendererData>(data);
        data.draws.clear();
        data.prepared = 0;
    }

    fn prepare(
        &self,
        _viewer: &ViewerContext<'_>,
        data: &mut dyn Any,
        _frame: &mut RenderFrame<'_>,
        elements: &[QueuedElement<'_>],
        states: &[RenderStates],
    ) -> Result<(), ResourceError> {
        debug_assert_eq!(elements.len(), states.len());
        let data = renderer_data_mut::<SubmeshRendererData>(data);

        for (element, state) in elements.iter().zip(states) {
            let index = element.id.index();
            if index >= data.draws.len() {
                data.draws.resize(index + 1, None);
            }
            data.draws[index] = Some(PreparedDraw {
                light_data: state.light_data,
            });
            data.prepared += 1;
        }
        Ok(())
    }

    fn prepare_end(&self, _frame: &mut RenderFrame<'_>, data: &mut dyn Any) -> Result<(), ResourceError> {
        let data = renderer_data::<SubmeshRendererData>(data);
        log::trace!("Prepared {} submesh draws", data.prepared);
        Ok(())
    }

    fn render(
        &self,
        viewer: &ViewerContext<'_>,
        data: &dyn Any,
        pass: &mut dyn RenderPass,
        elements: &[QueuedElement<'_>],
    ) {
        let data = renderer_data::<SubmeshRendererData>(data);

        pass.set_uniform_buffer(VIEWER_UNIFORM_SLOT, viewer.uniform_buffer);

        let mut current_pipeline: Option<RenderPipelineId> = None;
        let mut current_bind_group: Option<BindGroupId> = None;
        let mut current_instance: Option<BufferView> = None;
        let mut current_light: Option<BufferView> = None;
        let mut current_mesh: Option<GpuMesh> = None;

        for element in elements {
            let submesh = submesh(element);
            let Some(draw) = data.draw(element.id) else {
                panic!("submesh element {:?} rendered without being prepared", element.id);
            };

            if current_pipeline != Some(submesh.pipeline) {
                pass.set_pipeline(submesh.pipeline);
                current_pipeline = Some(submesh.pipeline);
                current_bind_group = None;
            }

            // Read live, so a binding change only needs a new recording.
            let bind_group = submesh.material_pass.bind_group();
            if current_bind_group != Some(bind_group) {
                pass.set_bind_group(MATERIAL_BIND_GROUP, bind_group);
                current_bind_group = Some(bind_group);
            }

            if current_instance != Some(submesh.world_instance) {
                pass.set_uniform_buffer(INSTANCE_UNIFORM_SLOT, submesh.world_instance);
                current_instance = Some(submesh.world_instance);
            }

            if let Some(light) = draw.light_data {
                if current_light != Some(light) {
                    pass.set_uniform_buffer(LIGHT_UNIFORM_SLOT, light);
                    current_light = Some(light);
                }
            }

            let mesh = submesh.mesh;
            if current_mesh != Some(mesh) {
                pass.set_vertex_buffer(0, mesh.vertex_buffer, 0);
                pass.set_index_buffer(mesh.index_buffer, 0, mesh.index_format);
                current_mesh = Some(mesh);
            }

            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

/// A renderable made of submeshes, each drawn with one of its materials.
#[derive(Debug, Clone)]
pub struct Model {
    aabb: Aabb,
    materials: Vec<Arc<Material>>,
    submeshes: Vec<(GpuMesh, usize)>,
}

impl Model {
    /// An empty model with object space bounds `aabb`.
    pub fn new(aabb: Aabb) -> Self {
        Self {
            aabb,
            materials: Vec::new(),
            submeshes: Vec::new(),
        }
    }

    /// Adds a submesh; submeshes sharing the same `Arc<Material>` share a material slot.
    pub fn add_submesh(&mut self, mesh: GpuMesh, material: Arc<Material>) {
        let index = match self.materials.iter().position(|m| Arc::ptr_eq(m, &material)) {
            Some(index) => index,
            None => {
                self.materials.push(material);
                self.materials.len() - 1
            }
        };
        self.submeshes.push((mesh, index));
    }

    /// Builder form of [`add_submesh`](Self::add_submesh).
    pub fn with_submesh(mut self, mesh: GpuMesh, material: Arc<Material>) -> Self {
        self.add_submesh(mesh, material);
        self
    }

    /// Number of submeshes.
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }
}

impl InstancedRenderable for Model {
    fn aabb(&self) -> Aabb {
        self.aabb
    }

    fn build_elements(
        &self,
        pass_index: usize,
        world_instance: &WorldInstance,
        elements: &mut Vec<Box<dyn RenderElement>>,
    ) {
        let world_center = world_instance.world_matrix().transform_point(self.aabb.center());
        for (mesh, material_index) in &self.submeshes {
            let Some(pass) = self.materials[*material_index].pass(pass_index) else {
                continue;
            };
            elements.push(Box::new(SubmeshElement::new(
                pass.clone(),
                *mesh,
                world_instance.uniform_view(),
                world_center,
            )));
        }
    }

    fn material_count(&self) -> usize {
        self.materials.len()
    }

    fn material(&self, index: usize) -> Option<&Arc<Material>> {
        self.materials.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::mock::{MockDevice, Recorded};
    use prism_core::math::Mat4;
    use prism_core::renderer::api::{BufferId, IndexFormat};
    use prism_core::renderer::{GraphicsDevice, RetirementQueue};

    fn mesh(vertex_buffer: usize) -> GpuMesh {
        GpuMesh {
            vertex_buffer: BufferId(vertex_buffer),
            index_buffer: BufferId(vertex_buffer + 100),
            index_count: 36,
            index_format: IndexFormat::Uint16,
        }
    }

    fn material(pass_index: usize, pass: &Arc<MaterialPass>) -> Arc<Material> {
        Arc::new(Material::new().with_pass(pass_index, pass.clone()))
    }

    fn viewer_at(z: f32) -> ViewerInstance {
        ViewerInstance {
            eye_position: Vec3::new(0.0, 0.0, z),
            ..Default::default()
        }
    }

    #[test]
    fn test_model_builds_one_element_per_submesh_with_pass() {
        let lit = Arc::new(MaterialPass::new("Lit", RenderPipelineId(1), BindGroupId(1)));
        let with_pass = material(1, &lit);
        let without_pass = Arc::new(Material::new());
        let model = Model::new(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE))
            .with_submesh(mesh(1), with_pass.clone())
            .with_submesh(mesh(2), without_pass)
            .with_submesh(mesh(3), with_pass);
        assert_eq!(model.material_count(), 2);

        let instance = WorldInstance::new(Mat4::IDENTITY, BufferId(50));
        let mut elements = Vec::new();
        model.build_elements(1, &instance, &mut elements);
        assert_eq!(elements.len(), 2);
        model.build_elements(0, &instance, &mut elements);
        assert_eq!(elements.len(), 2);
    }

    #[test]
    fn test_opaque_elements_group_by_pipeline_before_depth() {
        let a = Arc::new(MaterialPass::new("A", RenderPipelineId(10), BindGroupId(1)));
        let b = Arc::new(MaterialPass::new("B", RenderPipelineId(20), BindGroupId(2)));
        let far_a = SubmeshElement::new(a.clone(), mesh(1), BufferView::new(BufferId(5), 0, 64), Vec3::new(0.0, 0.0, -50.0));
        let near_b = SubmeshElement::new(b, mesh(1), BufferView::new(BufferId(5), 0, 64), Vec3::ZERO);
        let near_a = SubmeshElement::new(a, mesh(1), BufferView::new(BufferId(5), 0, 64), Vec3::ZERO);

        let mut registry = RenderQueueRegistry::new();
        for element in [&far_a, &near_b, &near_a] {
            element.register(&mut registry);
        }
        registry.finalize();

        let viewer = viewer_at(1.0);
        let far_a = far_a.sorting_score(&viewer, &registry);
        let near_a = near_a.sorting_score(&viewer, &registry);
        let near_b = near_b.sorting_score(&viewer, &registry);
        assert!(near_a < far_a);
        assert!(far_a < near_b);
    }

    #[test]
    fn test_depth_sorted_elements_go_back_to_front_after_opaque() {
        let opaque = Arc::new(MaterialPass::new("Opaque", RenderPipelineId(1), BindGroupId(1)));
        let blended = Arc::new(
            MaterialPass::new("Blend", RenderPipelineId(2), BindGroupId(2)).with_depth_sorting(true),
        );
        let view = BufferView::new(BufferId(5), 0, 64);
        let opaque = SubmeshElement::new(opaque, mesh(1), view, Vec3::ZERO);
        let near = SubmeshElement::new(blended.clone(), mesh(1), view, Vec3::ZERO);
        let far = SubmeshElement::new(blended, mesh(1), view, Vec3::new(0.0, 0.0, -30.0));

        let mut registry = RenderQueueRegistry::new();
        for element in [&opaque, &near, &far] {
            element.register(&mut registry);
        }
        registry.finalize();

        let viewer = viewer_at(1.0);
        let opaque = opaque.sorting_score(&viewer, &registry);
        let near = near.sorting_score(&viewer, &registry);
        let far = far.sorting_score(&viewer, &registry);
        assert!(opaque < far);
        assert!(far < near);
    }

    #[test]
    fn test_render_binds_state_once_and_reads_live_bind_group() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut frame = RenderFrame::new(&device, Default::default(), &mut retired);

        let pass = Arc::new(MaterialPass::new("Lit", RenderPipelineId(3), BindGroupId(4)));
        let view = BufferView::new(BufferId(5), 0, 64);
        let light = BufferView::new(BufferId(6), 0, 272);
        let elements: Vec<SubmeshElement> = (0..2)
            .map(|_| SubmeshElement::new(pass.clone(), mesh(1), view, Vec3::ZERO))
            .collect();
        let queued: Vec<QueuedElement> = elements
            .iter()
            .enumerate()
            .map(|(i, element)| QueuedElement {
                id: ElementId(i as u32),
                element,
            })
            .collect();
        let states = vec![RenderStates { light_data: Some(light) }; 2];

        let renderer = SubmeshRenderer;
        let mut data = renderer.instantiate_data();
        let instance = ViewerInstance::default();
        let viewer = ViewerContext {
            instance: &instance,
            uniform_buffer: BufferView::new(BufferId(7), 0, 224),
        };
        renderer.reset(data.as_mut(), &mut frame);
        renderer.prepare(&viewer, data.as_mut(), &mut frame, &queued, &states).unwrap();
        renderer.prepare_end(&mut frame, data.as_mut()).unwrap();
        pass.set_bind_group(BindGroupId(9));

        let mut encoder = device.create_command_encoder(None);
        {
            let mut render_pass = encoder.begin_render_pass(&Default::default());
            renderer.render(&viewer, data.as_ref(), render_pass.as_mut(), &queued);
        }
        let log = device.take_log();
        assert_eq!(
            log,
            vec![
                Recorded::BeginPass(None),
                Recorded::Uniform(VIEWER_UNIFORM_SLOT, viewer.uniform_buffer),
                Recorded::Pipeline(RenderPipelineId(3)),
                Recorded::BindGroup(MATERIAL_BIND_GROUP, BindGroupId(9)),
                Recorded::Uniform(INSTANCE_UNIFORM_SLOT, view),
                Recorded::Uniform(LIGHT_UNIFORM_SLOT, light),
                Recorded::DrawIndexed(0..36),
                Recorded::DrawIndexed(0..36),
            ]
        );
    }
}
