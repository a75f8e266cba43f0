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

//! Defines the `ForwardFramePipeline`, the orchestrator of the forward renderer.

use super::frame_graph::build_frame_graph;
use super::viewer::{FrameGraphContext, ViewerData};
use ahash::AHashSet;
use prism_core::math::Mat4;
use prism_core::renderer::api::{
    BufferDescriptor, DeviceLimits, ForwardPipelineSettings, TextureId,
};
use prism_core::renderer::{
    AbstractViewer, CompletionSignal, FrameToken, GraphicsDevice, Light, MaterialPassId,
    PassIndexRegistry, ResourceError, RetirementQueue, DEPTH_PASS_NAME, FORWARD_PASS_NAME,
};
use prism_lanes::render_lane::{
    BakedFrameGraph, DepthPipelinePass, DrawableId, ElementRenderer, ForwardPipelinePass,
    FrameStats, FrameVisibility, InstancedRenderable, LightId, LightUboPool,
    RegisteredMaterialPasses, RenderFrame, RetiredResource, SubmeshRenderer, ViewerId,
    ViewerVisibility, VisibleLight, VisibleRenderable, WorldInstance, WorldInstanceId,
    SUBMESH_ELEMENT_TYPE,
};
use prism_lanes::FramePipelineError;
use slotmap::SlotMap;
use std::sync::Arc;

// A world instance and the number of drawables attached to it.
struct WorldInstanceEntry {
    instance: WorldInstance,
    drawables: usize,
}

struct RegisteredDrawable {
    renderable: Arc<dyn InstancedRenderable>,
    world_instance: WorldInstanceId,
}

/// The forward frame pipeline.
///
/// The host registers viewers, world instances, drawables and lights, then calls
/// [`render`](Self::render) once per frame with what each viewer sees. Work is
/// only redone when something it depends on changed:
///
/// - render elements are rebuilt when a viewer's visibility hash changes, a
///   material pass pipeline changes, or a drawable/light is invalidated;
/// - commands are re-recorded only after a rebuild or a shader binding change;
/// - the frame graph is re-baked only when viewers are added, removed or change
///   their render target.
///
/// GPU resources that may still be in use are released once the host reports,
/// through [`completion_signal`](Self::completion_signal), that the frame which
/// last used them has completed.
pub struct ForwardFramePipeline {
    device: Arc<dyn GraphicsDevice>,
    settings: ForwardPipelineSettings,
    limits: DeviceLimits,
    depth_pass_index: usize,
    forward_pass_index: usize,
    context: FrameGraphContext,
    world_instances: SlotMap<WorldInstanceId, WorldInstanceEntry>,
    drawables: SlotMap<DrawableId, RegisteredDrawable>,
    lights: SlotMap<LightId, Box<dyn Light>>,
    material_passes: RegisteredMaterialPasses,
    invalidated_viewers: AHashSet<ViewerId>,
    invalidated_world_instances: AHashSet<WorldInstanceId>,
    baked_graph: Option<BakedFrameGraph<FrameGraphContext>>,
    rebuild_frame_graph: bool,
    retired: RetirementQueue<RetiredResource>,
    light_pool: LightUboPool,
    next_token: FrameToken,
}

impl ForwardFramePipeline {
    /// Creates a pipeline with the built-in pass names and submesh renderer.
    pub fn new(device: Arc<dyn GraphicsDevice>, settings: ForwardPipelineSettings) -> Self {
        Self::with_pass_registry(device, settings, &mut PassIndexRegistry::with_builtin_passes())
    }

    /// Creates a pipeline resolving its pass indices from `passes`.
    pub fn with_pass_registry(
        device: Arc<dyn GraphicsDevice>,
        settings: ForwardPipelineSettings,
        passes: &mut PassIndexRegistry,
    ) -> Self {
        let limits = device.limits();
        let depth_pass_index = passes.register_pass(DEPTH_PASS_NAME);
        let forward_pass_index = passes.register_pass(FORWARD_PASS_NAME);

        let mut context = FrameGraphContext::default();
        context
            .renderers
            .register(SUBMESH_ELEMENT_TYPE, Box::new(SubmeshRenderer));

        log::info!(
            "Forward frame pipeline created (depth prepass: {}, {} light blocks per chunk)",
            settings.depth_prepass,
            settings.light_blocks_per_chunk
        );

        Self {
            device,
            settings,
            limits,
            depth_pass_index,
            forward_pass_index,
            context,
            world_instances: SlotMap::with_key(),
            drawables: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            material_passes: RegisteredMaterialPasses::new(),
            invalidated_viewers: AHashSet::new(),
            invalidated_world_instances: AHashSet::new(),
            baked_graph: None,
            rebuild_frame_graph: true,
            retired: RetirementQueue::new(),
            light_pool: LightUboPool::new(),
            next_token: FrameToken::default(),
        }
    }

    /// The settings the pipeline was created with.
    pub fn settings(&self) -> &ForwardPipelineSettings {
        &self.settings
    }

    /// Returns a handle the host uses to report GPU frame completion.
    pub fn completion_signal(&self) -> CompletionSignal {
        self.retired.completion_signal()
    }

    // --- Viewers ---

    /// Registers a viewer, creating its uniform buffer and pipeline passes.
    ///
    /// Every material of the already registered drawables is registered with the
    /// new passes.
    pub fn register_viewer(
        &mut self,
        viewer: Box<dyn AbstractViewer>,
    ) -> Result<ViewerId, ResourceError> {
        let uniform_buffer = self.device.create_buffer(&BufferDescriptor::uniform(
            "Viewer uniform buffer",
            ViewerData::UNIFORM_SIZE,
        ))?;

        let depth_pass = self
            .settings
            .depth_prepass
            .then(|| DepthPipelinePass::new(self.depth_pass_index));
        let mut data = ViewerData {
            viewer,
            uniform_buffer,
            depth_pass,
            forward_pass: ForwardPipelinePass::new(self.forward_pass_index, &self.limits, &self.settings),
            baked_target: None,
            color_attachment: None,
        };
        for drawable in self.drawables.values() {
            data.register_renderable(drawable.renderable.as_ref(), &mut self.material_passes);
        }

        let id = self.context.viewers.insert(data);
        self.invalidated_viewers.insert(id);
        self.rebuild_frame_graph = true;
        log::info!("Viewer {:?} registered", id);
        Ok(id)
    }

    /// Unregisters a viewer and returns it. Its GPU resources go through deferred release.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a registered viewer.
    pub fn unregister_viewer(&mut self, id: ViewerId) -> Box<dyn AbstractViewer> {
        let Some(data) = self.context.viewers.remove(id) else {
            log::error!("Unregistering unknown viewer {:?}", id);
            panic!("viewer {:?} is not registered", id);
        };

        let mut frame = RenderFrame::new(&*self.device, self.next_token, &mut self.retired);
        let viewer = data.release(&mut frame, &mut self.material_passes);
        self.invalidated_viewers.remove(&id);
        self.rebuild_frame_graph = true;
        log::info!("Viewer {:?} unregistered", id);
        viewer
    }

    /// Marks the viewer's camera data for upload on the next frame.
    ///
    /// Re-bakes the frame graph if the render target, viewport or clear color changed.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a registered viewer.
    pub fn invalidate_viewer(&mut self, id: ViewerId) {
        let Some(viewer) = self.context.viewers.get(id) else {
            log::error!("Invalidating unknown viewer {:?}", id);
            panic!("viewer {:?} is not registered", id);
        };
        if viewer.target_changed() {
            log::debug!("Render target of viewer {:?} changed, frame graph will be rebuilt", id);
            self.rebuild_frame_graph = true;
        }
        self.invalidated_viewers.insert(id);
    }

    /// The registered viewer.
    pub fn viewer(&self, id: ViewerId) -> Option<&dyn AbstractViewer> {
        self.context.viewers.get(id).map(|data| data.viewer.as_ref())
    }

    /// The registered viewer, for modification. Call [`invalidate_viewer`](Self::invalidate_viewer) afterwards.
    pub fn viewer_mut(&mut self, id: ViewerId) -> Option<&mut dyn AbstractViewer> {
        match self.context.viewers.get_mut(id) {
            Some(data) => Some(data.viewer.as_mut()),
            None => None,
        }
    }

    /// The registered viewer as its concrete type.
    pub fn viewer_as_mut<V: AbstractViewer + 'static>(&mut self, id: ViewerId) -> Option<&mut V> {
        self.context
            .viewers
            .get_mut(id)?
            .viewer
            .as_any_mut()
            .downcast_mut::<V>()
    }

    /// Number of registered viewers.
    pub fn viewer_count(&self) -> usize {
        self.context.viewers.len()
    }

    // --- World instances ---

    /// Creates a world instance and its uniform buffer. The data is uploaded on the next frame.
    pub fn create_world_instance(&mut self, world_matrix: Mat4) -> Result<WorldInstanceId, ResourceError> {
        let uniform_buffer = self.device.create_buffer(&BufferDescriptor::uniform(
            "World instance uniform buffer",
            WorldInstance::UNIFORM_SIZE,
        ))?;
        let id = self.world_instances.insert(WorldInstanceEntry {
            instance: WorldInstance::new(world_matrix, uniform_buffer),
            drawables: 0,
        });
        self.invalidated_world_instances.insert(id);
        Ok(id)
    }

    /// Replaces the transform of a world instance and schedules its upload.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live world instance.
    pub fn update_world_instance(&mut self, id: WorldInstanceId, world_matrix: Mat4) {
        let Some(entry) = self.world_instances.get_mut(id) else {
            log::error!("Updating unknown world instance {:?}", id);
            panic!("world instance {:?} does not exist", id);
        };
        entry.instance.set_world_matrix(world_matrix);
        self.invalidated_world_instances.insert(id);
    }

    /// Schedules the upload of a world instance's data.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live world instance.
    pub fn invalidate_world_instance(&mut self, id: WorldInstanceId) {
        assert!(
            self.world_instances.contains_key(id),
            "world instance {:?} does not exist",
            id
        );
        self.invalidated_world_instances.insert(id);
    }

    /// Destroys a world instance. Its uniform buffer goes through deferred release.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live world instance, or if drawables are still attached to it.
    pub fn destroy_world_instance(&mut self, id: WorldInstanceId) {
        let Some(entry) = self.world_instances.get(id) else {
            log::error!("Destroying unknown world instance {:?}", id);
            panic!("world instance {:?} does not exist", id);
        };
        if entry.drawables > 0 {
            log::error!(
                "World instance {:?} destroyed with {} drawables attached",
                id,
                entry.drawables
            );
            panic!("world instance {:?} still has drawables attached", id);
        }

        if let Some(entry) = self.world_instances.remove(id) {
            let mut frame = RenderFrame::new(&*self.device, self.next_token, &mut self.retired);
            frame.push_for_release(RetiredResource::Buffer(entry.instance.uniform_buffer()));
        }
        self.invalidated_world_instances.remove(&id);
    }

    /// The world instance behind `id`.
    pub fn world_instance(&self, id: WorldInstanceId) -> Option<&WorldInstance> {
        self.world_instances.get(id).map(|entry| &entry.instance)
    }

    // --- Drawables ---

    /// Attaches a drawable to a world instance and registers its materials with every viewer pass.
    ///
    /// # Panics
    ///
    /// Panics if `world_instance` is not a live world instance.
    pub fn register_instanced_drawable(
        &mut self,
        world_instance: WorldInstanceId,
        renderable: Arc<dyn InstancedRenderable>,
    ) -> DrawableId {
        let Some(entry) = self.world_instances.get_mut(world_instance) else {
            log::error!("Drawable registered on unknown world instance {:?}", world_instance);
            panic!("world instance {:?} does not exist", world_instance);
        };
        entry.drawables += 1;

        for viewer in self.context.viewers.values_mut() {
            viewer.register_renderable(renderable.as_ref(), &mut self.material_passes);
        }
        let id = self.drawables.insert(RegisteredDrawable {
            renderable,
            world_instance,
        });
        log::debug!("Drawable {:?} registered on {:?}", id, world_instance);
        id
    }

    /// Detaches a drawable, unregistering its materials and forcing every pass to rebuild.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a registered drawable.
    pub fn unregister_instanced_drawable(&mut self, id: DrawableId) -> Arc<dyn InstancedRenderable> {
        let Some(drawable) = self.drawables.remove(id) else {
            log::error!("Unregistering unknown drawable {:?}", id);
            panic!("drawable {:?} is not registered", id);
        };
        if let Some(entry) = self.world_instances.get_mut(drawable.world_instance) {
            entry.drawables -= 1;
        }

        for viewer in self.context.viewers.values_mut() {
            viewer.unregister_renderable(drawable.renderable.as_ref(), &mut self.material_passes);
        }
        log::debug!("Drawable {:?} unregistered", id);
        drawable.renderable
    }

    // --- Lights ---

    /// Registers a light.
    pub fn register_light(&mut self, light: Box<dyn Light>) -> LightId {
        let id = self.lights.insert(light);
        log::debug!("Light {:?} registered", id);
        id
    }

    /// Unregisters a light, returning it, and forces every forward pass to rebuild.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a registered light.
    pub fn unregister_light(&mut self, id: LightId) -> Box<dyn Light> {
        let Some(light) = self.lights.remove(id) else {
            log::error!("Unregistering unknown light {:?}", id);
            panic!("light {:?} is not registered", id);
        };
        self.rebuild_forward_passes();
        light
    }

    /// The registered light.
    pub fn light(&self, id: LightId) -> Option<&dyn Light> {
        self.lights.get(id).map(|light| light.as_ref())
    }

    /// The registered light, for modification. Call [`invalidate_light`](Self::invalidate_light) afterwards.
    pub fn light_mut(&mut self, id: LightId) -> Option<&mut dyn Light> {
        match self.lights.get_mut(id) {
            Some(light) => Some(light.as_mut()),
            None => None,
        }
    }

    /// Forces every forward pass to reassign its lights on the next frame.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a registered light.
    pub fn invalidate_light(&mut self, id: LightId) {
        assert!(self.lights.contains_key(id), "light {:?} is not registered", id);
        self.rebuild_forward_passes();
    }

    fn rebuild_forward_passes(&mut self) {
        for viewer in self.context.viewers.values_mut() {
            viewer.forward_pass.force_rebuild();
        }
    }

    // --- Element renderers ---

    /// Installs the renderer of `element_type`.
    ///
    /// Replacing a renderer drops the data it created and rebuilds every pass.
    pub fn register_element_renderer(&mut self, element_type: usize, renderer: Box<dyn ElementRenderer>) {
        if self.context.renderers.register(element_type, renderer).is_some() {
            log::warn!("Element renderer of type {} replaced", element_type);
            for viewer in self.context.viewers.values_mut() {
                viewer.forget_element_renderer(element_type);
            }
        }
    }

    // --- Frame ---

    /// Produces one frame.
    ///
    /// Viewers absent from `visibility` see nothing. The returned statistics carry
    /// the token the host must signal once the GPU has finished the frame.
    pub fn render(&mut self, visibility: &FrameVisibility) -> Result<FrameStats, FramePipelineError> {
        let token = self.next_token;
        self.next_token = token.next();

        let completed = self.retired.sweep();
        let released = completed.len() as u32;
        for resource in completed {
            resource.release(&*self.device, &mut self.light_pool);
        }

        let mut frame = RenderFrame::new(&*self.device, token, &mut self.retired);
        frame.stats_mut().resources_released = released;

        for &id in &self.invalidated_viewers {
            let Some(viewer) = self.context.viewers.get(id) else {
                continue;
            };
            let data = viewer.viewer.viewer_instance().gpu_data();
            frame.upload(viewer.uniform_buffer, 0, bytemuck::bytes_of(&data))?;
        }
        self.invalidated_viewers.clear();

        for &id in &self.invalidated_world_instances {
            let Some(entry) = self.world_instances.get(id) else {
                continue;
            };
            let data = entry.instance.gpu_data();
            frame.upload(entry.instance.uniform_buffer(), 0, bytemuck::bytes_of(&data))?;
        }
        self.invalidated_world_instances.clear();

        if self.rebuild_frame_graph {
            if let Some(previous) = self.baked_graph.take() {
                previous.release(&mut frame);
            }
            if !self.context.viewers.is_empty() {
                let graph = build_frame_graph(&mut self.context.viewers, &self.settings);
                let baked = graph.bake(frame.device())?;
                log::debug!("Frame graph rebuilt for {} viewers", self.context.viewers.len());
                self.baked_graph = Some(baked);
                frame.stats_mut().frame_graph_baked = true;
            }
            self.rebuild_frame_graph = false;
        }

        let nothing_visible = ViewerVisibility::default();
        let FrameGraphContext { viewers, renderers } = &mut self.context;
        for (id, viewer) in viewers.iter_mut() {
            let viewer_visibility = visibility.get(id).unwrap_or(&nothing_visible);
            let renderables = resolve_renderables(
                &self.drawables,
                &self.world_instances,
                &viewer_visibility.renderables,
            )?;
            let lights = resolve_lights(&self.lights, &viewer_visibility.lights)?;
            viewer.prepare(
                &mut frame,
                renderers,
                &mut self.light_pool,
                &renderables,
                &lights,
                viewer_visibility.hash,
            )?;
        }

        if let Some(graph) = &mut self.baked_graph {
            graph.execute(&mut frame, &mut self.context);
        }

        let stats = frame.finish();
        log::trace!("Frame {:?} done: {:?}", token, stats);
        Ok(stats)
    }

    // --- Introspection ---

    /// The forward pass of a viewer.
    pub fn forward_pass(&self, id: ViewerId) -> Option<&ForwardPipelinePass> {
        self.context.viewers.get(id).map(|viewer| &viewer.forward_pass)
    }

    /// The depth prepass of a viewer, if prepasses are enabled.
    pub fn depth_pass(&self, id: ViewerId) -> Option<&DepthPipelinePass> {
        self.context.viewers.get(id)?.depth_pass.as_ref()
    }

    /// Whether any pipeline pass uses material pass `id`.
    pub fn is_material_pass_registered(&self, id: MaterialPassId) -> bool {
        self.material_passes.contains(id)
    }

    /// Number of distinct material passes in use.
    pub fn registered_material_pass_count(&self) -> usize {
        self.material_passes.len()
    }

    /// The texture a viewer's forward pass renders into, once the frame graph is baked.
    pub fn viewer_output_texture(&self, id: ViewerId) -> Option<TextureId> {
        let attachment = self.context.viewers.get(id)?.color_attachment?;
        self.baked_graph.as_ref()?.attachment_texture(attachment)
    }

    /// Names of the scheduled frame graph passes, in execution order.
    pub fn frame_graph_passes(&self) -> Vec<&str> {
        self.baked_graph
            .as_ref()
            .map_or_else(Vec::new, |graph| graph.pass_names().collect())
    }

    /// Number of light chunks waiting in the recycle pool.
    pub fn pooled_light_chunks(&self) -> usize {
        self.light_pool.len()
    }

    /// Number of resources waiting for their frame to complete.
    pub fn pending_releases(&self) -> usize {
        self.retired.len()
    }
}

impl Drop for ForwardFramePipeline {
    fn drop(&mut self) {
        let device = &*self.device;

        if let Some(graph) = self.baked_graph.take() {
            graph.destroy(device);
        }
        for viewer in self.context.viewers.values_mut() {
            viewer.forward_pass.destroy(device);
            if let Err(e) = device.destroy_buffer(viewer.uniform_buffer) {
                log::warn!("Failed to destroy viewer uniform buffer: {}", e);
            }
        }
        for entry in self.world_instances.values() {
            if let Err(e) = device.destroy_buffer(entry.instance.uniform_buffer()) {
                log::warn!("Failed to destroy world instance uniform buffer: {}", e);
            }
        }
        for resource in self.retired.drain_all() {
            resource.release(device, &mut self.light_pool);
        }
        self.light_pool.destroy_all(device);
        log::debug!("Forward frame pipeline destroyed");
    }
}

fn resolve_renderables<'a>(
    drawables: &'a SlotMap<DrawableId, RegisteredDrawable>,
    world_instances: &'a SlotMap<WorldInstanceId, WorldInstanceEntry>,
    ids: &[DrawableId],
) -> Result<Vec<VisibleRenderable<'a>>, FramePipelineError> {
    ids.iter()
        .map(|&id| {
            let drawable = drawables
                .get(id)
                .ok_or(FramePipelineError::StaleHandle { kind: "drawable" })?;
            let entry = world_instances
                .get(drawable.world_instance)
                .ok_or(FramePipelineError::StaleHandle {
                    kind: "world instance",
                })?;
            Ok(VisibleRenderable {
                renderable: drawable.renderable.as_ref(),
                world_instance: &entry.instance,
            })
        })
        .collect()
}

fn resolve_lights<'a>(
    lights: &'a SlotMap<LightId, Box<dyn Light>>,
    ids: &[LightId],
) -> Result<Vec<VisibleLight<'a>>, FramePipelineError> {
    ids.iter()
        .map(|&id| {
            let light = lights
                .get(id)
                .ok_or(FramePipelineError::StaleHandle { kind: "light" })?;
            Ok(VisibleLight {
                id,
                light: light.as_ref(),
            })
        })
        .collect()
}
