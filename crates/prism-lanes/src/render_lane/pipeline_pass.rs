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

//! State shared by the per-viewer pipeline passes.
//!
//! A pipeline pass owns the render elements of one viewer for one material pass
//! index. It rebuilds them only when the visibility hash changes or a rebuild was
//! forced, re-sorts them every frame, prepares the element renderers after each
//! rebuild, and records commands only when something they depend on changed.

use super::element::{ElementId, QueuedElement, RenderElement, RenderStates};
use super::element_renderer::{ElementRendererDataSet, ElementRendererRegistry, ViewerContext};
use super::frame::{RenderFrame, RetiredResource};
use super::frame_graph::FramePassExecution;
use super::material_tracker::MaterialPassTracker;
use super::render_queue::{RenderQueue, RenderQueueRegistry};
use super::visibility::VisibleRenderable;
use crate::error::FramePipelineError;
use prism_core::math::Rect;
use prism_core::renderer::{Material, MaterialPass, MaterialPassId, RenderPass, ViewerInstance};
use std::sync::Arc;

pub(crate) struct PassState {
    name: &'static str,
    pass_index: usize,
    elements: Vec<Box<dyn RenderElement>>,
    render_states: Vec<RenderStates>,
    queue: RenderQueue<ElementId>,
    registry: RenderQueueRegistry,
    renderer_data: ElementRendererDataSet,
    materials: MaterialPassTracker,
    last_visibility_hash: Option<u64>,
    force_rebuild: bool,
    prepare_renderers: bool,
    rebuild_commands: bool,
}

impl PassState {
    pub(crate) fn new(name: &'static str, pass_index: usize) -> Self {
        Self {
            name,
            pass_index,
            elements: Vec::new(),
            render_states: Vec::new(),
            queue: RenderQueue::new(),
            registry: RenderQueueRegistry::new(),
            renderer_data: ElementRendererDataSet::new(),
            materials: MaterialPassTracker::new(),
            last_visibility_hash: None,
            force_rebuild: false,
            prepare_renderers: false,
            rebuild_commands: false,
        }
    }

    pub(crate) fn pass_index(&self) -> usize {
        self.pass_index
    }

    /// Returns the material pass if this is its first user in this pass.
    pub(crate) fn register_material(&mut self, material: &Material) -> Option<Arc<MaterialPass>> {
        let pass = material.pass(self.pass_index)?;
        self.materials.register(pass).then(|| pass.clone())
    }

    /// Returns the material pass id if its last user in this pass is gone.
    pub(crate) fn unregister_material(&mut self, material: &Material) -> Option<MaterialPassId> {
        let id = material.pass(self.pass_index)?.id();
        self.materials.unregister(id).then_some(id)
    }

    pub(crate) fn drain_materials(&mut self) -> Vec<MaterialPassId> {
        self.materials.drain().into_iter().map(|(id, _)| id).collect()
    }

    pub(crate) fn tracks_material_pass(&self, id: MaterialPassId) -> bool {
        self.materials.contains(id)
    }

    pub(crate) fn force_rebuild(&mut self) {
        self.force_rebuild = true;
    }

    /// Folds material version changes into the rebuild flags.
    pub(crate) fn poll_materials(&mut self) {
        let invalidation = self.materials.poll_invalidations();
        if invalidation.rebuild_elements {
            log::debug!("{}: material pipeline changed, rebuilding elements", self.name);
            self.force_rebuild = true;
        }
        if invalidation.rebuild_commands {
            log::debug!("{}: shader bindings changed, recording commands again", self.name);
            self.rebuild_commands = true;
        }
    }

    /// Drops the renderer data of `element_type` and rebuilds from scratch.
    pub(crate) fn forget_element_renderer(&mut self, element_type: usize) {
        if self.renderer_data.remove(element_type).is_some() {
            log::debug!("{}: dropped renderer data of element type {}", self.name, element_type);
        }
        self.force_rebuild = true;
    }

    pub(crate) fn needs_rebuild(&self, visibility_hash: u64) -> bool {
        self.force_rebuild || self.last_visibility_hash != Some(visibility_hash)
    }

    /// Retires the current elements and empties the queue.
    pub(crate) fn begin_rebuild(&mut self, frame: &mut RenderFrame<'_>) {
        if !self.elements.is_empty() {
            let elements = std::mem::take(&mut self.elements);
            frame.push_for_release(RetiredResource::Elements(elements));
        }
        self.render_states.clear();
        self.queue.clear();
        self.registry.clear();
        // A failed rebuild must be retried next frame.
        self.last_visibility_hash = None;
        frame.stats_mut().element_rebuilds += 1;
    }

    /// Builds and queues the elements of `renderable`, all sharing `states`.
    pub(crate) fn add_elements(&mut self, renderable: &VisibleRenderable<'_>, states: RenderStates) {
        let first = self.elements.len();
        renderable
            .renderable
            .build_elements(self.pass_index, renderable.world_instance, &mut self.elements);

        for index in first..self.elements.len() {
            let element = &self.elements[index];
            element.register(&mut self.registry);
            self.queue.insert(ElementId(index as u32), element.element_type());
            self.render_states.push(states);
        }
    }

    pub(crate) fn end_rebuild(&mut self, visibility_hash: u64) {
        self.registry.finalize();
        self.last_visibility_hash = Some(visibility_hash);
        self.force_rebuild = false;
        self.prepare_renderers = true;
        log::debug!("{}: rebuilt {} render elements", self.name, self.elements.len());
    }

    pub(crate) fn sort(&mut self, viewer: &ViewerInstance) {
        let elements = &self.elements;
        let registry = &self.registry;
        self.queue
            .sort(|id| elements[id.index()].sorting_score(viewer, registry));
    }

    /// Runs reset, prepare and prepare_end of every element renderer after a rebuild.
    pub(crate) fn prepare_renderers(
        &mut self,
        frame: &mut RenderFrame<'_>,
        viewer: &ViewerContext<'_>,
        renderers: &ElementRendererRegistry,
    ) -> Result<(), FramePipelineError> {
        if !self.prepare_renderers {
            return Ok(());
        }

        for (element_type, renderer) in renderers.iter() {
            let data = self.renderer_data.get_or_instantiate(element_type, renderer);
            renderer.reset(data, frame);
        }

        let elements = &self.elements;
        let render_states = &self.render_states;
        let renderer_data = &mut self.renderer_data;
        let mut group_states: Vec<RenderStates> = Vec::new();
        let mut result = Ok(());

        self.queue.process(&self.registry, |element_type, ids| {
            if result.is_err() {
                return;
            }
            let Some(renderer) = renderers.get(element_type) else {
                result = Err(FramePipelineError::MissingElementRenderer(element_type));
                return;
            };

            let queued = queued_elements(elements, ids);
            group_states.clear();
            group_states.extend(ids.iter().map(|id| render_states[id.index()]));

            let data = renderer_data.get_or_instantiate(element_type, renderer);
            if let Err(e) = renderer.prepare(viewer, data, frame, &queued, &group_states) {
                result = Err(e.into());
            }
        });
        result?;

        for (element_type, renderer) in renderers.iter() {
            let data = self.renderer_data.get_or_instantiate(element_type, renderer);
            renderer.prepare_end(frame, data)?;
        }

        self.prepare_renderers = false;
        self.rebuild_commands = true;
        frame.stats_mut().renderer_preparations += 1;
        Ok(())
    }

    pub(crate) fn execution_mode(&self) -> FramePassExecution {
        if self.rebuild_commands {
            FramePassExecution::UpdateAndExecute
        } else {
            FramePassExecution::Execute
        }
    }

    /// Emits the draws of every queued element, grouped by element type.
    pub(crate) fn record(
        &mut self,
        viewer: &ViewerContext<'_>,
        viewport: Rect,
        renderers: &ElementRendererRegistry,
        pass: &mut dyn RenderPass,
    ) {
        pass.set_scissor(viewport);
        pass.set_viewport(viewport);

        let elements = &self.elements;
        let renderer_data = &self.renderer_data;
        let name = self.name;
        self.queue.process(&self.registry, |element_type, ids| {
            let (Some(renderer), Some(data)) = (renderers.get(element_type), renderer_data.get(element_type))
            else {
                log::error!("{}: element type {} recorded without being prepared", name, element_type);
                return;
            };
            renderer.render(viewer, data, pass, &queued_elements(elements, ids));
        });

        self.rebuild_commands = false;
    }

    /// Hands the elements to deferred release.
    pub(crate) fn release(&mut self, frame: &mut RenderFrame<'_>) {
        if !self.elements.is_empty() {
            frame.push_for_release(RetiredResource::Elements(std::mem::take(&mut self.elements)));
        }
        self.render_states.clear();
        self.queue.clear();
        self.registry.clear();
        self.last_visibility_hash = None;
    }

    pub(crate) fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn render_states(&self) -> &[RenderStates] {
        &self.render_states
    }

    pub(crate) fn queued_order(&self) -> &[ElementId] {
        self.queue.items()
    }

    pub(crate) fn is_rebuild_forced(&self) -> bool {
        self.force_rebuild
    }

    pub(crate) fn is_command_rebuild_pending(&self) -> bool {
        self.rebuild_commands
    }

    pub(crate) fn tracked_material_passes(&self) -> usize {
        self.materials.len()
    }
}

fn queued_elements<'a>(elements: &'a [Box<dyn RenderElement>], ids: &[ElementId]) -> Vec<QueuedElement<'a>> {
    ids.iter()
        .map(|&id| QueuedElement {
            id,
            element: &*elements[id.index()],
        })
        .collect()
}
