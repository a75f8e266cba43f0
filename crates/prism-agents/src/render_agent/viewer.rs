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

//! Per-viewer state and the context handed to the frame graph callbacks.

use prism_core::math::{Extent2D, LinearRgba, Rect};
use prism_core::renderer::api::{BufferId, BufferView};
use prism_core::renderer::{AbstractViewer, GpuViewerData, Material, RenderPass};
use prism_lanes::render_lane::{
    DepthPipelinePass, ElementRendererRegistry, ForwardPipelinePass, FramePassExecution,
    InstancedRenderable, LightUboPool, RegisteredMaterialPasses, RenderFrame, RetiredResource,
    ViewerContext, ViewerId, VisibleLight, VisibleRenderable,
};
use prism_lanes::FramePipelineError;
use slotmap::SlotMap;

/// Render target configuration a frame graph was baked with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TargetConfig {
    pub(crate) size: Extent2D,
    pub(crate) viewport: Rect,
    pub(crate) clear_color: LinearRgba,
}

impl TargetConfig {
    pub(crate) fn of(viewer: &dyn AbstractViewer) -> Self {
        Self {
            size: viewer.target_size(),
            viewport: viewer.viewport(),
            clear_color: viewer.clear_color(),
        }
    }
}

/// A registered viewer with its uniform buffer and pipeline passes.
pub(crate) struct ViewerData {
    pub(crate) viewer: Box<dyn AbstractViewer>,
    pub(crate) uniform_buffer: BufferId,
    pub(crate) depth_pass: Option<DepthPipelinePass>,
    pub(crate) forward_pass: ForwardPipelinePass,
    /// Target configuration of the current baked graph.
    pub(crate) baked_target: Option<TargetConfig>,
    /// Index of the color attachment in the current baked graph.
    pub(crate) color_attachment: Option<usize>,
}

impl ViewerData {
    pub(crate) const UNIFORM_SIZE: u64 = std::mem::size_of::<GpuViewerData>() as u64;

    pub(crate) fn uniform_view(&self) -> BufferView {
        BufferView::new(self.uniform_buffer, 0, Self::UNIFORM_SIZE)
    }

    /// Whether the target differs from the one the frame graph was baked with.
    pub(crate) fn target_changed(&self) -> bool {
        self.baked_target != Some(TargetConfig::of(self.viewer.as_ref()))
    }

    /// Registers every material of `renderable` with the viewer passes.
    pub(crate) fn register_renderable(
        &mut self,
        renderable: &dyn InstancedRenderable,
        registered: &mut RegisteredMaterialPasses,
    ) {
        for material in (0..renderable.material_count()).filter_map(|i| renderable.material(i)) {
            self.register_material(material, registered);
        }
    }

    /// Unregisters every material of `renderable` and forces a rebuild of the passes.
    pub(crate) fn unregister_renderable(
        &mut self,
        renderable: &dyn InstancedRenderable,
        registered: &mut RegisteredMaterialPasses,
    ) {
        for material in (0..renderable.material_count()).filter_map(|i| renderable.material(i)) {
            self.unregister_material(material, registered);
        }
        self.force_rebuild();
    }

    fn register_material(&mut self, material: &Material, registered: &mut RegisteredMaterialPasses) {
        if let Some(pass) = self.depth_pass.as_mut().and_then(|p| p.register_material(material)) {
            registered.register(&pass);
        }
        if let Some(pass) = self.forward_pass.register_material(material) {
            registered.register(&pass);
        }
    }

    fn unregister_material(&mut self, material: &Material, registered: &mut RegisteredMaterialPasses) {
        if let Some(id) = self.depth_pass.as_mut().and_then(|p| p.unregister_material(material)) {
            registered.unregister(id, 1);
        }
        if let Some(id) = self.forward_pass.unregister_material(material) {
            registered.unregister(id, 1);
        }
    }

    pub(crate) fn force_rebuild(&mut self) {
        if let Some(depth_pass) = &mut self.depth_pass {
            depth_pass.force_rebuild();
        }
        self.forward_pass.force_rebuild();
    }

    pub(crate) fn forget_element_renderer(&mut self, element_type: usize) {
        if let Some(depth_pass) = &mut self.depth_pass {
            depth_pass.forget_element_renderer(element_type);
        }
        self.forward_pass.forget_element_renderer(element_type);
    }

    /// Runs the depth pass then the forward pass preparation for this frame.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn prepare(
        &mut self,
        frame: &mut RenderFrame<'_>,
        renderers: &ElementRendererRegistry,
        light_pool: &mut LightUboPool,
        renderables: &[VisibleRenderable<'_>],
        lights: &[VisibleLight<'_>],
        visibility_hash: u64,
    ) -> Result<(), FramePipelineError> {
        let uniform_buffer = self.uniform_view();
        let context = ViewerContext {
            instance: self.viewer.viewer_instance(),
            uniform_buffer,
        };

        if let Some(depth_pass) = &mut self.depth_pass {
            depth_pass.prepare(frame, &context, renderers, renderables, visibility_hash)?;
        }
        self.forward_pass
            .prepare(frame, &context, renderers, light_pool, renderables, lights, visibility_hash)
    }

    /// Hands every GPU resource of the viewer to deferred release, returning the viewer.
    pub(crate) fn release(
        mut self,
        frame: &mut RenderFrame<'_>,
        registered: &mut RegisteredMaterialPasses,
    ) -> Box<dyn AbstractViewer> {
        if let Some(depth_pass) = &mut self.depth_pass {
            for id in depth_pass.drain_materials() {
                registered.unregister(id, 1);
            }
            depth_pass.release(frame);
        }
        for id in self.forward_pass.drain_materials() {
            registered.unregister(id, 1);
        }
        self.forward_pass.release(frame);
        frame.push_for_release(RetiredResource::Buffer(self.uniform_buffer));
        self.viewer
    }
}

/// What the frame graph callbacks see: the viewers and the element renderers.
#[derive(Default)]
pub(crate) struct FrameGraphContext {
    pub(crate) viewers: SlotMap<ViewerId, ViewerData>,
    pub(crate) renderers: ElementRendererRegistry,
}

impl FrameGraphContext {
    pub(crate) fn depth_execution(&self, id: ViewerId) -> FramePassExecution {
        self.viewers
            .get(id)
            .and_then(|viewer| viewer.depth_pass.as_ref())
            .map_or(FramePassExecution::Skip, DepthPipelinePass::execution_mode)
    }

    pub(crate) fn forward_execution(&self, id: ViewerId) -> FramePassExecution {
        self.viewers
            .get(id)
            .map_or(FramePassExecution::Skip, |viewer| viewer.forward_pass.execution_mode())
    }

    pub(crate) fn record_depth(&mut self, id: ViewerId, pass: &mut dyn RenderPass) {
        let Some(viewer) = self.viewers.get_mut(id) else {
            log::warn!("Depth pass of unregistered viewer {:?} skipped", id);
            return;
        };
        let uniform_buffer = viewer.uniform_view();
        let context = ViewerContext {
            instance: viewer.viewer.viewer_instance(),
            uniform_buffer,
        };
        if let Some(depth_pass) = &mut viewer.depth_pass {
            depth_pass.record(&context, viewer.viewer.viewport(), &self.renderers, pass);
        }
    }

    pub(crate) fn record_forward(&mut self, id: ViewerId, pass: &mut dyn RenderPass) {
        let Some(viewer) = self.viewers.get_mut(id) else {
            log::warn!("Forward pass of unregistered viewer {:?} skipped", id);
            return;
        };
        let uniform_buffer = viewer.uniform_view();
        let context = ViewerContext {
            instance: viewer.viewer.viewer_instance(),
            uniform_buffer,
        };
        viewer
            .forward_pass
            .record(&context, viewer.viewer.viewport(), &self.renderers, pass);
    }
}
