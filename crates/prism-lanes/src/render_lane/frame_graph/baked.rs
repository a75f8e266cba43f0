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

//! The executable form of a frame graph.

use super::{CommandCallback, ExecutionCallback, FramePassExecution};
use crate::render_lane::frame::{RenderFrame, RetiredResource};
use prism_core::math::Rect;
use prism_core::renderer::api::{
    CommandBufferId, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    TextureId,
};
use prism_core::renderer::GraphicsDevice;

pub(super) struct BakedPass<C> {
    pub(super) name: String,
    pub(super) color_attachments: Vec<RenderPassColorAttachment>,
    pub(super) depth_stencil: Option<RenderPassDepthStencilAttachment>,
    pub(super) render_area: Rect,
    pub(super) execution: Option<ExecutionCallback<C>>,
    pub(super) command: Option<CommandCallback<C>>,
    pub(super) command_buffer: Option<CommandBufferId>,
}

/// A scheduled frame graph with its attachment textures.
///
/// Valid only for the topology it was baked from; any change to passes or
/// attachments requires baking a new one and releasing this one.
pub struct BakedFrameGraph<C> {
    passes: Vec<BakedPass<C>>,
    attachment_textures: Vec<Option<TextureId>>,
    textures: Vec<TextureId>,
}

impl<C> BakedFrameGraph<C> {
    pub(super) fn new(
        passes: Vec<BakedPass<C>>,
        attachment_textures: Vec<Option<TextureId>>,
        textures: Vec<TextureId>,
    ) -> Self {
        Self {
            passes,
            attachment_textures,
            textures,
        }
    }

    /// Texture backing `attachment`, or `None` if no scheduled pass uses it.
    pub fn attachment_texture(&self, attachment: usize) -> Option<TextureId> {
        self.attachment_textures.get(attachment).copied().flatten()
    }

    /// Names of the scheduled passes, in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|pass| pass.name.as_str())
    }

    /// Number of textures created for the attachments.
    pub fn physical_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Runs every pass in order, recording only the passes that ask for it.
    pub fn execute(&mut self, frame: &mut RenderFrame<'_>, ctx: &mut C) {
        let device = frame.device();

        for pass in &mut self.passes {
            let BakedPass {
                name,
                color_attachments,
                depth_stencil,
                render_area,
                execution,
                command,
                command_buffer,
            } = pass;

            let mode = execution
                .as_ref()
                .map_or(FramePassExecution::Execute, |callback| callback(&*ctx));

            match (mode, *command_buffer) {
                (FramePassExecution::Skip, _) => {
                    log::trace!("Frame pass '{}' skipped", name);
                    frame.stats_mut().passes_skipped += 1;
                }
                (FramePassExecution::Execute, Some(cached)) => {
                    log::trace!("Frame pass '{}' replayed", name);
                    device.submit_command_buffer(cached);
                    frame.stats_mut().passes_replayed += 1;
                }
                _ => {
                    let mut encoder = device.create_command_encoder(Some(name.as_str()));
                    {
                        let descriptor = RenderPassDescriptor {
                            label: Some(name.as_str()),
                            color_attachments: color_attachments.as_slice(),
                            depth_stencil_attachment: *depth_stencil,
                        };
                        let mut render_pass = encoder.begin_render_pass(&descriptor);
                        if let Some(record) = command.as_mut() {
                            record(ctx, render_pass.as_mut(), *render_area);
                        }
                    }
                    let recorded = encoder.finish();

                    if let Some(previous) = command_buffer.replace(recorded) {
                        frame.push_for_release(RetiredResource::CommandBuffer(previous));
                    }
                    log::debug!("Frame pass '{}' recorded", name);
                    device.submit_command_buffer(recorded);
                    frame.stats_mut().passes_recorded += 1;
                }
            }
        }
    }

    /// Hands the textures and cached command buffers to deferred release.
    pub fn release(self, frame: &mut RenderFrame<'_>) {
        for pass in self.passes {
            if let Some(command_buffer) = pass.command_buffer {
                frame.push_for_release(RetiredResource::CommandBuffer(command_buffer));
            }
        }
        for texture in self.textures {
            frame.push_for_release(RetiredResource::Texture(texture));
        }
    }

    /// Destroys everything immediately. Only valid once the device is idle.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for pass in self.passes {
            if let Some(command_buffer) = pass.command_buffer {
                if let Err(e) = device.destroy_command_buffer(command_buffer) {
                    log::warn!("Failed to destroy command buffer {:?}: {}", command_buffer, e);
                }
            }
        }
        for texture in self.textures {
            if let Err(e) = device.destroy_texture(texture) {
                log::warn!("Failed to destroy attachment texture {:?}: {}", texture, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{FrameGraph, FramePassAttachment, FramePassExecution};
    use crate::error::FrameGraphError;
    use crate::render_lane::frame::RenderFrame;
    use crate::render_lane::mock::{MockDevice, Recorded};
    use prism_core::math::{Extent2D, LinearRgba};
    use prism_core::renderer::api::TextureFormat;
    use prism_core::renderer::{FrameToken, RetirementQueue};
    use std::sync::atomic::Ordering;

    const SIZE: Extent2D = Extent2D::new(64, 64);

    fn color_target(name: &str) -> FramePassAttachment {
        FramePassAttachment::new(name, TextureFormat::Rgba8UnormSrgb, SIZE)
    }

    fn depth(name: &str) -> FramePassAttachment {
        FramePassAttachment::new(name, TextureFormat::Depth32Float, SIZE)
    }

    #[derive(Default)]
    struct Ctx {
        mode: Option<FramePassExecution>,
        recorded: Vec<&'static str>,
    }

    #[test]
    fn test_bake_orders_by_dependencies_not_declaration() {
        let device = MockDevice::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let depth = graph.add_attachment(depth("Depth"));
        let color = graph.add_attachment(color_target("Color"));

        let forward = graph.add_pass("Forward");
        forward.add_output(color);
        forward.set_depth_stencil_input(depth);
        let prepass = graph.add_pass("Prepass");
        prepass.set_depth_stencil_output(depth);
        graph.add_backbuffer_output(color);

        let baked = graph.bake(&device).unwrap();
        assert_eq!(baked.pass_names().collect::<Vec<_>>(), vec!["Prepass", "Forward"]);
        assert_eq!(baked.physical_texture_count(), 2);
    }

    #[test]
    fn test_passes_not_reaching_backbuffer_are_culled() {
        let device = MockDevice::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let color = graph.add_attachment(color_target("Color"));
        let unused = graph.add_attachment(color_target("Debug"));

        graph.add_pass("Debug").add_output(unused);
        graph.add_pass("Main").add_output(color);
        graph.add_backbuffer_output(color);

        let baked = graph.bake(&device).unwrap();
        assert_eq!(baked.pass_names().collect::<Vec<_>>(), vec!["Main"]);
        assert!(baked.attachment_texture(unused).is_none());
        assert!(baked.attachment_texture(color).is_some());
        assert_eq!(MockDevice::count(&device.textures_created), 1);
    }

    #[test]
    fn test_non_overlapping_attachments_share_a_texture() {
        let device = MockDevice::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let a = graph.add_attachment(color_target("A"));
        let b = graph.add_attachment(color_target("B"));
        let c = graph.add_attachment(color_target("C"));
        let out = graph.add_attachment(color_target("Out"));

        graph.add_pass("WriteA").add_output(a);
        let pass = graph.add_pass("AToB");
        pass.add_input(a);
        pass.add_output(b);
        let pass = graph.add_pass("BToC");
        pass.add_input(b);
        pass.add_output(c);
        let pass = graph.add_pass("CToOut");
        pass.add_input(c);
        pass.add_output(out);
        graph.add_backbuffer_output(out);

        let baked = graph.bake(&device).unwrap();
        // A is dead once B is written, so C reuses A's texture; Out reuses B's.
        assert_eq!(baked.physical_texture_count(), 2);
        assert_eq!(baked.attachment_texture(a), baked.attachment_texture(c));
        assert_eq!(baked.attachment_texture(b), baked.attachment_texture(out));
        assert_ne!(baked.attachment_texture(a), baked.attachment_texture(b));
    }

    #[test]
    fn test_different_descriptors_never_alias() {
        let device = MockDevice::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let a = graph.add_attachment(color_target("A"));
        let b = graph.add_attachment(FramePassAttachment::new(
            "B",
            TextureFormat::Rgba16Float,
            SIZE,
        ));
        let c = graph.add_attachment(color_target("C"));

        graph.add_pass("WriteA").add_output(a);
        let pass = graph.add_pass("AToB");
        pass.add_input(a);
        pass.add_output(b);
        let pass = graph.add_pass("BToC");
        pass.add_input(b);
        pass.add_output(c);
        graph.add_backbuffer_output(c);

        let baked = graph.bake(&device).unwrap();
        assert_eq!(baked.attachment_texture(a), baked.attachment_texture(c));
        assert_eq!(baked.physical_texture_count(), 2);
    }

    #[test]
    fn test_cycle_is_reported_with_pass_names() {
        let device = MockDevice::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let x = graph.add_attachment(color_target("X"));
        let y = graph.add_attachment(color_target("Y"));

        let pass = graph.add_pass("A");
        pass.add_input(x);
        pass.add_output(y);
        let pass = graph.add_pass("B");
        pass.add_input(y);
        pass.add_output(x);
        graph.add_backbuffer_output(x);

        match graph.bake(&device) {
            Err(FrameGraphError::Cycle(names)) => assert_eq!(names, vec!["A", "B"]),
            other => panic!("expected a cycle, got {:?}", other.err()),
        }
        assert_eq!(MockDevice::count(&device.textures_created), 0);
    }

    #[test]
    fn test_invalid_declarations() {
        let device = MockDevice::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        graph.add_pass("Lonely").add_output(3);
        graph.add_backbuffer_output(3);
        assert!(matches!(
            graph.bake(&device),
            Err(FrameGraphError::UnknownAttachment { attachment: 3, .. })
        ));

        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let color = graph.add_attachment(color_target("Color"));
        graph.add_pass("Main").add_output(color);
        assert!(matches!(graph.bake(&device), Err(FrameGraphError::NoBackbufferOutput)));
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let device = MockDevice::new();
        device.fail_allocations.store(true, Ordering::Relaxed);
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let color = graph.add_attachment(color_target("Color"));
        graph.add_pass("Main").add_output(color);
        graph.add_backbuffer_output(color);

        match graph.bake(&device) {
            Err(FrameGraphError::Allocation { attachment, .. }) => assert_eq!(attachment, "Color"),
            other => panic!("expected an allocation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_execution_modes_record_replay_and_skip() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();

        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let color = graph.add_attachment(color_target("Color"));
        let pass = graph.add_pass("Main");
        let output = pass.add_output(color);
        pass.set_clear_color(output, LinearRgba::BLACK);
        pass.set_execution_callback(|ctx: &Ctx| ctx.mode.unwrap_or(FramePassExecution::Execute));
        pass.set_command_callback(|ctx: &mut Ctx, _pass, area| {
            assert_eq!(area.width, 64);
            ctx.recorded.push("Main");
        });
        graph.add_backbuffer_output(color);
        let mut baked = graph.bake(&device).unwrap();
        let mut ctx = Ctx::default();

        // First frame records even in Execute mode.
        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        baked.execute(&mut frame, &mut ctx);
        assert_eq!(frame.finish().passes_recorded, 1);

        let mut frame = RenderFrame::new(&device, FrameToken(1), &mut retired);
        baked.execute(&mut frame, &mut ctx);
        assert_eq!(frame.finish().passes_replayed, 1);

        ctx.mode = Some(FramePassExecution::Skip);
        let mut frame = RenderFrame::new(&device, FrameToken(2), &mut retired);
        baked.execute(&mut frame, &mut ctx);
        assert_eq!(frame.finish().passes_skipped, 1);

        ctx.mode = Some(FramePassExecution::UpdateAndExecute);
        let mut frame = RenderFrame::new(&device, FrameToken(3), &mut retired);
        baked.execute(&mut frame, &mut ctx);
        assert_eq!(frame.finish().passes_recorded, 1);

        assert_eq!(ctx.recorded, vec!["Main", "Main"]);
        assert_eq!(MockDevice::count(&device.submits), 3);
        // The replaced recording waits for frame 3 to complete.
        assert_eq!(retired.len(), 1);
        assert!(device
            .take_log()
            .iter()
            .all(|command| matches!(command, Recorded::BeginPass(Some(label)) if label == "Main")));
    }

    #[test]
    fn test_release_defers_textures_and_command_buffers() {
        let device = MockDevice::new();
        let mut retired = RetirementQueue::new();
        let mut graph: FrameGraph<Ctx> = FrameGraph::new();
        let color = graph.add_attachment(color_target("Color"));
        graph.add_pass("Main").add_output(color);
        graph.add_backbuffer_output(color);
        let mut baked = graph.bake(&device).unwrap();

        let mut frame = RenderFrame::new(&device, FrameToken(0), &mut retired);
        baked.execute(&mut frame, &mut Ctx::default());
        baked.release(&mut frame);
        drop(frame);

        assert_eq!(retired.len(), 2);
        assert_eq!(MockDevice::count(&device.textures_destroyed), 0);
    }
}
