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

//! Wiring of the per-viewer passes into one frame graph.

use super::viewer::{FrameGraphContext, TargetConfig, ViewerData};
use prism_core::renderer::api::ForwardPipelineSettings;
use prism_lanes::render_lane::{FrameGraph, FramePassAttachment, ViewerId};
use slotmap::SlotMap;

/// Depth value the depth attachment is cleared to.
const DEPTH_CLEAR: f32 = 1.0;

/// Declares a color and a depth attachment per viewer, the optional depth
/// prepass writing depth, and the forward pass drawing into the color output.
///
/// Records in every viewer the target configuration and color attachment the
/// graph is built for.
pub(crate) fn build_frame_graph(
    viewers: &mut SlotMap<ViewerId, ViewerData>,
    settings: &ForwardPipelineSettings,
) -> FrameGraph<FrameGraphContext> {
    let mut graph = FrameGraph::new();

    for (index, (id, viewer)) in viewers.iter_mut().enumerate() {
        let target = TargetConfig::of(viewer.viewer.as_ref());

        let color = graph.add_attachment(FramePassAttachment::new(
            format!("Viewer{index} color"),
            settings.color_format,
            target.size,
        ));
        let depth = graph.add_attachment(FramePassAttachment::new(
            format!("Viewer{index} depth"),
            settings.depth_format,
            target.size,
        ));

        if viewer.depth_pass.is_some() {
            let pass = graph.add_pass(format!("Viewer{index} depth prepass"));
            pass.set_depth_stencil_output(depth);
            pass.set_depth_stencil_clear(DEPTH_CLEAR, 0);
            pass.set_execution_callback(move |ctx: &FrameGraphContext| ctx.depth_execution(id));
            pass.set_command_callback(move |ctx: &mut FrameGraphContext, render_pass, _| {
                ctx.record_depth(id, render_pass)
            });
        }

        let pass = graph.add_pass(format!("Viewer{index} forward pass"));
        let output = pass.add_output(color);
        pass.set_clear_color(output, target.clear_color);
        if viewer.depth_pass.is_some() {
            pass.set_depth_stencil_input(depth);
        } else {
            pass.set_depth_stencil_output(depth);
            pass.set_depth_stencil_clear(DEPTH_CLEAR, 0);
        }
        pass.set_execution_callback(move |ctx: &FrameGraphContext| ctx.forward_execution(id));
        pass.set_command_callback(move |ctx: &mut FrameGraphContext, render_pass, _| {
            ctx.record_forward(id, render_pass)
        });

        graph.add_backbuffer_output(color);
        viewer.baked_target = Some(target);
        viewer.color_attachment = Some(color);
    }

    graph
}
