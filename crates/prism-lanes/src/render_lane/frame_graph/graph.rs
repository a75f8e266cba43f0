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

//! Graph declaration and baking.

use super::baked::{BakedFrameGraph, BakedPass};
use super::{CommandCallback, ExecutionCallback, FramePassAttachment, FramePassExecution};
use crate::error::FrameGraphError;
use prism_core::graph::topological_sort;
use prism_core::math::{LinearRgba, Rect};
use prism_core::renderer::api::{
    LoadOp, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment, StoreOp,
    TextureDescriptor, TextureFormat, TextureId, TextureUsage,
};
use prism_core::renderer::{GraphicsDevice, RenderPass};
use std::borrow::Cow;

/// One pass of a [`FrameGraph`].
pub struct FramePass<C> {
    pub(super) name: String,
    pub(super) inputs: Vec<usize>,
    pub(super) outputs: Vec<usize>,
    pub(super) clear_colors: Vec<Option<LinearRgba>>,
    pub(super) depth_stencil_input: Option<usize>,
    pub(super) depth_stencil_output: Option<usize>,
    pub(super) depth_clear: Option<f32>,
    pub(super) stencil_clear: Option<u32>,
    pub(super) execution: Option<ExecutionCallback<C>>,
    pub(super) command: Option<CommandCallback<C>>,
}

impl<C> FramePass<C> {
    fn new(name: String) -> Self {
        Self {
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            clear_colors: Vec::new(),
            depth_stencil_input: None,
            depth_stencil_output: None,
            depth_clear: None,
            stencil_clear: None,
            execution: None,
            command: None,
        }
    }

    /// Name of the pass.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares that the pass samples `attachment`. Returns the input index.
    pub fn add_input(&mut self, attachment: usize) -> usize {
        self.inputs.push(attachment);
        self.inputs.len() - 1
    }

    /// Declares that the pass renders into `attachment`. Returns the output index.
    pub fn add_output(&mut self, attachment: usize) -> usize {
        self.outputs.push(attachment);
        self.clear_colors.push(None);
        self.outputs.len() - 1
    }

    /// Clears output `output_index` with `color` before drawing instead of loading it.
    ///
    /// # Panics
    ///
    /// Panics if `output_index` was not returned by [`add_output`](Self::add_output).
    pub fn set_clear_color(&mut self, output_index: usize, color: LinearRgba) {
        assert!(
            output_index < self.clear_colors.len(),
            "pass '{}' has no output {}",
            self.name,
            output_index
        );
        self.clear_colors[output_index] = Some(color);
    }

    /// Uses `attachment` as depth-stencil buffer for testing, without writing it.
    pub fn set_depth_stencil_input(&mut self, attachment: usize) {
        self.depth_stencil_input = Some(attachment);
    }

    /// Writes depth-stencil values into `attachment`.
    pub fn set_depth_stencil_output(&mut self, attachment: usize) {
        self.depth_stencil_output = Some(attachment);
    }

    /// Clears the depth-stencil output to these values before drawing.
    pub fn set_depth_stencil_clear(&mut self, depth: f32, stencil: u32) {
        self.depth_clear = Some(depth);
        self.stencil_clear = Some(stencil);
    }

    /// Installs the per-frame execution mode selector. Without one, the pass replays.
    pub fn set_execution_callback(
        &mut self,
        callback: impl Fn(&C) -> FramePassExecution + Send + 'static,
    ) {
        self.execution = Some(Box::new(callback));
    }

    /// Installs the command recording callback.
    pub fn set_command_callback(
        &mut self,
        callback: impl FnMut(&mut C, &mut dyn RenderPass, Rect) + Send + 'static,
    ) {
        self.command = Some(Box::new(callback));
    }

    fn reads(&self) -> impl Iterator<Item = usize> + '_ {
        self.inputs.iter().copied().chain(self.depth_stencil_input)
    }

    fn writes(&self) -> impl Iterator<Item = usize> + '_ {
        self.outputs.iter().copied().chain(self.depth_stencil_output)
    }
}

/// A frame graph under construction. `C` is the context handed to pass callbacks.
pub struct FrameGraph<C> {
    attachments: Vec<FramePassAttachment>,
    passes: Vec<FramePass<C>>,
    backbuffer_outputs: Vec<usize>,
}

impl<C> Default for FrameGraph<C> {
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            passes: Vec::new(),
            backbuffer_outputs: Vec::new(),
        }
    }
}

impl<C> FrameGraph<C> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a logical attachment, returning its index.
    pub fn add_attachment(&mut self, attachment: FramePassAttachment) -> usize {
        self.attachments.push(attachment);
        self.attachments.len() - 1
    }

    /// Adds a pass. Declaration order breaks ties between independent passes.
    pub fn add_pass(&mut self, name: impl Into<String>) -> &mut FramePass<C> {
        self.passes.push(FramePass::new(name.into()));
        let index = self.passes.len() - 1;
        &mut self.passes[index]
    }

    /// Marks `attachment` as a result of the graph. Passes not contributing to one are culled.
    pub fn add_backbuffer_output(&mut self, attachment: usize) {
        if !self.backbuffer_outputs.contains(&attachment) {
            self.backbuffer_outputs.push(attachment);
        }
    }

    /// Number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    fn validate(&self) -> Result<(), FrameGraphError> {
        let attachment_count = self.attachments.len();
        for pass in &self.passes {
            if let Some(attachment) = pass.reads().chain(pass.writes()).find(|&a| a >= attachment_count) {
                return Err(FrameGraphError::UnknownAttachment {
                    pass: pass.name.clone(),
                    attachment,
                });
            }
        }
        if let Some(&attachment) = self.backbuffer_outputs.iter().find(|&&a| a >= attachment_count) {
            return Err(FrameGraphError::UnknownAttachment {
                pass: "<backbuffer>".to_owned(),
                attachment,
            });
        }
        if self.backbuffer_outputs.is_empty() {
            return Err(FrameGraphError::NoBackbufferOutput);
        }
        Ok(())
    }

    /// Producer → consumer edges between passes, in declaration order.
    ///
    /// A read depends on the closest writer declared before the reader, or on every
    /// later writer when there is none. Two writers of the same attachment run in
    /// declaration order.
    fn dependency_edges(&self) -> Vec<(usize, usize)> {
        let mut writers: Vec<Vec<usize>> = vec![Vec::new(); self.attachments.len()];
        for (index, pass) in self.passes.iter().enumerate() {
            for attachment in pass.writes() {
                if writers[attachment].last() != Some(&index) {
                    writers[attachment].push(index);
                }
            }
        }

        let mut edges = Vec::new();
        for (index, pass) in self.passes.iter().enumerate() {
            for attachment in pass.reads() {
                let attachment_writers = &writers[attachment];
                match attachment_writers.iter().rev().find(|&&w| w < index) {
                    Some(&writer) => edges.push((writer, index)),
                    None => edges.extend(
                        attachment_writers
                            .iter()
                            .filter(|&&w| w > index)
                            .map(|&w| (w, index)),
                    ),
                }
            }
            for attachment in pass.writes() {
                if let Some(&writer) = writers[attachment].iter().rev().find(|&&w| w < index) {
                    edges.push((writer, index));
                }
            }
        }
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    /// Passes contributing to a backbuffer output, in declaration order.
    fn contributing_passes(&self, edges: &[(usize, usize)]) -> Vec<bool> {
        let mut needed = vec![false; self.passes.len()];
        let mut stack: Vec<usize> = Vec::new();
        for &output in &self.backbuffer_outputs {
            if let Some(last_writer) = self.passes.iter().rposition(|pass| pass.writes().any(|a| a == output)) {
                stack.push(last_writer);
            } else {
                log::warn!(
                    "Backbuffer output '{}' is never written",
                    self.attachments[output].name
                );
            }
        }

        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut needed[index], true) {
                continue;
            }
            stack.extend(
                edges
                    .iter()
                    .filter(|&&(_, consumer)| consumer == index)
                    .map(|&(producer, _)| producer),
            );
        }
        needed
    }

    /// Resolves the schedule and allocates the attachment textures.
    pub fn bake(self, device: &dyn GraphicsDevice) -> Result<BakedFrameGraph<C>, FrameGraphError> {
        self.validate()?;

        let edges = self.dependency_edges();
        let needed = self.contributing_passes(&edges);
        for (pass, _) in self.passes.iter().zip(&needed).filter(|(_, needed)| !**needed) {
            log::debug!("Frame pass '{}' culled: it does not reach a backbuffer output", pass.name);
        }

        let kept = (0..self.passes.len()).filter(|&i| needed[i]);
        let order = topological_sort(kept, edges.iter().copied()).map_err(|cycle| {
            FrameGraphError::Cycle(
                cycle
                    .unresolved
                    .iter()
                    .map(|&i| self.passes[i].name.clone())
                    .collect(),
            )
        })?;

        // Lifetimes as [first, last] positions in the schedule.
        let mut lifetimes: Vec<Option<(usize, usize)>> = vec![None; self.attachments.len()];
        for (position, &index) in order.iter().enumerate() {
            let pass = &self.passes[index];
            for attachment in pass.reads().chain(pass.writes()) {
                let lifetime = lifetimes[attachment].get_or_insert((position, position));
                lifetime.1 = position;
            }
        }
        for &output in &self.backbuffer_outputs {
            if let Some(lifetime) = lifetimes[output].as_mut() {
                lifetime.1 = usize::MAX;
            }
        }

        let (attachment_textures, textures) = self.allocate_textures(device, &lifetimes)?;

        let mut passes: Vec<Option<FramePass<C>>> = self.passes.into_iter().map(Some).collect();
        let attachments = self.attachments;
        let baked_passes = order
            .iter()
            .filter_map(|&index| passes[index].take())
            .map(|pass| bake_pass(pass, &attachments, &attachment_textures))
            .collect::<Vec<_>>();

        log::info!(
            "Frame graph baked: {} passes scheduled, {} attachments backed by {} textures",
            baked_passes.len(),
            attachments.len(),
            textures.len()
        );

        Ok(BakedFrameGraph::new(
            baked_passes,
            attachment_textures,
            textures,
        ))
    }

    /// Backs every live attachment with a texture, reusing textures whose users are done.
    #[allow(clippy::type_complexity)]
    fn allocate_textures(
        &self,
        device: &dyn GraphicsDevice,
        lifetimes: &[Option<(usize, usize)>],
    ) -> Result<(Vec<Option<TextureId>>, Vec<TextureId>), FrameGraphError> {
        let mut by_first_use: Vec<(usize, (usize, usize))> = lifetimes
            .iter()
            .enumerate()
            .filter_map(|(index, lifetime)| lifetime.map(|l| (index, l)))
            .collect();
        by_first_use.sort_by_key(|&(index, (first, _))| (first, index));

        struct Physical {
            texture: TextureId,
            format: TextureFormat,
            size: prism_core::math::Extent2D,
            last_use: usize,
        }

        let mut attachment_textures = vec![None; self.attachments.len()];
        let mut physical: Vec<Physical> = Vec::new();

        for (index, (first, last)) in by_first_use {
            let attachment = &self.attachments[index];
            let reusable = physical.iter_mut().find(|p| {
                p.format == attachment.format && p.size == attachment.size && p.last_use < first
            });

            let texture = match reusable {
                Some(p) => {
                    p.last_use = last;
                    p.texture
                }
                None => {
                    let mut usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
                    if self.backbuffer_outputs.contains(&index) {
                        usage |= TextureUsage::COPY_SRC;
                    }
                    let descriptor = TextureDescriptor {
                        label: Some(Cow::Borrowed(attachment.name.as_str())),
                        size: attachment.size,
                        format: attachment.format,
                        usage,
                    };
                    let texture = match device.create_texture(&descriptor) {
                        Ok(texture) => texture,
                        Err(source) => {
                            for p in &physical {
                                if let Err(e) = device.destroy_texture(p.texture) {
                                    log::warn!("Failed to destroy texture {:?}: {}", p.texture, e);
                                }
                            }
                            return Err(FrameGraphError::Allocation {
                                attachment: attachment.name.clone(),
                                source,
                            });
                        }
                    };
                    physical.push(Physical {
                        texture,
                        format: attachment.format,
                        size: attachment.size,
                        last_use: last,
                    });
                    texture
                }
            };
            attachment_textures[index] = Some(texture);
        }

        Ok((
            attachment_textures,
            physical.into_iter().map(|p| p.texture).collect(),
        ))
    }
}

fn bake_pass<C>(
    pass: FramePass<C>,
    attachments: &[FramePassAttachment],
    attachment_textures: &[Option<TextureId>],
) -> BakedPass<C> {
    let texture_of = |attachment: usize| match attachment_textures[attachment] {
        Some(texture) => texture,
        None => panic!("scheduled attachment {} has no texture", attachment),
    };

    let color_attachments = pass
        .outputs
        .iter()
        .zip(&pass.clear_colors)
        .map(|(&attachment, clear)| RenderPassColorAttachment {
            view: texture_of(attachment),
            ops: Operations {
                load: clear.map_or(LoadOp::Load, LoadOp::Clear),
                store: StoreOp::Store,
            },
        })
        .collect();

    let depth_attachment = pass.depth_stencil_output.or(pass.depth_stencil_input);
    let depth_stencil = depth_attachment.map(|attachment| {
        let writes = pass.depth_stencil_output.is_some();
        let depth_load = match pass.depth_clear {
            Some(depth) if writes => LoadOp::Clear(depth),
            _ => LoadOp::Load,
        };
        let stencil_ops = (attachments[attachment].format == TextureFormat::Depth24PlusStencil8).then(|| {
            Operations {
                load: match pass.stencil_clear {
                    Some(stencil) if writes => LoadOp::Clear(stencil),
                    _ => LoadOp::Load,
                },
                store: StoreOp::Store,
            }
        });
        RenderPassDepthStencilAttachment {
            view: texture_of(attachment),
            depth_ops: Some(Operations {
                load: depth_load,
                store: StoreOp::Store,
            }),
            stencil_ops,
        }
    });

    let render_area = pass
        .outputs
        .first()
        .copied()
        .or(depth_attachment)
        .map(|attachment| Rect::from_extent(attachments[attachment].size))
        .unwrap_or_default();

    BakedPass {
        name: pass.name,
        color_attachments,
        depth_stencil,
        render_area,
        execution: pass.execution,
        command: pass.command,
        command_buffer: None,
    }
}
