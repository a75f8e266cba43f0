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

//! Per-frame context handed to every stage of the pipeline.

use super::element::RenderElement;
use super::light_assignment::LightUboPool;
use prism_core::renderer::api::{BufferId, CommandBufferId, TextureId};
use prism_core::renderer::{FrameToken, GraphicsDevice, RetirementQueue};

/// A resource whose release must wait for the GPU to finish a frame.
#[derive(Debug)]
pub enum RetiredResource {
    /// Render elements from a previous rebuild; recorded commands may still reference them.
    Elements(Vec<Box<dyn RenderElement>>),
    /// A light uniform chunk, returned to the pool once its frame completes.
    LightChunk {
        /// The chunk buffer.
        buffer: BufferId,
        /// Size of the buffer in bytes.
        size: u64,
    },
    /// A command buffer that was replaced by a new recording.
    CommandBuffer(CommandBufferId),
    /// An attachment texture of a baked frame graph that was replaced.
    Texture(TextureId),
    /// A uniform buffer of an unregistered viewer or world instance.
    Buffer(BufferId),
}

impl RetiredResource {
    /// Frees or recycles the resource. Only call once its frame has completed.
    pub fn release(self, device: &dyn GraphicsDevice, light_pool: &mut LightUboPool) {
        match self {
            RetiredResource::Elements(elements) => drop(elements),
            RetiredResource::LightChunk { buffer, size } => light_pool.release(buffer, size),
            RetiredResource::CommandBuffer(id) => {
                if let Err(e) = device.destroy_command_buffer(id) {
                    log::warn!("Failed to destroy command buffer {:?}: {}", id, e);
                }
            }
            RetiredResource::Texture(id) => {
                if let Err(e) = device.destroy_texture(id) {
                    log::warn!("Failed to destroy attachment texture {:?}: {}", id, e);
                }
            }
            RetiredResource::Buffer(id) => {
                if let Err(e) = device.destroy_buffer(id) {
                    log::warn!("Failed to destroy buffer {:?}: {}", id, e);
                }
            }
        }
    }
}

/// Counters describing the work done by one call to `render`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Token of the frame; the host signals it once the GPU is done.
    pub token: FrameToken,
    /// Pipeline passes that rebuilt their render elements.
    pub element_rebuilds: u32,
    /// Pipeline passes that ran the element renderers' prepare phase.
    pub renderer_preparations: u32,
    /// Light blocks written (one per distinct light key per rebuild).
    pub light_blocks_written: u32,
    /// Light chunks allocated from the device.
    pub light_chunks_allocated: u32,
    /// Light chunks taken from the recycle pool.
    pub light_chunks_recycled: u32,
    /// Uniform buffer writes issued to the device.
    pub buffer_uploads: u32,
    /// Frame graph passes whose commands were recorded this frame.
    pub passes_recorded: u32,
    /// Frame graph passes that replayed their previous recording.
    pub passes_replayed: u32,
    /// Frame graph passes skipped this frame.
    pub passes_skipped: u32,
    /// Whether the frame graph was baked this frame.
    pub frame_graph_baked: bool,
    /// Retired resources released at the start of the frame.
    pub resources_released: u32,
}

/// The frame being produced.
///
/// Gives access to the device and to deferred release, and accumulates [`FrameStats`].
pub struct RenderFrame<'a> {
    device: &'a dyn GraphicsDevice,
    token: FrameToken,
    retired: &'a mut RetirementQueue<RetiredResource>,
    stats: FrameStats,
}

impl<'a> RenderFrame<'a> {
    /// Starts a frame identified by `token`.
    pub fn new(
        device: &'a dyn GraphicsDevice,
        token: FrameToken,
        retired: &'a mut RetirementQueue<RetiredResource>,
    ) -> Self {
        Self {
            device,
            token,
            retired,
            stats: FrameStats {
                token,
                ..Default::default()
            },
        }
    }

    /// The graphics device.
    #[inline]
    pub fn device(&self) -> &'a dyn GraphicsDevice {
        self.device
    }

    /// Token of this frame.
    #[inline]
    pub fn token(&self) -> FrameToken {
        self.token
    }

    /// Hands `resource` to deferred release; it is freed once this frame completes.
    pub fn push_for_release(&mut self, resource: RetiredResource) {
        self.retired.push(self.token, resource);
    }

    /// Writes `data` into `buffer` and counts the upload.
    pub fn upload(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), prism_core::renderer::ResourceError> {
        self.device.write_buffer(buffer, offset, data)?;
        self.stats.buffer_uploads += 1;
        Ok(())
    }

    /// Statistics gathered so far.
    #[inline]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Mutable statistics.
    #[inline]
    pub fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    /// Ends the frame, returning its statistics.
    pub fn finish(self) -> FrameStats {
        self.stats
    }
}
