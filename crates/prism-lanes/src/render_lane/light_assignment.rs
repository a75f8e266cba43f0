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

//! Per-draw light selection and deduplicated light uniform packing.
//!
//! For every renderable, the lights whose bounds intersect its world bounds are
//! ranked by contribution score and the best [`MAX_LIGHT_COUNT_PER_DRAW`] form a
//! [`LightKey`]. Each distinct key is written once per rebuild into a light block
//! of a uniform chunk; renderables sharing a key share the same [`BufferView`].
//!
//! Chunks are never reused while a frame that reads them may be in flight: on
//! reset they go through deferred release and come back into the
//! [`LightUboPool`] only after that frame completed.

use super::frame::{RenderFrame, RetiredResource};
use super::handles::LightId;
use ahash::AHashMap;
use prism_core::math::Aabb;
use prism_core::renderer::api::{BufferDescriptor, BufferId, BufferView, DeviceLimits};
use prism_core::renderer::{
    GpuLight, GraphicsDevice, Light, LightBlockLayout, ResourceError, MAX_LIGHT_COUNT_PER_DRAW,
};

/// The ordered set of lights bound to a draw, padded with `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightKey([Option<LightId>; MAX_LIGHT_COUNT_PER_DRAW]);

impl LightKey {
    /// Builds a key from at most [`MAX_LIGHT_COUNT_PER_DRAW`] lights.
    pub fn from_lights(lights: impl IntoIterator<Item = LightId>) -> Self {
        let mut key = Self::default();
        for (slot, id) in key.0.iter_mut().zip(lights) {
            *slot = Some(id);
        }
        key
    }

    /// The lights of the key, most important first.
    pub fn lights(&self) -> impl Iterator<Item = LightId> + '_ {
        self.0.iter().map_while(|slot| *slot)
    }

    /// Number of lights in the key.
    pub fn len(&self) -> usize {
        self.lights().count()
    }

    /// Returns `true` for the key of an unlit draw.
    pub fn is_empty(&self) -> bool {
        self.0[0].is_none()
    }
}

/// A light visible from the current viewer.
#[derive(Debug, Clone, Copy)]
pub struct VisibleLight<'a> {
    /// Handle of the light.
    pub id: LightId,
    /// The light itself.
    pub light: &'a dyn Light,
}

/// Light chunks whose frame completed, ready to be reused.
#[derive(Debug, Default)]
pub struct LightUboPool {
    free: Vec<(BufferId, u64)>,
}

impl LightUboPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the oldest buffer of at least `min_size` bytes.
    pub fn acquire(&mut self, min_size: u64) -> Option<(BufferId, u64)> {
        let index = self.free.iter().position(|&(_, size)| size >= min_size)?;
        Some(self.free.remove(index))
    }

    /// Makes a buffer available again. Only call once no frame reads it anymore.
    pub fn release(&mut self, buffer: BufferId, size: u64) {
        log::trace!("Light chunk {:?} returned to the pool", buffer);
        self.free.push((buffer, size));
    }

    /// Number of pooled buffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Returns `true` if no buffer is pooled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Destroys every pooled buffer.
    pub fn destroy_all(&mut self, device: &dyn GraphicsDevice) {
        for (buffer, _) in self.free.drain(..) {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy pooled light chunk {:?}: {}", buffer, e);
            }
        }
    }
}

#[derive(Debug)]
struct LightChunk {
    buffer: BufferId,
    size: u64,
    offset: u64,
    staging: Vec<u8>,
    flushed: u64,
}

/// Light blocks of one pipeline pass for the current rebuild.
#[derive(Debug)]
pub struct LightAssignment {
    block_size: u64,
    chunk_size: u64,
    chunks: Vec<LightChunk>,
    views: AHashMap<LightKey, BufferView>,
    candidates: Vec<(usize, f32)>,
}

impl LightAssignment {
    /// Sizes blocks and chunks for `limits`.
    pub fn new(limits: &DeviceLimits, light_blocks_per_chunk: u32) -> Self {
        let block_size = LightBlockLayout::aligned_size(limits.min_uniform_buffer_offset_alignment);
        Self {
            block_size,
            chunk_size: block_size * u64::from(light_blocks_per_chunk.max(1)),
            chunks: Vec::new(),
            views: AHashMap::new(),
            candidates: Vec::new(),
        }
    }

    /// Size of one aligned light block.
    #[inline]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Size of a newly allocated chunk.
    #[inline]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunks used by the current rebuild.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Distinct light keys written in the current rebuild.
    #[inline]
    pub fn distinct_keys(&self) -> usize {
        self.views.len()
    }

    /// Picks the lights of a renderable with world bounds `bounds`.
    ///
    /// Lights that do not reach `bounds` are dropped, the rest are ranked by
    /// descending score (ties keep their input order) and truncated.
    pub fn select_lights(&mut self, bounds: &Aabb, visible_lights: &[VisibleLight<'_>]) -> LightKey {
        self.rank(bounds, visible_lights);
        LightKey::from_lights(self.candidates.iter().map(|&(index, _)| visible_lights[index].id))
    }

    fn rank(&mut self, bounds: &Aabb, visible_lights: &[VisibleLight<'_>]) {
        self.candidates.clear();
        self.candidates.extend(
            visible_lights
                .iter()
                .enumerate()
                .filter(|(_, visible)| visible.light.bounding_volume().intersects(bounds))
                .map(|(index, visible)| {
                    let score = visible.light.contribution_score(bounds);
                    (index, if score.is_nan() { f32::NEG_INFINITY } else { score })
                }),
        );
        // Stable sort, so equal scores keep their input order. NaN scores rank last.
        self.candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.candidates.truncate(MAX_LIGHT_COUNT_PER_DRAW);
    }

    /// Resolves the light block of a renderable, writing it on first use of its key.
    ///
    /// Fails only when a chunk is needed and the device cannot allocate it.
    pub fn assign(
        &mut self,
        frame: &mut RenderFrame<'_>,
        pool: &mut LightUboPool,
        bounds: &Aabb,
        visible_lights: &[VisibleLight<'_>],
    ) -> Result<BufferView, ResourceError> {
        let key = self.select_lights(bounds, visible_lights);
        if let Some(view) = self.views.get(&key) {
            return Ok(*view);
        }

        let mut gpu_lights = [<GpuLight as bytemuck::Zeroable>::zeroed(); MAX_LIGHT_COUNT_PER_DRAW];
        let count = self.candidates.len();
        for (slot, &(index, _)) in gpu_lights.iter_mut().zip(&self.candidates) {
            *slot = visible_lights[index].light.gpu_data();
        }

        let chunk_index = match self
            .chunks
            .iter()
            .position(|chunk| chunk.offset + self.block_size <= chunk.size)
        {
            Some(index) => index,
            None => self.allocate_chunk(frame, pool)?,
        };

        let block_size = self.block_size;
        let chunk = &mut self.chunks[chunk_index];
        let offset = chunk.offset;
        let end = (offset + block_size) as usize;
        if chunk.staging.len() < end {
            chunk.staging.resize(end, 0);
        }
        LightBlockLayout::write(&mut chunk.staging[offset as usize..end], &gpu_lights[..count]);
        chunk.offset += block_size;

        let view = BufferView::new(chunk.buffer, offset, LightBlockLayout::TOTAL_SIZE as u64);
        self.views.insert(key, view);
        frame.stats_mut().light_blocks_written += 1;
        Ok(view)
    }

    fn allocate_chunk(
        &mut self,
        frame: &mut RenderFrame<'_>,
        pool: &mut LightUboPool,
    ) -> Result<usize, ResourceError> {
        let (buffer, size) = match pool.acquire(self.chunk_size) {
            Some(pooled) => {
                log::trace!("Reusing pooled light chunk {:?}", pooled.0);
                frame.stats_mut().light_chunks_recycled += 1;
                pooled
            }
            None => {
                let descriptor = BufferDescriptor::uniform("Light UBO chunk", self.chunk_size);
                let buffer = frame.device().create_buffer(&descriptor)?;
                log::debug!(
                    "Allocated light chunk {:?} ({} bytes)",
                    buffer,
                    self.chunk_size
                );
                frame.stats_mut().light_chunks_allocated += 1;
                (buffer, self.chunk_size)
            }
        };

        self.chunks.push(LightChunk {
            buffer,
            size,
            offset: 0,
            staging: Vec::new(),
            flushed: 0,
        });
        Ok(self.chunks.len() - 1)
    }

    /// Uploads the blocks written since the last flush, one write per chunk.
    pub fn flush(&mut self, frame: &mut RenderFrame<'_>) -> Result<(), ResourceError> {
        for chunk in &mut self.chunks {
            if chunk.offset == chunk.flushed {
                continue;
            }
            let range = chunk.flushed as usize..chunk.offset as usize;
            frame.upload(chunk.buffer, chunk.flushed, &chunk.staging[range])?;
            chunk.flushed = chunk.offset;
        }
        Ok(())
    }

    /// Hands every chunk to deferred release and forgets all keys.
    pub fn reset(&mut self, frame: &mut RenderFrame<'_>) {
        for chunk in self.chunks.drain(..) {
            frame.push_for_release(RetiredResource::LightChunk {
                buffer: chunk.buffer,
                size: chunk.size,
            });
        }
        self.views.clear();
    }

    /// Destroys the chunks immediately. Only valid once the device is idle.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for chunk in self.chunks.drain(..) {
            if let Err(e) = device.destroy_buffer(chunk.buffer) {
                log::warn!("Failed to destroy light chunk {:?}: {}", chunk.buffer, e);
            }
        }
        self.views.clear();
    }
}
