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

//! A recording graphics device for unit tests.

use prism_core::math::Rect;
use prism_core::renderer::api::*;
use prism_core::renderer::traits::{CommandEncoder, GraphicsDevice, RenderPass};
use prism_core::renderer::ResourceError;
use std::any::Any;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A command observed by the mock render pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded {
    BeginPass(Option<String>),
    Viewport(Rect),
    Pipeline(RenderPipelineId),
    BindGroup(u32, BindGroupId),
    Uniform(u32, BufferView),
    DrawIndexed(Range<u32>),
}

#[derive(Debug, Default)]
pub(crate) struct MockDevice {
    next_id: AtomicUsize,
    pub buffers_created: AtomicUsize,
    pub buffers_destroyed: AtomicUsize,
    pub writes: AtomicUsize,
    pub textures_created: AtomicUsize,
    pub textures_destroyed: AtomicUsize,
    pub encoders: AtomicUsize,
    pub submits: AtomicUsize,
    pub command_buffers_destroyed: AtomicUsize,
    pub fail_allocations: AtomicBool,
    pub log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            ..Default::default()
        }
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }

    pub fn take_log(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }
}

impl GraphicsDevice for MockDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(ResourceError::OutOfMemory {
                requested: descriptor.size,
            });
        }
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(BufferId(self.next()))
    }

    fn destroy_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
        self.buffers_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_buffer(&self, _id: BufferId, _offset: u64, _data: &[u8]) -> Result<(), ResourceError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_texture(&self, _descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(ResourceError::OutOfMemory { requested: 0 });
        }
        self.textures_created.fetch_add(1, Ordering::Relaxed);
        Ok(TextureId(self.next()))
    }

    fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
        self.textures_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        self.encoders.fetch_add(1, Ordering::Relaxed);
        Box::new(MockEncoder {
            id: self.next() as u64,
            log: self.log.clone(),
        })
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {
        self.submits.fetch_add(1, Ordering::Relaxed);
    }

    fn destroy_command_buffer(&self, _command_buffer: CommandBufferId) -> Result<(), ResourceError> {
        self.command_buffers_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn limits(&self) -> DeviceLimits {
        DeviceLimits::default()
    }
}

struct MockEncoder {
    id: u64,
    log: Arc<Mutex<Vec<Recorded>>>,
}

struct MockPass {
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockPass {
    fn push(&self, command: Recorded) {
        self.log.lock().unwrap().push(command);
    }
}

impl RenderPass for MockPass {
    fn set_viewport(&mut self, viewport: Rect) {
        self.push(Recorded::Viewport(viewport));
    }
    fn set_scissor(&mut self, _scissor: Rect) {}
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.push(Recorded::Pipeline(pipeline));
    }
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.push(Recorded::BindGroup(index, bind_group));
    }
    fn set_uniform_buffer(&mut self, slot: u32, view: BufferView) {
        self.push(Recorded::Uniform(slot, view));
    }
    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: BufferId, _offset: u64) {}
    fn set_index_buffer(&mut self, _buffer: BufferId, _offset: u64, _format: IndexFormat) {}
    fn draw(&mut self, _vertices: Range<u32>, _instances: Range<u32>) {}
    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.push(Recorded::DrawIndexed(indices));
    }
}

impl CommandEncoder for MockEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        let pass = MockPass {
            log: self.log.clone(),
        };
        pass.push(Recorded::BeginPass(descriptor.label.map(str::to_owned)));
        Box::new(pass)
    }

    fn begin_debug_region(&mut self, _label: &str) {}

    fn end_debug_region(&mut self) {}

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(self.id)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
