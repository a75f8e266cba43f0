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

//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use prism_core::math::{Aabb, Extent2D, Rect, Vec3};
use prism_core::renderer::api::*;
use prism_core::renderer::traits::{CommandEncoder, GraphicsDevice, RenderPass};
use prism_core::renderer::{Material, MaterialPass, ResourceError};
use prism_lanes::render_lane::Model;
use std::any::Any;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Label of the light chunk buffers.
pub const LIGHT_CHUNK_LABEL: &str = "Light UBO chunk";

/// A command issued to a mock render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginPass(Option<String>),
    SetPipeline(RenderPipelineId),
    SetBindGroup(u32, BindGroupId),
    SetUniformBuffer(u32, BufferView),
    DrawIndexed(Range<u32>),
}

/// A buffer write observed by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub buffer: BufferId,
    pub offset: u64,
    pub len: usize,
}

/// A graphics device that records what it is asked to do.
#[derive(Debug, Default)]
pub struct MockDevice {
    next_id: AtomicUsize,
    pub buffers: Mutex<Vec<(BufferId, String, u64)>>,
    pub buffers_destroyed: AtomicUsize,
    pub writes: Mutex<Vec<Write>>,
    pub textures_created: AtomicUsize,
    pub textures_destroyed: AtomicUsize,
    pub submits: AtomicUsize,
    pub command_buffers_destroyed: AtomicUsize,
    pub fail_light_chunks: AtomicBool,
    pub commands: Arc<Mutex<Vec<Command>>>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(1),
            ..Default::default()
        })
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Buffers created with `label`.
    pub fn buffers_labelled(&self, label: &str) -> Vec<BufferId> {
        self.buffers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, l, _)| l == label)
            .map(|(id, _, _)| *id)
            .collect()
    }

    /// Writes into buffers created with `label`.
    pub fn writes_to(&self, label: &str) -> Vec<Write> {
        let buffers = self.buffers_labelled(label);
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| buffers.contains(&w.buffer))
            .cloned()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

impl GraphicsDevice for MockDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let label = descriptor.label.as_deref().unwrap_or_default().to_owned();
        if label == LIGHT_CHUNK_LABEL && self.fail_light_chunks.load(Ordering::Relaxed) {
            return Err(ResourceError::OutOfMemory {
                requested: descriptor.size,
            });
        }
        let id = BufferId(self.next());
        self.buffers.lock().unwrap().push((id, label, descriptor.size));
        Ok(id)
    }

    fn destroy_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
        self.buffers_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.writes.lock().unwrap().push(Write {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn create_texture(&self, _descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.textures_created.fetch_add(1, Ordering::Relaxed);
        Ok(TextureId(self.next()))
    }

    fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
        self.textures_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockEncoder {
            id: self.next() as u64,
            commands: self.commands.clone(),
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
    commands: Arc<Mutex<Vec<Command>>>,
}

struct MockPass {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl MockPass {
    fn push(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

impl RenderPass for MockPass {
    fn set_viewport(&mut self, _viewport: Rect) {}
    fn set_scissor(&mut self, _scissor: Rect) {}
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.push(Command::SetPipeline(pipeline));
    }
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.push(Command::SetBindGroup(index, bind_group));
    }
    fn set_uniform_buffer(&mut self, slot: u32, view: BufferView) {
        self.push(Command::SetUniformBuffer(slot, view));
    }
    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: BufferId, _offset: u64) {}
    fn set_index_buffer(&mut self, _buffer: BufferId, _offset: u64, _format: IndexFormat) {}
    fn draw(&mut self, _vertices: Range<u32>, _instances: Range<u32>) {}
    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.push(Command::DrawIndexed(indices));
    }
}

impl CommandEncoder for MockEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        let pass = MockPass {
            commands: self.commands.clone(),
        };
        pass.push(Command::BeginPass(descriptor.label.map(str::to_owned)));
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

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const TARGET: Extent2D = Extent2D::new(320, 240);

/// A material with a depth pass and a forward pass.
pub struct TestMaterial {
    pub depth: Arc<MaterialPass>,
    pub forward: Arc<MaterialPass>,
    pub material: Arc<Material>,
}

impl TestMaterial {
    pub fn new(id: usize) -> Self {
        let depth = Arc::new(MaterialPass::new(
            format!("Depth {id}"),
            RenderPipelineId(100 + id),
            BindGroupId(100 + id),
        ));
        let forward = Arc::new(MaterialPass::new(
            format!("Forward {id}"),
            RenderPipelineId(200 + id),
            BindGroupId(200 + id),
        ));
        let material = Arc::new(
            Material::new()
                .with_pass(0, depth.clone())
                .with_pass(1, forward.clone()),
        );
        Self {
            depth,
            forward,
            material,
        }
    }
}

/// A unit cube model drawn with `material`.
pub fn cube(material: &Arc<Material>) -> Arc<Model> {
    let mesh = GpuMesh {
        vertex_buffer: BufferId(10_000),
        index_buffer: BufferId(10_001),
        index_count: 36,
        index_format: IndexFormat::Uint16,
    };
    Arc::new(
        Model::new(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE))
            .with_submesh(mesh, material.clone()),
    )
}
