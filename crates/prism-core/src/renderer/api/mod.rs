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

//! Backend-agnostic rendering API.
//!
//! - **[`buffer`]** and **[`texture`]**: GPU handles and their descriptors.
//! - **[`command`]**: Command buffer handles and render pass descriptions.
//! - **[`pipeline`]**: Opaque compiled pipeline and binding handles.
//! - **[`mesh`]**: GPU-resident geometry.
//! - **[`core`]**: Device limits and pipeline settings.

pub mod buffer;
pub mod command;
pub mod core;
pub mod mesh;
pub mod pipeline;
pub mod texture;

pub use self::buffer::{BufferDescriptor, BufferId, BufferUsage, BufferView};
pub use self::command::{
    CommandBufferId, LoadOp, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, StoreOp,
};
pub use self::core::{DeviceLimits, ForwardPipelineSettings};
pub use self::mesh::{GpuMesh, IndexFormat};
pub use self::pipeline::{BindGroupId, RenderPipelineId};
pub use self::texture::{TextureDescriptor, TextureFormat, TextureId, TextureUsage};
