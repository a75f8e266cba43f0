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

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The subset of a graphics device the forward pipeline consumes.
///
/// Implementations are backend-specific. All methods take `&self`: the device is
/// shared between the pipeline and the host application.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - Size, usage and label of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    /// ## Errors
    /// * `ResourceError` - If the device cannot satisfy the allocation.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys the buffer associated with the given ID.
    /// ## Errors
    /// * `ResourceError` - If the ID is unknown to the device.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` into the buffer at `offset` through the device queue.
    ///
    /// The write is ordered before any command buffer submitted afterwards.
    /// ## Errors
    /// * `ResourceError` - If the ID is unknown or the range is out of bounds.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a new texture.
    /// ## Errors
    /// * `ResourceError` - If the device cannot satisfy the allocation.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys the texture associated with the given ID.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a recorded command buffer to the GPU queue.
    ///
    /// The same command buffer may be submitted again on later frames.
    fn submit_command_buffer(&self, command_buffer: CommandBufferId);

    /// Destroys a recorded command buffer. It must not be in flight.
    fn destroy_command_buffer(&self, command_buffer: CommandBufferId) -> Result<(), ResourceError>;

    /// Returns the limits of the device.
    fn limits(&self) -> DeviceLimits;
}
