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

//! A declarative graph of render passes, baked into an executable schedule.
//!
//! Passes declare which attachments they read and write. [`FrameGraph::bake`]
//! derives the dependencies from those declarations, drops passes that do not
//! contribute to a backbuffer output, orders the rest, and backs the logical
//! attachments with textures, sharing one texture between attachments whose
//! lifetimes do not overlap.
//!
//! Each frame, [`BakedFrameGraph::execute`] asks every pass whether it must be
//! skipped, replayed from its cached command buffer, or recorded again.

mod baked;
mod graph;

pub use baked::BakedFrameGraph;
pub use graph::{FrameGraph, FramePass};

use prism_core::math::{Extent2D, Rect};
use prism_core::renderer::api::TextureFormat;
use prism_core::renderer::RenderPass;

/// A logical render target of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePassAttachment {
    /// Debug name, also used as texture label.
    pub name: String,
    /// Texel format.
    pub format: TextureFormat,
    /// Size in pixels.
    pub size: Extent2D,
}

impl FramePassAttachment {
    /// Describes an attachment.
    pub fn new(name: impl Into<String>, format: TextureFormat, size: Extent2D) -> Self {
        Self {
            name: name.into(),
            format,
            size,
        }
    }
}

/// What a pass does this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePassExecution {
    /// Submit nothing.
    Skip,
    /// Replay the last recording, or record if there is none.
    Execute,
    /// Record again, then submit.
    UpdateAndExecute,
}

/// Decides the [`FramePassExecution`] of a pass from the graph context.
pub type ExecutionCallback<C> = Box<dyn Fn(&C) -> FramePassExecution + Send>;

/// Records the commands of a pass; the `Rect` covers the pass attachments.
pub type CommandCallback<C> = Box<dyn FnMut(&mut C, &mut dyn RenderPass, Rect) + Send>;
