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

//! Rendering lane - the per-viewer hot path of the forward frame pipeline.
//!
//! Data flows one way through the lane: visible renderables become render
//! elements, elements are queued and sorted per element type, element renderers
//! turn them into draws, and the frame graph replays or re-records the passes
//! that hold those draws.

mod depth_pass;
mod element;
mod element_renderer;
mod forward_pass;
mod frame;
pub mod frame_graph;
mod handles;
mod light_assignment;
mod material_tracker;
mod pipeline_pass;
mod render_queue;
mod submesh;
mod visibility;

#[cfg(test)]
mod mock;

pub use depth_pass::*;
pub use element::*;
pub use element_renderer::*;
pub use forward_pass::*;
pub use frame::*;
pub use frame_graph::{
    BakedFrameGraph, CommandCallback, ExecutionCallback, FrameGraph, FramePass, FramePassAttachment,
    FramePassExecution,
};
pub use handles::*;
pub use light_assignment::*;
pub use material_tracker::*;
pub use render_queue::*;
pub use submesh::*;
pub use visibility::*;
