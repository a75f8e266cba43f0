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

//! Acts as the **[A]gent** for the forward rendering subsystem.
//!
//! The agent decides *what* gets rebuilt each frame: it tracks which viewers and
//! world instances were invalidated, which material passes are in use, and when
//! the frame graph topology changed. The per-viewer depth and forward passes from
//! `prism_lanes` do the actual element building, light assignment and recording.

mod frame_graph;
mod pipeline;
mod viewer;

pub use pipeline::*;
