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

//! Per-frame visibility input, computed by the scene layer.

use super::element::{InstancedRenderable, WorldInstance};
use super::handles::{DrawableId, LightId, ViewerId};
use ahash::{AHashMap, RandomState};

// Fixed seeds so that equal lists hash equally across frames and runs.
const VISIBILITY_HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// What one viewer sees this frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerVisibility {
    /// Visible drawables.
    pub renderables: Vec<DrawableId>,
    /// Visible lights.
    pub lights: Vec<LightId>,
    /// Digest of the two lists; elements are rebuilt when it changes.
    pub hash: u64,
}

impl ViewerVisibility {
    /// Builds a visibility set, hashing both lists.
    pub fn new(renderables: Vec<DrawableId>, lights: Vec<LightId>) -> Self {
        let state = RandomState::with_seeds(
            VISIBILITY_HASH_SEEDS[0],
            VISIBILITY_HASH_SEEDS[1],
            VISIBILITY_HASH_SEEDS[2],
            VISIBILITY_HASH_SEEDS[3],
        );
        let hash = state.hash_one((&renderables, &lights));
        Self {
            renderables,
            lights,
            hash,
        }
    }

    /// Uses a hash computed by the caller, e.g. from a culling structure's version.
    pub fn with_hash(renderables: Vec<DrawableId>, lights: Vec<LightId>, hash: u64) -> Self {
        Self {
            renderables,
            lights,
            hash,
        }
    }
}

/// Visibility of every viewer for one frame. Viewers absent from it see nothing.
#[derive(Debug, Clone, Default)]
pub struct FrameVisibility {
    viewers: AHashMap<ViewerId, ViewerVisibility>,
}

impl FrameVisibility {
    /// Creates an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the visibility of `viewer`.
    pub fn insert(&mut self, viewer: ViewerId, visibility: ViewerVisibility) {
        self.viewers.insert(viewer, visibility);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_viewer(mut self, viewer: ViewerId, visibility: ViewerVisibility) -> Self {
        self.insert(viewer, visibility);
        self
    }

    /// The visibility of `viewer`, if provided.
    pub fn get(&self, viewer: ViewerId) -> Option<&ViewerVisibility> {
        self.viewers.get(&viewer)
    }
}

/// A visible drawable resolved from its handle.
#[derive(Clone, Copy)]
pub struct VisibleRenderable<'a> {
    /// The drawable.
    pub renderable: &'a dyn InstancedRenderable,
    /// Its world instance.
    pub world_instance: &'a WorldInstance,
}
