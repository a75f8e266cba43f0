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

//! Material passes and the pass-name registry.
//!
//! A [`MaterialPass`] is one rendering technique (pipeline state + shader bindings)
//! of a [`Material`]. Passes are shared through `Arc` by every renderable using
//! them. Instead of pushing change notifications, each pass carries two version
//! counters that consumers compare against the values they last saw:
//!
//! - the **pipeline version** changes when the pipeline state changes, which
//!   invalidates every render element built from the pass;
//! - the **binding version** changes when only the shader bindings change, which
//!   invalidates recorded command buffers but not the elements.

use crate::renderer::api::{BindGroupId, RenderPipelineId};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Name of the pass index used by depth-only passes.
pub const DEPTH_PASS_NAME: &str = "DepthPass";
/// Name of the pass index used by forward lit passes.
pub const FORWARD_PASS_NAME: &str = "ForwardPass";

static NEXT_MATERIAL_PASS_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`MaterialPass`], unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialPassId(pub u64);

/// A monotonically increasing version, shareable across threads.
#[derive(Debug, Default)]
pub struct VersionCounter {
    version: AtomicU64,
}

impl VersionCounter {
    /// Marks as modified, increments version by 1.
    #[inline]
    pub fn changed(&self) {
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Gets the current version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

/// A rendering technique usable by many renderables.
#[derive(Debug)]
pub struct MaterialPass {
    id: MaterialPassId,
    label: String,
    pipeline: AtomicUsize,
    bind_group: AtomicUsize,
    layer: i32,
    depth_sorted: bool,
    pipeline_version: VersionCounter,
    binding_version: VersionCounter,
}

impl MaterialPass {
    /// Creates a pass with a fresh identity.
    pub fn new(label: impl Into<String>, pipeline: RenderPipelineId, bind_group: BindGroupId) -> Self {
        Self {
            id: MaterialPassId(NEXT_MATERIAL_PASS_ID.fetch_add(1, Ordering::Relaxed)),
            label: label.into(),
            pipeline: AtomicUsize::new(pipeline.0),
            bind_group: AtomicUsize::new(bind_group.0),
            layer: 0,
            depth_sorted: false,
            pipeline_version: VersionCounter::default(),
            binding_version: VersionCounter::default(),
        }
    }

    /// Sets the render layer. Lower layers are drawn first.
    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    /// Requests back-to-front sorting, for blended passes.
    pub fn with_depth_sorting(mut self, depth_sorted: bool) -> Self {
        self.depth_sorted = depth_sorted;
        self
    }

    /// Stable identity of this pass.
    #[inline]
    pub fn id(&self) -> MaterialPassId {
        self.id
    }

    /// Debug label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current pipeline.
    #[inline]
    pub fn pipeline(&self) -> RenderPipelineId {
        RenderPipelineId(self.pipeline.load(Ordering::Acquire))
    }

    /// Current shader bindings.
    #[inline]
    pub fn bind_group(&self) -> BindGroupId {
        BindGroupId(self.bind_group.load(Ordering::Acquire))
    }

    /// Render layer.
    #[inline]
    pub fn layer(&self) -> i32 {
        self.layer
    }

    /// Whether elements of this pass are sorted back to front.
    #[inline]
    pub fn is_depth_sorted(&self) -> bool {
        self.depth_sorted
    }

    /// Replaces the pipeline and bumps the pipeline version.
    pub fn set_pipeline(&self, pipeline: RenderPipelineId) {
        self.pipeline.store(pipeline.0, Ordering::Release);
        self.pipeline_version.changed();
    }

    /// Bumps the pipeline version without changing the pipeline handle.
    pub fn invalidate_pipeline(&self) {
        self.pipeline_version.changed();
    }

    /// Replaces the shader bindings and bumps the binding version.
    pub fn set_bind_group(&self, bind_group: BindGroupId) {
        self.bind_group.store(bind_group.0, Ordering::Release);
        self.binding_version.changed();
    }

    /// Bumps the binding version without changing the binding handle.
    pub fn invalidate_shader_binding(&self) {
        self.binding_version.changed();
    }

    /// Current pipeline version.
    #[inline]
    pub fn pipeline_version(&self) -> u64 {
        self.pipeline_version.version()
    }

    /// Current binding version.
    #[inline]
    pub fn binding_version(&self) -> u64 {
        self.binding_version.version()
    }
}

/// A material: one optional [`MaterialPass`] per pass index.
#[derive(Debug, Default, Clone)]
pub struct Material {
    passes: Vec<Option<Arc<MaterialPass>>>,
}

impl Material {
    /// Creates a material without passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Material::set_pass`].
    pub fn with_pass(mut self, pass_index: usize, pass: Arc<MaterialPass>) -> Self {
        self.set_pass(pass_index, pass);
        self
    }

    /// Sets the pass used for `pass_index`.
    pub fn set_pass(&mut self, pass_index: usize, pass: Arc<MaterialPass>) {
        if pass_index >= self.passes.len() {
            self.passes.resize(pass_index + 1, None);
        }
        self.passes[pass_index] = Some(pass);
    }

    /// Returns `true` if the material renders in `pass_index`.
    #[inline]
    pub fn has_pass(&self, pass_index: usize) -> bool {
        self.pass(pass_index).is_some()
    }

    /// The pass used for `pass_index`, if any.
    #[inline]
    pub fn pass(&self, pass_index: usize) -> Option<&Arc<MaterialPass>> {
        self.passes.get(pass_index).and_then(Option::as_ref)
    }
}

/// Maps pass names to dense pass indices.
#[derive(Debug, Default, Clone)]
pub struct PassIndexRegistry {
    names: Vec<String>,
}

impl PassIndexRegistry {
    /// A registry containing the depth and forward passes.
    pub fn with_builtin_passes() -> Self {
        let mut registry = Self::default();
        registry.register_pass(DEPTH_PASS_NAME);
        registry.register_pass(FORWARD_PASS_NAME);
        registry
    }

    /// Registers `name`, returning its index. Registering twice returns the same index.
    pub fn register_pass(&mut self, name: &str) -> usize {
        if let Some(index) = self.pass_index(name) {
            return index;
        }
        self.names.push(name.to_owned());
        self.names.len() - 1
    }

    /// Index of `name`, if registered.
    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
