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

//! Reference counting of material passes and polling of their version counters.

use ahash::AHashMap;
use prism_core::renderer::{MaterialPass, MaterialPassId};
use std::sync::Arc;

/// What a pipeline pass must redo because material passes changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialInvalidation {
    /// A pipeline changed: render elements must be rebuilt.
    pub rebuild_elements: bool,
    /// Only shader bindings changed: commands must be recorded again.
    pub rebuild_commands: bool,
}

impl MaterialInvalidation {
    /// Returns `true` if nothing changed.
    #[inline]
    pub fn is_clean(&self) -> bool {
        !self.rebuild_elements && !self.rebuild_commands
    }
}

#[derive(Debug)]
struct TrackedPass {
    pass: Arc<MaterialPass>,
    use_count: usize,
    pipeline_version: u64,
    binding_version: u64,
}

/// Material passes used by one pipeline pass, with the versions last observed.
#[derive(Debug, Default)]
pub struct MaterialPassTracker {
    passes: AHashMap<MaterialPassId, TrackedPass>,
}

impl MaterialPassTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more user of `pass`. Returns `true` on its first use.
    pub fn register(&mut self, pass: &Arc<MaterialPass>) -> bool {
        match self.passes.get_mut(&pass.id()) {
            Some(tracked) => {
                tracked.use_count += 1;
                false
            }
            None => {
                self.passes.insert(
                    pass.id(),
                    TrackedPass {
                        pass: pass.clone(),
                        use_count: 1,
                        pipeline_version: pass.pipeline_version(),
                        binding_version: pass.binding_version(),
                    },
                );
                true
            }
        }
    }

    /// Counts one less user. Returns `true` when the last user is gone.
    ///
    /// # Panics
    ///
    /// Panics if the pass was never registered.
    pub fn unregister(&mut self, id: MaterialPassId) -> bool {
        let Some(tracked) = self.passes.get_mut(&id) else {
            log::error!("Material pass {:?} unregistered but not tracked", id);
            panic!("unregistering untracked material pass {:?}", id);
        };

        tracked.use_count -= 1;
        if tracked.use_count == 0 {
            self.passes.remove(&id);
            true
        } else {
            false
        }
    }

    /// Compares every tracked pass with the versions last seen and records the new ones.
    pub fn poll_invalidations(&mut self) -> MaterialInvalidation {
        let mut invalidation = MaterialInvalidation::default();
        for tracked in self.passes.values_mut() {
            let pipeline_version = tracked.pass.pipeline_version();
            if pipeline_version != tracked.pipeline_version {
                tracked.pipeline_version = pipeline_version;
                invalidation.rebuild_elements = true;
            }

            let binding_version = tracked.pass.binding_version();
            if binding_version != tracked.binding_version {
                tracked.binding_version = binding_version;
                invalidation.rebuild_commands = true;
            }
        }
        invalidation
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: MaterialPassId) -> bool {
        self.passes.contains_key(&id)
    }

    /// Number of users of `id`.
    #[cfg(test)]
    pub fn use_count(&self, id: MaterialPassId) -> usize {
        self.passes.get(&id).map_or(0, |tracked| tracked.use_count)
    }

    /// Number of distinct tracked passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if no pass is tracked.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Stops tracking everything, returning each pass with its remaining use count.
    pub fn drain(&mut self) -> Vec<(MaterialPassId, usize)> {
        self.passes
            .drain()
            .map(|(id, tracked)| (id, tracked.use_count))
            .collect()
    }
}

/// Material passes registered with the whole pipeline, refcounted across pipeline passes.
#[derive(Debug, Default)]
pub struct RegisteredMaterialPasses {
    passes: AHashMap<MaterialPassId, (Arc<MaterialPass>, usize)>,
}

impl RegisteredMaterialPasses {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a pipeline pass starting to use `pass`. Returns `true` if it was not registered.
    pub fn register(&mut self, pass: &Arc<MaterialPass>) -> bool {
        let entry = self.passes.entry(pass.id()).or_insert_with(|| (pass.clone(), 0));
        entry.1 += 1;
        if entry.1 == 1 {
            log::debug!("Material pass '{}' registered", pass.label());
            true
        } else {
            false
        }
    }

    /// Drops `count` uses of `id`. Returns `true` if the pass left the set.
    ///
    /// # Panics
    ///
    /// Panics if `id` has fewer than `count` uses.
    pub fn unregister(&mut self, id: MaterialPassId, count: usize) -> bool {
        let Some(entry) = self.passes.get_mut(&id) else {
            log::error!("Material pass {:?} is not registered with the pipeline", id);
            panic!("unregistering unknown material pass {:?}", id);
        };
        assert!(entry.1 >= count, "material pass {:?} use count underflow", id);

        entry.1 -= count;
        if entry.1 == 0 {
            if let Some((pass, _)) = self.passes.remove(&id) {
                log::debug!("Material pass '{}' unregistered", pass.label());
            }
            true
        } else {
            false
        }
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: MaterialPassId) -> bool {
        self.passes.contains_key(&id)
    }

    /// Number of registered passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::api::{BindGroupId, RenderPipelineId};

    fn pass() -> Arc<MaterialPass> {
        Arc::new(MaterialPass::new("Lit", RenderPipelineId(1), BindGroupId(1)))
    }

    #[test]
    fn test_tracker_refcount() {
        let pass = pass();
        let mut tracker = MaterialPassTracker::new();
        assert!(tracker.register(&pass));
        assert!(!tracker.register(&pass));
        assert_eq!(tracker.use_count(pass.id()), 2);

        assert!(!tracker.unregister(pass.id()));
        assert!(tracker.contains(pass.id()));
        assert!(tracker.unregister(pass.id()));
        assert!(!tracker.contains(pass.id()));
    }

    #[test]
    fn test_pipeline_change_requests_element_rebuild() {
        let pass = pass();
        let mut tracker = MaterialPassTracker::new();
        tracker.register(&pass);
        assert!(tracker.poll_invalidations().is_clean());

        pass.invalidate_pipeline();
        let invalidation = tracker.poll_invalidations();
        assert!(invalidation.rebuild_elements);
        assert!(!invalidation.rebuild_commands);
        assert!(tracker.poll_invalidations().is_clean());
    }

    #[test]
    fn test_binding_change_requests_command_rebuild_only() {
        let pass = pass();
        let mut tracker = MaterialPassTracker::new();
        tracker.register(&pass);

        pass.set_bind_group(BindGroupId(9));
        let invalidation = tracker.poll_invalidations();
        assert!(!invalidation.rebuild_elements);
        assert!(invalidation.rebuild_commands);
    }

    #[test]
    fn test_untracked_pass_is_not_observed() {
        let pass = pass();
        let mut tracker = MaterialPassTracker::new();
        tracker.register(&pass);
        tracker.unregister(pass.id());

        pass.invalidate_pipeline();
        assert!(tracker.poll_invalidations().is_clean());
    }

    #[test]
    #[should_panic(expected = "untracked material pass")]
    fn test_unregister_unknown_is_fatal() {
        MaterialPassTracker::new().unregister(MaterialPassId(u64::MAX));
    }

    #[test]
    fn test_drain_returns_use_counts() {
        let pass = pass();
        let mut tracker = MaterialPassTracker::new();
        tracker.register(&pass);
        tracker.register(&pass);
        assert_eq!(tracker.drain(), vec![(pass.id(), 2)]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_registered_passes_refcount() {
        let pass = pass();
        let mut registered = RegisteredMaterialPasses::new();
        assert!(registered.register(&pass));
        assert!(!registered.register(&pass));
        assert!(!registered.unregister(pass.id(), 1));
        assert!(registered.contains(pass.id()));
        assert!(registered.unregister(pass.id(), 1));
        assert!(registered.is_empty());
    }
}
