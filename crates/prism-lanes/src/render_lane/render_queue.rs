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

//! The render queue and its registry.
//!
//! Elements are inserted once per rebuild. While inserting, each element records
//! its sort metadata (layer, pipeline, material pass, vertex buffer) in the
//! [`RenderQueueRegistry`]. [`RenderQueueRegistry::finalize`] then turns those
//! sparse values into small dense indices that elements pack into their sort key,
//! and computes the offset of every element type group. The queue is sorted every
//! frame, primarily by element type and secondarily by score, so each type forms a
//! contiguous group that [`RenderQueue::process`] hands out in ascending order.

use ahash::AHashMap;
use prism_core::renderer::api::{BufferId, RenderPipelineId};
use prism_core::renderer::MaterialPassId;
use std::hash::Hash;
use std::ops::Range;

/// Assigns dense, order-preserving indices to a set of sparse keys.
#[derive(Debug)]
struct DenseIndices<K> {
    indices: AHashMap<K, usize>,
}

impl<K> Default for DenseIndices<K> {
    fn default() -> Self {
        Self {
            indices: AHashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> DenseIndices<K> {
    fn register(&mut self, key: K) {
        self.indices.entry(key).or_insert(usize::MAX);
    }

    fn finalize(&mut self) {
        let mut keys: Vec<K> = self.indices.keys().copied().collect();
        keys.sort_unstable();
        for (index, key) in keys.into_iter().enumerate() {
            self.indices.insert(key, index);
        }
    }

    fn get(&self, key: &K) -> Option<usize> {
        self.indices.get(key).copied().filter(|&i| i != usize::MAX)
    }

    fn clear(&mut self) {
        self.indices.clear();
    }
}

/// Sort and grouping metadata of the elements of one rebuild.
#[derive(Debug, Default)]
pub struct RenderQueueRegistry {
    element_type_counts: Vec<usize>,
    group_offsets: Vec<usize>,
    layers: DenseIndices<i32>,
    pipelines: DenseIndices<RenderPipelineId>,
    material_passes: DenseIndices<MaterialPassId>,
    vertex_buffers: DenseIndices<BufferId>,
    finalized: bool,
}

impl RenderQueueRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one element of `element_type`.
    pub fn register_element_type(&mut self, element_type: usize) {
        debug_assert!(!self.finalized, "registry modified after finalize");
        if element_type >= self.element_type_counts.len() {
            self.element_type_counts.resize(element_type + 1, 0);
        }
        self.element_type_counts[element_type] += 1;
    }

    /// Records a layer used by an element.
    pub fn register_layer(&mut self, layer: i32) {
        self.layers.register(layer);
    }

    /// Records a pipeline used by an element.
    pub fn register_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.pipelines.register(pipeline);
    }

    /// Records a material pass used by an element.
    pub fn register_material_pass(&mut self, material_pass: MaterialPassId) {
        self.material_passes.register(material_pass);
    }

    /// Records a vertex buffer used by an element.
    pub fn register_vertex_buffer(&mut self, buffer: BufferId) {
        self.vertex_buffers.register(buffer);
    }

    /// Compiles dense indices and per-type group offsets.
    ///
    /// Must be called exactly once after every insertion of a rebuild.
    pub fn finalize(&mut self) {
        assert!(!self.finalized, "RenderQueueRegistry::finalize called twice in a rebuild");

        self.layers.finalize();
        self.pipelines.finalize();
        self.material_passes.finalize();
        self.vertex_buffers.finalize();

        self.group_offsets.clear();
        self.group_offsets.reserve(self.element_type_counts.len() + 1);
        let mut offset = 0;
        self.group_offsets.push(offset);
        for count in &self.element_type_counts {
            offset += count;
            self.group_offsets.push(offset);
        }

        self.finalized = true;
    }

    /// Whether [`finalize`](Self::finalize) ran since the last [`clear`](Self::clear).
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Forgets everything, keeping allocations.
    pub fn clear(&mut self) {
        self.element_type_counts.clear();
        self.group_offsets.clear();
        self.layers.clear();
        self.pipelines.clear();
        self.material_passes.clear();
        self.vertex_buffers.clear();
        self.finalized = false;
    }

    /// Dense index of `layer`.
    pub fn layer_index(&self, layer: i32) -> Option<usize> {
        self.layers.get(&layer)
    }

    /// Dense index of `pipeline`.
    pub fn pipeline_index(&self, pipeline: RenderPipelineId) -> Option<usize> {
        self.pipelines.get(&pipeline)
    }

    /// Dense index of `material_pass`.
    pub fn material_pass_index(&self, material_pass: MaterialPassId) -> Option<usize> {
        self.material_passes.get(&material_pass)
    }

    /// Dense index of `buffer`.
    pub fn vertex_buffer_index(&self, buffer: BufferId) -> Option<usize> {
        self.vertex_buffers.get(&buffer)
    }

    /// Position of the `element_type` group in a sorted queue.
    pub fn group_range(&self, element_type: usize) -> Option<Range<usize>> {
        if !self.finalized || element_type + 1 >= self.group_offsets.len() {
            return None;
        }
        Some(self.group_offsets[element_type]..self.group_offsets[element_type + 1])
    }

    /// Element types with at least one element, in ascending order.
    pub fn active_element_types(&self) -> impl Iterator<Item = usize> + '_ {
        self.element_type_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(ty, _)| ty)
    }

    /// Total number of registered elements.
    pub fn element_count(&self) -> usize {
        self.element_type_counts.iter().sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry<T> {
    element_type: usize,
    score: u64,
    item: T,
}

/// A list of items grouped by element type and ordered by a score.
#[derive(Debug)]
pub struct RenderQueue<T> {
    entries: Vec<QueueEntry<T>>,
    ordered: Vec<T>,
    sorted: bool,
}

impl<T> Default for RenderQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            ordered: Vec::new(),
            sorted: false,
        }
    }
}

impl<T: Copy> RenderQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item. The queue must be sorted again before processing.
    pub fn insert(&mut self, item: T, element_type: usize) {
        self.entries.push(QueueEntry {
            element_type,
            score: 0,
            item,
        });
        self.sorted = false;
    }

    /// Removes every item, keeping capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ordered.clear();
        self.sorted = false;
    }

    /// Reorders the queue by element type, then by `score_fn`.
    ///
    /// Items with equal type and score end up in an unspecified order.
    pub fn sort(&mut self, mut score_fn: impl FnMut(&T) -> u64) {
        for entry in &mut self.entries {
            entry.score = score_fn(&entry.item);
        }
        self.entries
            .sort_unstable_by_key(|entry| (entry.element_type, entry.score));

        self.ordered.clear();
        self.ordered.extend(self.entries.iter().map(|entry| entry.item));
        self.sorted = true;
    }

    /// Calls `callback(element_type, items)` for each type group, in ascending type order.
    ///
    /// # Panics
    ///
    /// Panics if the queue was modified since the last [`sort`](Self::sort), or if
    /// `registry` was not finalized for the items of this queue.
    pub fn process(&self, registry: &RenderQueueRegistry, mut callback: impl FnMut(usize, &[T])) {
        assert!(self.sorted || self.entries.is_empty(), "render queue processed before sorting");
        assert!(
            registry.is_finalized() || self.entries.is_empty(),
            "render queue processed with a registry that was not finalized"
        );
        debug_assert_eq!(registry.element_count(), self.entries.len());

        for element_type in registry.active_element_types() {
            if let Some(range) = registry.group_range(element_type) {
                callback(element_type, &self.ordered[range]);
            }
        }
    }

    /// Items in their current order.
    #[inline]
    pub fn items(&self) -> &[T] {
        &self.ordered
    }

    /// Number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the queue holds no item.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(items: &[(u32, usize)]) -> (RenderQueue<u32>, RenderQueueRegistry) {
        let mut queue = RenderQueue::new();
        let mut registry = RenderQueueRegistry::new();
        for &(item, ty) in items {
            queue.insert(item, ty);
            registry.register_element_type(ty);
        }
        registry.finalize();
        (queue, registry)
    }

    #[test]
    fn test_process_visits_groups_in_ascending_type_order() {
        let (mut queue, registry) = build(&[(10, 2), (11, 0), (12, 2), (13, 0), (14, 1)]);
        queue.sort(|&item| u64::from(item));

        let mut groups = Vec::new();
        queue.process(&registry, |ty, items| groups.push((ty, items.to_vec())));
        assert_eq!(
            groups,
            vec![(0, vec![11, 13]), (1, vec![14]), (2, vec![10, 12])]
        );
    }

    #[test]
    fn test_sort_orders_by_score_within_group() {
        let (mut queue, registry) = build(&[(1, 0), (2, 0), (3, 0)]);
        queue.sort(|&item| 100 - u64::from(item));
        assert_eq!(queue.items(), &[3, 2, 1]);
        assert_eq!(registry.group_range(0), Some(0..3));
        assert_eq!(registry.group_range(1), None);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let (mut queue, mut registry) = build(&[(1, 0), (2, 0)]);
        queue.sort(|_| 0);
        let capacity = queue.entries.capacity();
        queue.clear();
        registry.clear();
        assert!(queue.is_empty());
        assert!(!registry.is_finalized());
        assert_eq!(queue.entries.capacity(), capacity);
    }

    #[test]
    #[should_panic(expected = "processed before sorting")]
    fn test_process_requires_sort() {
        let (queue, registry) = build(&[(1, 0)]);
        queue.process(&registry, |_, _| {});
    }

    #[test]
    #[should_panic(expected = "finalize called twice")]
    fn test_finalize_twice_is_fatal() {
        let (_, mut registry) = build(&[(1, 0)]);
        registry.finalize();
    }

    #[test]
    fn test_dense_indices_follow_key_order() {
        let mut registry = RenderQueueRegistry::new();
        registry.register_pipeline(RenderPipelineId(40));
        registry.register_pipeline(RenderPipelineId(7));
        registry.register_pipeline(RenderPipelineId(40));
        registry.register_layer(-3);
        registry.register_vertex_buffer(BufferId(9));
        assert_eq!(registry.pipeline_index(RenderPipelineId(7)), None);

        registry.finalize();
        assert_eq!(registry.pipeline_index(RenderPipelineId(7)), Some(0));
        assert_eq!(registry.pipeline_index(RenderPipelineId(40)), Some(1));
        assert_eq!(registry.layer_index(-3), Some(0));
        assert_eq!(registry.vertex_buffer_index(BufferId(9)), Some(0));
        assert_eq!(registry.material_pass_index(MaterialPassId(1)), None);
    }
}
