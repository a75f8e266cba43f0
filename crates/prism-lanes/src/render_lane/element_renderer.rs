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

//! Element renderers: one strategy per element type.
//!
//! Each pipeline pass holds lazily created per-type data ([`ElementRendererDataSet`]).
//! For every rebuild, the pass calls `reset`, `prepare` and `prepare_end` on each
//! active element type, then `render` every time it records commands.

use super::element::{QueuedElement, RenderStates};
use super::frame::RenderFrame;
use prism_core::renderer::api::BufferView;
use prism_core::renderer::{RenderPass, ResourceError, ViewerInstance};
use std::any::Any;

/// Per-pass renderer state, owned by the pass and only interpreted by its renderer.
pub type ElementRendererData = Box<dyn Any + Send + Sync>;

/// The viewer a pipeline pass renders for.
#[derive(Debug, Clone, Copy)]
pub struct ViewerContext<'a> {
    /// Camera data of the viewer.
    pub instance: &'a ViewerInstance,
    /// Uniform buffer holding the viewer's `GpuViewerData`.
    pub uniform_buffer: BufferView,
}

/// Builds and draws the elements of one element type.
pub trait ElementRenderer: Send + Sync {
    /// Creates the state a pipeline pass keeps for this renderer.
    fn instantiate_data(&self) -> ElementRendererData;

    /// Clears the state of the previous rebuild.
    fn reset(&self, data: &mut dyn Any, frame: &mut RenderFrame<'_>);

    /// Builds per-draw data for `elements`; `states[i]` belongs to `elements[i]`.
    fn prepare(
        &self,
        viewer: &ViewerContext<'_>,
        data: &mut dyn Any,
        frame: &mut RenderFrame<'_>,
        elements: &[QueuedElement<'_>],
        states: &[RenderStates],
    ) -> Result<(), ResourceError>;

    /// Finishes batched uploads once every group was prepared.
    fn prepare_end(&self, _frame: &mut RenderFrame<'_>, _data: &mut dyn Any) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Emits the draw commands of `elements`, in order.
    fn render(
        &self,
        viewer: &ViewerContext<'_>,
        data: &dyn Any,
        pass: &mut dyn RenderPass,
        elements: &[QueuedElement<'_>],
    );
}

/// Element renderers indexed by element type.
#[derive(Default)]
pub struct ElementRendererRegistry {
    renderers: Vec<Option<Box<dyn ElementRenderer>>>,
}

impl ElementRendererRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the renderer of `element_type`, returning the one it replaces.
    pub fn register(
        &mut self,
        element_type: usize,
        renderer: Box<dyn ElementRenderer>,
    ) -> Option<Box<dyn ElementRenderer>> {
        if element_type >= self.renderers.len() {
            self.renderers.resize_with(element_type + 1, || None);
        }
        self.renderers[element_type].replace(renderer)
    }

    /// The renderer of `element_type`.
    pub fn get(&self, element_type: usize) -> Option<&dyn ElementRenderer> {
        self.renderers.get(element_type)?.as_deref()
    }

    /// Every registered renderer with its element type.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &dyn ElementRenderer)> {
        self.renderers
            .iter()
            .enumerate()
            .filter_map(|(ty, renderer)| Some((ty, renderer.as_deref()?)))
    }

    /// Number of registered renderers.
    pub fn len(&self) -> usize {
        self.renderers.iter().flatten().count()
    }

    /// Returns `true` if no renderer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renderer data of one pipeline pass, created on first use of each element type.
#[derive(Default)]
pub struct ElementRendererDataSet {
    data: Vec<Option<ElementRendererData>>,
}

impl ElementRendererDataSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data of `element_type`, instantiated from `renderer` if needed.
    pub fn get_or_instantiate(
        &mut self,
        element_type: usize,
        renderer: &dyn ElementRenderer,
    ) -> &mut dyn Any {
        if element_type >= self.data.len() {
            self.data.resize_with(element_type + 1, || None);
        }
        &mut **self.data[element_type].get_or_insert_with(|| renderer.instantiate_data())
    }

    /// Data of `element_type`, if instantiated.
    pub fn get(&self, element_type: usize) -> Option<&dyn Any> {
        let data = self.data.get(element_type)?.as_ref()?;
        Some(&**data)
    }

    /// Drops the data of `element_type`, e.g. after its renderer was replaced.
    pub fn remove(&mut self, element_type: usize) -> Option<ElementRendererData> {
        self.data.get_mut(element_type)?.take()
    }

    /// Element types with instantiated data.
    #[cfg(test)]
    pub fn instantiated_types(&self) -> impl Iterator<Item = usize> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, data)| data.is_some())
            .map(|(ty, _)| ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingRenderer;

    impl ElementRenderer for CountingRenderer {
        fn instantiate_data(&self) -> ElementRendererData {
            Box::new(0usize)
        }

        fn reset(&self, data: &mut dyn Any, _frame: &mut RenderFrame<'_>) {
            *data.downcast_mut::<usize>().unwrap() = 0;
        }

        fn prepare(
            &self,
            _viewer: &ViewerContext<'_>,
            data: &mut dyn Any,
            _frame: &mut RenderFrame<'_>,
            elements: &[QueuedElement<'_>],
            _states: &[RenderStates],
        ) -> Result<(), ResourceError> {
            *data.downcast_mut::<usize>().unwrap() += elements.len();
            Ok(())
        }

        fn render(
            &self,
            _viewer: &ViewerContext<'_>,
            _data: &dyn Any,
            _pass: &mut dyn RenderPass,
            _elements: &[QueuedElement<'_>],
        ) {
        }
    }

    #[test]
    fn test_registry_is_sparse_and_dense_indexed() {
        let mut registry = ElementRendererRegistry::new();
        assert!(registry.register(2, Box::new(CountingRenderer)).is_none());
        assert!(registry.get(0).is_none());
        assert!(registry.get(2).is_some());
        assert!(registry.register(2, Box::new(CountingRenderer)).is_some());
        assert_eq!(registry.iter().map(|(ty, _)| ty).collect::<Vec<_>>(), vec![2]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_data_is_instantiated_once() {
        let renderer = CountingRenderer;
        let mut set = ElementRendererDataSet::new();
        assert!(set.get(1).is_none());

        *set.get_or_instantiate(1, &renderer).downcast_mut::<usize>().unwrap() = 5;
        assert_eq!(*set.get_or_instantiate(1, &renderer).downcast_mut::<usize>().unwrap(), 5);
        assert_eq!(set.instantiated_types().collect::<Vec<_>>(), vec![1]);
    }
}
