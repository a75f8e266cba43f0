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

//! Generational handles to objects registered with the pipeline.
//!
//! A handle outlives the object it names; looking up a removed object simply
//! fails instead of reaching freed memory.

slotmap::new_key_type! {
    /// Handle of a registered viewer.
    pub struct ViewerId;
    /// Handle of a world instance (a world transform shared by drawables).
    pub struct WorldInstanceId;
    /// Handle of an instanced drawable attached to a world instance.
    pub struct DrawableId;
    /// Handle of a registered light.
    pub struct LightId;
}
