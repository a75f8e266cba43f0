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

//! Rendering contracts shared by the pipeline lanes and agents.
//!
//! - **[`api`]**: GPU handles, descriptors, device limits and settings.
//! - **[`traits`]**: The graphics device and command recording interfaces.
//! - **[`light`]**: The light capability and its GPU blob.
//! - **[`material`]**: Material passes and their version counters.
//! - **[`viewer`]**: Viewers and their camera data.
//! - **[`retirement`]**: Frame-tokened deferred release.

pub mod api;
pub mod error;
pub mod light;
pub mod material;
pub mod retirement;
pub mod traits;
pub mod viewer;

pub use self::error::ResourceError;
pub use self::light::{
    DirectionalLight, GpuLight, Light, LightBlockLayout, PointLight, SpotLight,
    MAX_LIGHT_COUNT_PER_DRAW,
};
pub use self::material::{
    Material, MaterialPass, MaterialPassId, PassIndexRegistry, VersionCounter, DEPTH_PASS_NAME,
    FORWARD_PASS_NAME,
};
pub use self::retirement::{CompletionSignal, FrameToken, RetirementQueue};
pub use self::traits::{CommandEncoder, GraphicsDevice, RenderPass};
pub use self::viewer::{AbstractViewer, Camera, GpuViewerData, ViewerInstance};
