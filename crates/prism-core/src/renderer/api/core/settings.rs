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

//! Settings of the forward frame pipeline.

use crate::renderer::api::texture::TextureFormat;
use serde::{Deserialize, Serialize};

/// Tunables of the forward frame pipeline.
///
/// Every field has a default, so partial JSON documents are accepted:
///
/// ```
/// use prism_core::renderer::api::ForwardPipelineSettings;
///
/// let settings = ForwardPipelineSettings::from_json_str(r#"{ "depth_prepass": false }"#).unwrap();
/// assert!(!settings.depth_prepass);
/// assert_eq!(settings.light_blocks_per_chunk, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardPipelineSettings {
    /// Number of per-draw light blocks a single light buffer chunk can hold.
    pub light_blocks_per_chunk: u32,
    /// If `true`, a depth-only pass runs before the forward pass of each viewer.
    pub depth_prepass: bool,
    /// Format of each viewer's color attachment.
    pub color_format: TextureFormat,
    /// Format of each viewer's depth attachment.
    pub depth_format: TextureFormat,
}

impl Default for ForwardPipelineSettings {
    fn default() -> Self {
        Self {
            light_blocks_per_chunk: 256,
            depth_prepass: true,
            color_format: TextureFormat::Rgba8UnormSrgb,
            depth_format: TextureFormat::Depth32Float,
        }
    }
}

impl ForwardPipelineSettings {
    /// Parses settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the settings to a pretty-printed JSON document.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
