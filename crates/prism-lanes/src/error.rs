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

//! Errors raised while producing a frame.

use prism_core::renderer::ResourceError;
use thiserror::Error;

/// Errors raised while baking a frame graph.
#[derive(Debug, Error)]
pub enum FrameGraphError {
    /// Passes depend on each other through their attachments.
    #[error("frame graph contains a dependency cycle between passes {0:?}")]
    Cycle(Vec<String>),
    /// A pass referenced an attachment index that was never added.
    #[error("pass '{pass}' references unknown attachment {attachment}")]
    UnknownAttachment {
        /// Name of the offending pass.
        pass: String,
        /// The unknown attachment index.
        attachment: usize,
    },
    /// No backbuffer output was declared, so every pass would be culled.
    #[error("frame graph has no backbuffer output")]
    NoBackbufferOutput,
    /// A backing texture could not be created.
    #[error("failed to allocate attachment '{attachment}': {source}")]
    Allocation {
        /// Name of the attachment.
        attachment: String,
        /// The device error.
        #[source]
        source: ResourceError,
    },
}

/// Errors returned by the frame pipeline.
#[derive(Debug, Error)]
pub enum FramePipelineError {
    /// A GPU resource could not be created or written.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// The frame graph could not be baked.
    #[error(transparent)]
    FrameGraph(#[from] FrameGraphError),
    /// A visibility list referenced something that is no longer registered.
    #[error("stale {kind} handle in visibility input")]
    StaleHandle {
        /// What kind of handle was stale.
        kind: &'static str,
    },
    /// A render element type has no registered renderer.
    #[error("no element renderer registered for element type {0}")]
    MissingElementRenderer(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FrameGraphError::Cycle(vec!["A".into(), "B".into()]);
        assert_eq!(
            err.to_string(),
            "frame graph contains a dependency cycle between passes [\"A\", \"B\"]"
        );

        let err: FramePipelineError = ResourceError::OutOfMemory { requested: 64 }.into();
        assert_eq!(err.to_string(), "Device allocation of 64 bytes failed.");

        let err = FramePipelineError::StaleHandle { kind: "drawable" };
        assert_eq!(err.to_string(), "stale drawable handle in visibility input");
    }

    #[test]
    fn test_allocation_error_keeps_source() {
        use std::error::Error;
        let err = FrameGraphError::Allocation {
            attachment: "Depth".into(),
            source: ResourceError::OutOfMemory { requested: 4 },
        };
        assert!(err.source().is_some());
    }
}
