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


use super::{LayerHandle, PeelTermination};

/// Per-frame bookkeeping of one peel loop. Lives for a single call to
/// [`DepthPeelingController::render_with_depth_peeling`](super::DepthPeelingController::render_with_depth_peeling).
#[derive(Debug, Default)]
pub(crate) struct PeelSession {
    next_layer: u32,
    layers: Vec<LayerHandle>,
    opaque_captured: bool,
    termination: Option<PeelTermination>,
}

impl PeelSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_opaque_captured(&mut self) {
        self.opaque_captured = true;
    }

    pub(crate) fn opaque_captured(&self) -> bool {
        self.opaque_captured
    }

    pub(crate) fn next_layer(&self) -> u32 {
        self.next_layer
    }

    pub(crate) fn accumulate(&mut self, handle: LayerHandle) {
        self.layers.push(handle);
        self.next_layer += 1;
    }

    pub(crate) fn layers(&self) -> &[LayerHandle] {
        &self.layers
    }

    pub(crate) fn layers_rendered(&self) -> u32 {
        self.layers.len() as u32
    }

    pub(crate) fn terminate(&mut self, reason: PeelTermination) {
        debug_assert!(self.termination.is_none(), "peel session terminated twice");
        self.termination = Some(reason);
    }

    pub(crate) fn termination(&self) -> Option<PeelTermination> {
        self.termination
    }
}
