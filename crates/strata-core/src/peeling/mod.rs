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


//! Order-independent transparency through depth peeling.
//!
//! Each peel renders the translucent geometry again while discarding every fragment at
//! or in front of the previous layer's depth, so layer `n` holds the `n`-th nearest
//! surface at every pixel. The layers are then blended back to front.
//!
//! The controller is backend-agnostic. A [`PeelingScene`] issues the draw calls and a
//! [`PeelingTarget`] owns the off-screen storage of the layers.

mod controller;
mod session;
mod settings;

pub use self::controller::{DepthPeelingController, PeelingState};
pub use self::settings::{PeelingSettings, DEFAULT_REQUIRED_CAPABILITIES, MAX_OCCLUSION_RATIO};

use crate::error::LayerStorageError;
use crate::hardware::{TextureUnit, TextureUnitAllocator};

/// Opaque identifier of a layer's storage inside a [`PeelingTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(pub u64);

/// Everything a scene needs to draw one peel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeelPass {
    /// Index of the layer, starting at 0 for the nearest surface.
    pub layer: u32,
    /// Storage the layer is rendered into.
    pub handle: LayerHandle,
    /// Unit holding the depth of the opaque pre-pass.
    pub opaque_depth_unit: Option<TextureUnit>,
    /// Unit holding the depth of the previous layer. `None` for layer 0.
    pub previous_depth_unit: Option<TextureUnit>,
}

/// The scene being rendered.
pub trait PeelingScene {
    /// Whether any translucent geometry is visible this frame.
    fn has_translucent_geometry(&self) -> bool;

    /// Draws the opaque geometry.
    fn render_opaque(&mut self);

    /// Draws the translucent geometry and returns how many props were drawn.
    ///
    /// `pass` is `None` for an ordinary blended pass, when peeling is not in use.
    fn render_translucent(&mut self, pass: Option<&PeelPass>) -> usize;
}

/// The backend storage a peel loop renders into.
///
/// Calls always arrive in this order: `begin_peeling`, then per layer `begin_layer`
/// followed by either `end_layer` or `discard_layer` (or `end_layer` then
/// `discard_layer`), then `composite` and `end_peeling`. When `begin_peeling` fails the
/// target must clean up after itself; neither `composite` nor `end_peeling` is called.
pub trait PeelingTarget {
    /// Captures the opaque pre-pass (depth and colour) and takes the texture units the
    /// loop needs.
    fn begin_peeling(&mut self, units: &mut TextureUnitAllocator) -> Result<(), LayerStorageError>;

    /// Allocates storage for `layer` and prepares the depth test against the previous
    /// layer.
    fn begin_layer(&mut self, layer: u32) -> Result<PeelPass, LayerStorageError>;

    /// Finishes a layer and returns the number of fragments it peeled.
    fn end_layer(&mut self, pass: &PeelPass) -> u64;

    /// Frees a layer that will not be composited.
    fn discard_layer(&mut self, pass: PeelPass);

    /// Blends the opaque image and `layers` (nearest first) back to front.
    fn composite(&mut self, layers: &[LayerHandle]);

    /// Number of pixels in the viewport, for the occlusion threshold.
    fn viewport_pixels(&self) -> u64;

    /// Restores render state, frees every layer and returns the texture units.
    fn end_peeling(&mut self, units: &mut TextureUnitAllocator);

    /// Prepares an ordinary blended translucent pass.
    fn begin_plain_translucent(&mut self) {}

    /// Undoes [`PeelingTarget::begin_plain_translucent`].
    fn end_plain_translucent(&mut self) {}
}

/// Why a peel loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeelTermination {
    /// Storage for the next layer could not be obtained.
    OutOfResources,
    /// The last layer peeled nothing, or few enough fragments to stop.
    NoGeometryLeft,
    /// The configured maximum number of peels was reached.
    LayerLimitReached,
}

/// Why translucent geometry was drawn with ordinary blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlainBlendingReason {
    /// The context lacks a required capability.
    Unsupported,
    /// There was no translucent geometry to peel.
    NoTranslucentGeometry,
    /// Peeling ran out of resources before any layer was composited.
    NoLayersComposited,
}

/// How the translucent geometry ended up on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeelMode {
    /// Through composited depth peels.
    Peeled,
    /// Through a single blended pass.
    PlainBlending(PlainBlendingReason),
}

/// The outcome of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeelReport {
    /// Number of layers composited.
    pub layers_rendered: u32,
    /// Why the peel loop stopped. `None` when no loop ran.
    pub termination: Option<PeelTermination>,
    /// How the translucent geometry was drawn.
    pub mode: PeelMode,
}

impl PeelReport {
    fn plain(reason: PlainBlendingReason, termination: Option<PeelTermination>) -> Self {
        Self {
            layers_rendered: 0,
            termination,
            mode: PeelMode::PlainBlending(reason),
        }
    }
}
