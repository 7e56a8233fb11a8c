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


//! Tunables of the depth peeling controller.

/// Capability tokens the peeling path needs by default: depth textures to store the
/// previous layer, and depth comparison to test against it.
pub const DEFAULT_REQUIRED_CAPABILITIES: &[&str] = &["GL_ARB_depth_texture", "GL_ARB_shadow"];

/// Upper bound of [`PeelingSettings::occlusion_ratio`].
pub const MAX_OCCLUSION_RATIO: f64 = 0.5;

/// Settings that shape how many layers a frame peels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeelingSettings {
    /// Hard cap on the number of peeled layers. `0` means no cap.
    pub maximum_number_of_peels: u32,
    /// Fraction of the viewport below which a layer is considered the last one worth
    /// peeling. `0.0` peels until a layer is empty. Clamped to `0.0..=0.5` on use.
    pub occlusion_ratio: f64,
    /// Tokens that must all be supported for peeling to be attempted.
    pub required_capabilities: Vec<String>,
}

impl PeelingSettings {
    /// The occlusion ratio, clamped to its valid range.
    pub fn clamped_occlusion_ratio(&self) -> f64 {
        if self.occlusion_ratio.is_nan() {
            return 0.0;
        }
        self.occlusion_ratio.clamp(0.0, MAX_OCCLUSION_RATIO)
    }

    /// Fragment count at or below which peeling stops, for a viewport of `pixels`.
    pub fn occlusion_threshold(&self, viewport_pixels: u64) -> u64 {
        (self.clamped_occlusion_ratio() * viewport_pixels as f64) as u64
    }

    /// Whether `layers` already reaches the peel cap.
    pub fn layer_limit_reached(&self, layers: u32) -> bool {
        self.maximum_number_of_peels != 0 && layers >= self.maximum_number_of_peels
    }
}

impl Default for PeelingSettings {
    fn default() -> Self {
        Self {
            maximum_number_of_peels: 4,
            occlusion_ratio: 0.0,
            required_capabilities: DEFAULT_REQUIRED_CAPABILITIES
                .iter()
                .map(|token| token.to_string())
                .collect(),
        }
    }
}
