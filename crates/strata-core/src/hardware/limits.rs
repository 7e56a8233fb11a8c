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

use crate::capability::CapabilityQuery;
use crate::context::{GraphicsContext, HardwareLimit};

/// Reads integer hardware limits from a context.
///
/// Every call goes to the driver; nothing is cached. A limit the driver does not
/// report, or reports as zero or negative, reads as `1`.
#[derive(Debug, Clone, Copy)]
pub struct HardwareLimitsProbe<'a> {
    context: &'a dyn GraphicsContext,
}

impl<'a> HardwareLimitsProbe<'a> {
    /// Creates a probe over `context`.
    pub fn new(context: &'a dyn GraphicsContext) -> Self {
        Self { context }
    }

    /// Number of fixed-function texture units.
    pub fn max_texture_units(&self) -> u32 {
        self.read(HardwareLimit::MaxTextureUnits)
    }

    /// Number of texture image units across all shader stages.
    pub fn max_combined_texture_image_units(&self) -> u32 {
        self.read(HardwareLimit::MaxCombinedTextureImageUnits)
    }

    /// Texture units usable by the fixed-function pipeline. Same as
    /// [`max_texture_units`](Self::max_texture_units).
    pub fn number_of_fixed_texture_units(&self) -> u32 {
        self.max_texture_units()
    }

    /// Texture image units reachable from a shader program.
    ///
    /// The combined image unit count, or the fixed-function count when the combined
    /// one is not reported.
    pub fn number_of_texture_units(&self) -> u32 {
        self.read_raw(HardwareLimit::MaxCombinedTextureImageUnits)
            .unwrap_or_else(|| self.max_texture_units())
    }

    /// Whether more than one texture can be bound at once: the context exposes
    /// `GL_ARB_multitexture` (core since 1.3) and has more than one fixed-function
    /// unit.
    pub fn supports_multi_texturing(&self, caps: &dyn CapabilityQuery) -> bool {
        let advertised = caps.supports("GL_VERSION_1_3") || caps.supports("GL_ARB_multitexture");
        advertised && self.number_of_fixed_texture_units() > 1
    }

    fn read_raw(&self, limit: HardwareLimit) -> Option<u32> {
        match self.context.query_integer(limit) {
            Some(value) if value > 0 => Some(value as u32),
            other => {
                log::debug!("{limit:?} reported as {other:?}");
                None
            }
        }
    }

    fn read(&self, limit: HardwareLimit) -> u32 {
        self.read_raw(limit).unwrap_or(1)
    }
}
