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


//! A single owner for everything that is tied to the bound context.

use std::rc::Rc;

use crate::capability::{BackendProfile, CapabilityRegistry, ProcAddress, SymbolResolver};
use crate::context::{ContextBinding, ContextGeneration, GraphicsContext};
use crate::error::TextureUnitError;
use crate::hardware::{HardwareLimitsProbe, TextureUnit, TextureUnitAllocator};
use crate::peeling::{
    DepthPeelingController, PeelReport, PeelingScene, PeelingSettings, PeelingTarget,
};

/// The capability registry, texture unit pool and depth peeling controller of one
/// context, rebound together.
///
/// This is what a renderer holds on to. Binding a context creates a new
/// [`ContextGeneration`]; every cache behind this facade is keyed by it.
#[derive(Debug)]
pub struct ContextState {
    registry: CapabilityRegistry,
    texture_units: TextureUnitAllocator,
    peeling: DepthPeelingController,
}

impl ContextState {
    /// Creates the state for a backend. No context is bound yet.
    pub fn new(profile: BackendProfile, resolver: SymbolResolver, settings: PeelingSettings) -> Self {
        Self {
            registry: CapabilityRegistry::new(profile, resolver),
            texture_units: TextureUnitAllocator::new(),
            peeling: DepthPeelingController::new(settings),
        }
    }

    /// Binds `context` under a fresh generation, dropping every cache of the previous
    /// one.
    pub fn bind_context(&mut self, context: Rc<dyn GraphicsContext>) -> ContextGeneration {
        let binding = ContextBinding::new(context);
        let generation = binding.generation();
        self.texture_units.bind(&binding);
        self.registry.bind(binding);
        self.peeling.bind(generation);
        generation
    }

    /// Drops the bound context.
    pub fn unbind_context(&mut self) {
        self.registry.unbind();
        self.texture_units.unbind();
        self.peeling.unbind();
    }

    /// The generation of the bound context.
    pub fn generation(&self) -> Option<ContextGeneration> {
        self.registry.generation()
    }

    /// Whether the bound context supports `token`.
    pub fn supports(&self, token: &str) -> bool {
        self.registry.supports(token)
    }

    /// Resolves an entry point.
    pub fn resolve(&self, name: &str) -> Option<ProcAddress> {
        self.registry.resolve(name)
    }

    /// Live texture unit count of the bound context; `1` when nothing is bound.
    pub fn max_texture_units(&self) -> u32 {
        self.registry
            .context()
            .map_or(1, |context| HardwareLimitsProbe::new(context).max_texture_units())
    }

    /// Live combined texture image unit count of the bound context; `1` when nothing is
    /// bound.
    pub fn max_combined_texture_image_units(&self) -> u32 {
        self.registry.context().map_or(1, |context| {
            HardwareLimitsProbe::new(context).max_combined_texture_image_units()
        })
    }

    /// Fixed-function texture units of the bound context; `1` when nothing is bound.
    pub fn number_of_fixed_texture_units(&self) -> u32 {
        self.registry.context().map_or(1, |context| {
            HardwareLimitsProbe::new(context).number_of_fixed_texture_units()
        })
    }

    /// Texture image units a shader program can reach; `1` when nothing is bound.
    pub fn number_of_texture_units(&self) -> u32 {
        self.registry
            .context()
            .map_or(1, |context| HardwareLimitsProbe::new(context).number_of_texture_units())
    }

    /// Whether the bound context can sample more than one texture in the fixed pipeline.
    pub fn supports_multi_texturing(&self) -> bool {
        self.registry.context().is_some_and(|context| {
            HardwareLimitsProbe::new(context).supports_multi_texturing(&self.registry)
        })
    }

    /// Resolves every entry point of an extension. See
    /// [`CapabilityRegistry::load_extension`].
    pub fn load_extension(&self, token: &str, symbols: &[&str]) -> bool {
        self.registry.load_extension(token, symbols)
    }

    /// Resolves an extension's entry points if the bound context supports it.
    pub fn load_supported_extension(&self, token: &str, symbols: &[&str]) -> bool {
        self.registry.load_supported_extension(token, symbols)
    }

    /// Takes a free texture unit.
    pub fn acquire_texture_unit(&mut self) -> Option<TextureUnit> {
        self.texture_units.acquire()
    }

    /// Returns a texture unit.
    pub fn release_texture_unit(&mut self, unit: TextureUnit) -> Result<(), TextureUnitError> {
        self.texture_units.release(unit)
    }

    /// Whether depth peeling can run on the bound context.
    pub fn is_depth_peeling_supported(&mut self) -> bool {
        self.peeling.is_depth_peeling_supported(&self.registry)
    }

    /// Renders a frame through the depth peeling controller.
    pub fn render_with_depth_peeling(
        &mut self,
        scene: &mut dyn PeelingScene,
        target: &mut dyn PeelingTarget,
    ) -> PeelReport {
        self.peeling
            .render_with_depth_peeling(&self.registry, &mut self.texture_units, scene, target)
    }

    /// The capability registry.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// The capability registry, for adding quirk rules.
    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.registry
    }

    /// The texture unit pool.
    pub fn texture_units(&self) -> &TextureUnitAllocator {
        &self.texture_units
    }

    /// The texture unit pool, for handing to other renderers.
    pub fn texture_units_mut(&mut self) -> &mut TextureUnitAllocator {
        &mut self.texture_units
    }

    /// The depth peeling controller.
    pub fn peeling(&self) -> &DepthPeelingController {
        &self.peeling
    }

    /// The depth peeling controller, for changing settings.
    pub fn peeling_mut(&mut self) -> &mut DepthPeelingController {
        &mut self.peeling
    }
}
