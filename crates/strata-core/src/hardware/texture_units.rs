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

use std::fmt;

use super::limits::HardwareLimitsProbe;
use crate::context::{ContextBinding, ContextGeneration};
use crate::error::TextureUnitError;

/// Index of a hardware texture unit (`0` is `GL_TEXTURE0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(u32);

impl TextureUnit {
    /// Wraps a raw unit index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw unit index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TextureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TEXTURE{}", self.0)
    }
}

/// Hands out texture units of the bound context to independent renderers.
///
/// The pool is sized from [`HardwareLimitsProbe::number_of_texture_units`] when a
/// context is bound and thrown away when a different one is.
#[derive(Debug, Default)]
pub struct TextureUnitAllocator {
    generation: Option<ContextGeneration>,
    units: Vec<bool>,
}

impl TextureUnitAllocator {
    /// An allocator with no context and an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the allocator to a context.
    ///
    /// Binding the generation that is already bound does nothing. Otherwise every unit
    /// of the previous pool is dropped, whether or not it was released.
    pub fn bind(&mut self, binding: &ContextBinding) {
        if self.generation == Some(binding.generation()) {
            return;
        }
        self.drop_pool();
        let count = HardwareLimitsProbe::new(binding.context()).number_of_texture_units();
        self.units = vec![false; count as usize];
        self.generation = Some(binding.generation());
        log::debug!(
            "Texture unit pool of {count} units for context {}",
            binding.generation()
        );
    }

    /// Drops the pool.
    pub fn unbind(&mut self) {
        self.drop_pool();
        self.generation = None;
    }

    /// The generation the pool belongs to.
    pub fn generation(&self) -> Option<ContextGeneration> {
        self.generation
    }

    /// Takes the lowest free unit, or `None` when every unit is in use.
    pub fn acquire(&mut self) -> Option<TextureUnit> {
        let index = self.units.iter().position(|in_use| !in_use)?;
        self.units[index] = true;
        Some(TextureUnit::new(index as u32))
    }

    /// Returns a unit to the pool.
    pub fn release(&mut self, unit: TextureUnit) -> Result<(), TextureUnitError> {
        if self.generation.is_none() {
            return Err(TextureUnitError::Unbound);
        }
        let available = self.units.len();
        match self.units.get_mut(unit.index() as usize) {
            None => Err(TextureUnitError::OutOfRange { unit, available }),
            Some(in_use) if !*in_use => Err(TextureUnitError::NotAllocated(unit)),
            Some(in_use) => {
                *in_use = false;
                Ok(())
            }
        }
    }

    /// Whether `unit` is currently handed out. Out-of-range units are never allocated.
    pub fn is_allocated(&self, unit: TextureUnit) -> bool {
        self.units
            .get(unit.index() as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Size of the pool.
    pub fn number_of_units(&self) -> usize {
        self.units.len()
    }

    /// Units still available.
    pub fn free_units(&self) -> usize {
        self.units.iter().filter(|in_use| !**in_use).count()
    }

    fn drop_pool(&mut self) {
        let leaked = self.units.iter().filter(|in_use| **in_use).count();
        if leaked > 0 {
            log::warn!("Dropping texture unit pool with {leaked} units still allocated");
        }
        self.units.clear();
    }
}
