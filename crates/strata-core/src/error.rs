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

//! Error types for the few operations that can actually fail.
//!
//! Missing capabilities, absent entry points and an exhausted texture unit pool are
//! not errors: they surface as `bool` or `Option`. The types here cover contract
//! violations and the storage failures a peeling backend reports to the controller.

use std::fmt;

use crate::hardware::TextureUnit;

/// An error returned when releasing a texture unit back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureUnitError {
    /// No context is bound, so there is no pool.
    Unbound,
    /// The unit index is outside the pool.
    OutOfRange {
        /// The offending unit.
        unit: TextureUnit,
        /// The size of the pool.
        available: usize,
    },
    /// The unit is inside the pool but is not currently allocated.
    NotAllocated(TextureUnit),
}

impl fmt::Display for TextureUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureUnitError::Unbound => {
                write!(f, "No context is bound to the texture unit allocator.")
            }
            TextureUnitError::OutOfRange { unit, available } => {
                write!(
                    f,
                    "Texture unit {} is out of range (pool has {available} units).",
                    unit.index()
                )
            }
            TextureUnitError::NotAllocated(unit) => {
                write!(f, "Texture unit {} is not allocated.", unit.index())
            }
        }
    }
}

impl std::error::Error for TextureUnitError {}

/// A failure to obtain storage for a depth peeling pass.
///
/// The controller never propagates these: any of them ends the peel loop early and the
/// frame is finished with whatever layers were already captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStorageError {
    /// The GPU ran out of memory while allocating storage. `layer` is `None` when the
    /// failure happened while capturing the opaque pre-pass.
    OutOfMemory {
        /// The layer being allocated, if any.
        layer: Option<u32>,
    },
    /// Not enough free texture units to bind the depth buffers.
    TextureUnitsExhausted {
        /// How many units the backend needed.
        required: usize,
    },
    /// Any other backend-specific failure.
    Backend(String),
}

impl fmt::Display for LayerStorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerStorageError::OutOfMemory { layer: Some(layer) } => {
                write!(f, "Out of GPU memory while allocating peel layer {layer}.")
            }
            LayerStorageError::OutOfMemory { layer: None } => {
                write!(f, "Out of GPU memory while capturing the opaque pass.")
            }
            LayerStorageError::TextureUnitsExhausted { required } => {
                write!(f, "Depth peeling needs {required} free texture units.")
            }
            LayerStorageError::Backend(msg) => {
                write!(f, "Backend-specific layer storage error: {msg}")
            }
        }
    }
}

impl std::error::Error for LayerStorageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_unit_error_display() {
        let err = TextureUnitError::OutOfRange {
            unit: TextureUnit::new(9),
            available: 4,
        };
        assert_eq!(
            format!("{err}"),
            "Texture unit 9 is out of range (pool has 4 units)."
        );
        assert_eq!(
            format!("{}", TextureUnitError::NotAllocated(TextureUnit::new(2))),
            "Texture unit 2 is not allocated."
        );
    }

    #[test]
    fn layer_storage_error_display() {
        assert_eq!(
            format!("{}", LayerStorageError::OutOfMemory { layer: Some(3) }),
            "Out of GPU memory while allocating peel layer 3."
        );
        assert_eq!(
            format!("{}", LayerStorageError::OutOfMemory { layer: None }),
            "Out of GPU memory while capturing the opaque pass."
        );
        assert_eq!(
            format!("{}", LayerStorageError::Backend("lost".into())),
            "Backend-specific layer storage error: lost"
        );
    }
}
