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

//! # Strata Core
//!
//! Backend-agnostic contracts and logic for negotiating GPU capability with a live,
//! immediate-mode graphics context, and for driving order-independent transparency
//! through depth peeling.
//!
//! The crate never talks to a driver directly. Everything it needs from the outside
//! world comes in through three traits:
//!
//! - [`GraphicsContext`]: the current rendering context (driver strings, extension
//!   lists, integer limits).
//! - [`SymbolLoader`]: a way to look up a native entry point by name.
//! - [`PeelingScene`] / [`PeelingTarget`]: the scene that issues draw calls and the
//!   backend that owns off-screen layer storage.
//!
//! Concrete implementations on top of OpenGL live in the `strata-infra` crate.

#![warn(missing_docs)]

pub mod capability;
pub mod context;
pub mod error;
pub mod hardware;
pub mod peeling;
pub mod state;

pub use capability::{
    BackendProfile, CapabilityQuery, CapabilityRegistry, CapabilityString, DriverVersion,
    LoaderStrategy, ProcAddress, QuirkRule, QuirkTable, SymbolLoader, SymbolResolver,
};
pub use context::{
    ContextBinding, ContextGeneration, ContextKind, DriverIdentity, GraphicsContext,
    HardwareLimit,
};
pub use error::{LayerStorageError, TextureUnitError};
pub use hardware::{HardwareLimitsProbe, TextureUnit, TextureUnitAllocator};
pub use peeling::{
    DepthPeelingController, LayerHandle, PeelMode, PeelPass, PeelReport, PeelTermination,
    PeelingScene, PeelingSettings, PeelingState, PeelingTarget, PlainBlendingReason,
};
pub use state::ContextState;
