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


//! The OpenGL backend.
//!
//! - [`GlowGraphicsContext`]: a `strata_core::GraphicsContext` over a `glow::Context`.
//! - [`DynamicLibraryLoader`] / [`ProcAddressLoader`]: symbol loaders for the resolver.
//! - [`GlPeelingTarget`]: layer storage and compositing for depth peeling.

mod context;
mod loader;
mod peeling;

pub use self::context::{AlwaysCurrent, GlowGraphicsContext, WindowSystem};
pub use self::loader::{DynamicLibraryLoader, ProcAddressLoader};
pub use self::peeling::{CompositeProgram, GlPeelingTarget};
