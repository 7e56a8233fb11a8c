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

//! The contract between this crate and a live graphics context.
//!
//! A [`GraphicsContext`] is never owned here. Callers hand in a shared handle, which is
//! wrapped into a [`ContextBinding`] stamped with a fresh [`ContextGeneration`]. Every
//! cache in the crate (capability strings, symbol tables, texture unit pools, the depth
//! peeling support flag) is keyed by that generation, so binding a new context always
//! starts from a clean slate.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capability::DriverVersion;

/// Classifies a context before any capability probing is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContextKind {
    /// A native immediate-mode context that can report its extensions.
    #[default]
    Native,
    /// A context from another API family. It has no extensions to report.
    Foreign,
    /// An off-screen session with no reachable display or surface.
    Headless,
}

/// The driver identity strings, as reported by the context at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverIdentity {
    /// The renderer string (e.g. "Quadro4 900 XGL/AGP/SSE2").
    pub renderer: String,
    /// The vendor string (e.g. "ATI Technologies Inc.").
    pub vendor: String,
    /// The version string (e.g. "2.0 ATI-1.4.58").
    pub version: String,
}

impl DriverIdentity {
    /// Creates an identity from its three strings.
    pub fn new(
        renderer: impl Into<String>,
        vendor: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            renderer: renderer.into(),
            vendor: vendor.into(),
            version: version.into(),
        }
    }

    /// The `major.minor` pair embedded in the version string, if any.
    pub fn parsed_version(&self) -> Option<DriverVersion> {
        DriverVersion::parse(&self.version)
    }
}

/// Small integer hardware limits that can be read from a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareLimit {
    /// Number of fixed-function texture units.
    MaxTextureUnits,
    /// Number of texture image units reachable from all shader stages combined.
    MaxCombinedTextureImageUnits,
}

/// A live rendering context, as seen by the capability and peeling machinery.
///
/// All methods are expected to be cheap, synchronous queries against the driver. The
/// caller guarantees that the context can be made current on the calling thread; no
/// thread-affinity checks are performed here.
pub trait GraphicsContext: fmt::Debug {
    /// What kind of context this is. Anything other than [`ContextKind::Native`]
    /// short-circuits capability probing to an empty result.
    fn kind(&self) -> ContextKind {
        ContextKind::Native
    }

    /// Attempts to make this context current on the calling thread.
    fn make_current(&self);

    /// Whether this context is current on the calling thread.
    fn is_current(&self) -> bool;

    /// Whether rendering goes straight to local hardware, as opposed to an indirect
    /// (remote, forwarded) session.
    fn is_direct_rendering(&self) -> bool;

    /// Queries the renderer/vendor/version strings. Never cached by callers.
    fn driver_identity(&self) -> DriverIdentity;

    /// The context's own space-separated extension list, if it can report one.
    fn extension_list_string(&self) -> Option<String>;

    /// The extension string of the GL utility library (GLU), when one is linked.
    fn utility_extension_string(&self) -> Option<String> {
        None
    }

    /// The window-system extension string (GLX, WGL, ...), when the platform has one.
    fn platform_extension_string(&self) -> Option<String> {
        None
    }

    /// The window-system protocol version (e.g. GLX 1.4), when the platform has one.
    fn platform_version(&self) -> Option<DriverVersion> {
        None
    }

    /// Reads an integer hardware limit. `None` when the query is unavailable.
    fn query_integer(&self, limit: HardwareLimit) -> Option<i32>;
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A process-unique number identifying one binding of one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextGeneration(u64);

impl ContextGeneration {
    /// Allocates the next generation number.
    pub fn next() -> Self {
        Self(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw generation number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A context handle paired with the generation it was bound under.
#[derive(Debug, Clone)]
pub struct ContextBinding {
    context: Rc<dyn GraphicsContext>,
    generation: ContextGeneration,
}

impl ContextBinding {
    /// Binds `context` under a fresh generation.
    pub fn new(context: Rc<dyn GraphicsContext>) -> Self {
        Self {
            context,
            generation: ContextGeneration::next(),
        }
    }

    /// The bound context.
    pub fn context(&self) -> &dyn GraphicsContext {
        self.context.as_ref()
    }

    /// A shared handle to the bound context.
    pub fn handle(&self) -> &Rc<dyn GraphicsContext> {
        &self.context
    }

    /// The generation this binding was created under.
    pub fn generation(&self) -> ContextGeneration {
        self.generation
    }
}
