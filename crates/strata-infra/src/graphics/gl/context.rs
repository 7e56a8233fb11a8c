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
use std::rc::Rc;

use glow::HasContext;
use strata_core::capability::DriverVersion;
use strata_core::{ContextKind, DriverIdentity, GraphicsContext, HardwareLimit};

// Compatibility-profile enum, absent from the core-profile constants glow exports.
const MAX_TEXTURE_UNITS: u32 = 0x84E2;

// A lost context keeps reporting an error; stop draining after this many.
const MAX_STALE_ERRORS: usize = 16;

/// The window-system side of a GL context: currency, direct rendering and the
/// platform extension string (GLX, WGL, EGL).
pub trait WindowSystem {
    /// Makes the context current on the calling thread.
    fn make_current(&self);

    /// Whether the context is current on the calling thread.
    fn is_current(&self) -> bool;

    /// Whether rendering goes straight to local hardware.
    fn is_direct_rendering(&self) -> bool {
        true
    }

    /// Whether the session has no reachable display (e.g. an off-screen server).
    fn is_headless(&self) -> bool {
        false
    }

    /// The window-system extension string.
    fn extension_string(&self) -> Option<String> {
        None
    }

    /// The window-system protocol version.
    fn version(&self) -> Option<DriverVersion> {
        None
    }

    /// The GLU extension string, when the host links GLU.
    fn utility_extension_string(&self) -> Option<String> {
        None
    }
}

/// A window system for hosts that keep their context current themselves, such as
/// an eframe `glow` callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCurrent;

impl WindowSystem for AlwaysCurrent {
    fn make_current(&self) {}

    fn is_current(&self) -> bool {
        true
    }
}

/// A [`GraphicsContext`] over a `glow::Context`.
pub struct GlowGraphicsContext<W: WindowSystem> {
    gl: Rc<glow::Context>,
    window_system: W,
}

impl<W: WindowSystem> GlowGraphicsContext<W> {
    /// Wraps a GL context and the window system it belongs to.
    pub fn new(gl: Rc<glow::Context>, window_system: W) -> Self {
        Self { gl, window_system }
    }

    /// The GL function table.
    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }

    /// The window system.
    pub fn window_system(&self) -> &W {
        &self.window_system
    }

    fn parameter_string(&self, parameter: u32) -> String {
        unsafe { self.gl.get_parameter_string(parameter) }
    }
}

impl<W: WindowSystem> GraphicsContext for GlowGraphicsContext<W> {
    fn kind(&self) -> ContextKind {
        if self.window_system.is_headless() {
            ContextKind::Headless
        } else {
            ContextKind::Native
        }
    }

    fn make_current(&self) {
        self.window_system.make_current();
    }

    fn is_current(&self) -> bool {
        self.window_system.is_current()
    }

    fn is_direct_rendering(&self) -> bool {
        self.window_system.is_direct_rendering()
    }

    fn driver_identity(&self) -> DriverIdentity {
        DriverIdentity::new(
            self.parameter_string(glow::RENDERER),
            self.parameter_string(glow::VENDOR),
            self.parameter_string(glow::VERSION),
        )
    }

    fn extension_list_string(&self) -> Option<String> {
        let mut extensions: Vec<&str> = self
            .gl
            .supported_extensions()
            .iter()
            .map(String::as_str)
            .collect();
        extensions.sort_unstable();
        Some(extensions.join(" "))
    }

    fn utility_extension_string(&self) -> Option<String> {
        self.window_system.utility_extension_string()
    }

    fn platform_extension_string(&self) -> Option<String> {
        self.window_system.extension_string()
    }

    fn platform_version(&self) -> Option<DriverVersion> {
        self.window_system.version()
    }

    fn query_integer(&self, limit: HardwareLimit) -> Option<i32> {
        let parameter = match limit {
            HardwareLimit::MaxTextureUnits => MAX_TEXTURE_UNITS,
            HardwareLimit::MaxCombinedTextureImageUnits => glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
        };
        unsafe {
            // Drain stale errors so the check below only sees this query.
            for _ in 0..MAX_STALE_ERRORS {
                if self.gl.get_error() == glow::NO_ERROR {
                    break;
                }
            }
            let value = self.gl.get_parameter_i32(parameter);
            match self.gl.get_error() {
                glow::NO_ERROR => Some(value),
                error => {
                    log::debug!("{limit:?} query failed with GL error 0x{error:04X}");
                    None
                }
            }
        }
    }
}

impl<W: WindowSystem> fmt::Debug for GlowGraphicsContext<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlowGraphicsContext")
            .field("version", self.gl.version())
            .finish_non_exhaustive()
    }
}
