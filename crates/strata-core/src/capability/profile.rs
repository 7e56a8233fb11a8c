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

//! Backend profiles: the small description that distinguishes one GL-family backend
//! from another.

use super::string::DriverVersion;

const GL_VERSIONS: &[DriverVersion] = &[
    DriverVersion::new(1, 0),
    DriverVersion::new(1, 1),
    DriverVersion::new(1, 2),
    DriverVersion::new(1, 3),
    DriverVersion::new(1, 4),
    DriverVersion::new(1, 5),
    DriverVersion::new(2, 0),
    DriverVersion::new(2, 1),
    DriverVersion::new(3, 0),
    DriverVersion::new(3, 1),
    DriverVersion::new(3, 2),
    DriverVersion::new(3, 3),
    DriverVersion::new(4, 0),
    DriverVersion::new(4, 1),
    DriverVersion::new(4, 2),
    DriverVersion::new(4, 3),
    DriverVersion::new(4, 4),
    DriverVersion::new(4, 5),
    DriverVersion::new(4, 6),
];

const GLX_VERSIONS: &[DriverVersion] = &[
    DriverVersion::new(1, 0),
    DriverVersion::new(1, 1),
    DriverVersion::new(1, 2),
    DriverVersion::new(1, 3),
    DriverVersion::new(1, 4),
];

/// How entry points of a backend are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderStrategy {
    /// Names are passed to the generic resolver unchanged.
    Generic,
    /// The backend exports renamed entry points. Names that start with
    /// `canonical_prefix` are first looked up as `mangle_prefix + name`.
    Mangled {
        /// The prefix that marks a name as belonging to the API (`"gl"`).
        canonical_prefix: &'static str,
        /// The prefix the backend prepends (`"m"`, giving `"mglFoo"`).
        mangle_prefix: &'static str,
    },
}

/// Naming conventions and loader strategy of a backend family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendProfile {
    /// Human-readable name, used in logs.
    pub name: &'static str,
    /// Prefix of synthesized API version tokens (`"GL_VERSION_"`).
    pub version_token_prefix: &'static str,
    /// Every API version the registry knows how to synthesize, ascending.
    pub known_versions: &'static [DriverVersion],
    /// Prefix of synthesized window-system version tokens (`"GLX_VERSION_"`).
    pub platform_version_token_prefix: &'static str,
    /// Every window-system version the registry knows how to synthesize, ascending.
    pub known_platform_versions: &'static [DriverVersion],
    /// The lowest version every conforming driver provides. Its version token is the
    /// only one that survives the indirect-rendering workaround.
    pub floor_version: DriverVersion,
    /// How entry points are resolved.
    pub loader: LoaderStrategy,
}

impl BackendProfile {
    /// The system OpenGL implementation.
    pub const fn opengl() -> Self {
        Self {
            name: "OpenGL",
            version_token_prefix: "GL_VERSION_",
            known_versions: GL_VERSIONS,
            platform_version_token_prefix: "GLX_VERSION_",
            known_platform_versions: GLX_VERSIONS,
            floor_version: DriverVersion::new(1, 1),
            loader: LoaderStrategy::Generic,
        }
    }

    /// A name-mangled Mesa build whose entry points are exported as `mgl*`.
    pub const fn mangled_mesa() -> Self {
        Self {
            name: "Mangled Mesa",
            loader: LoaderStrategy::Mangled {
                canonical_prefix: "gl",
                mangle_prefix: "m",
            },
            ..Self::opengl()
        }
    }

    /// Formats the API version token for `version`.
    pub fn version_token(&self, version: DriverVersion) -> String {
        format!(
            "{}{}_{}",
            self.version_token_prefix, version.major, version.minor
        )
    }
}

impl Default for BackendProfile {
    fn default() -> Self {
        Self::opengl()
    }
}
