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

//! Driver quirk overrides.
//!
//! Some drivers advertise capabilities they do not actually deliver. A [`QuirkTable`]
//! is an ordered list of [`QuirkRule`]s evaluated after the plain token match. A rule
//! can only suppress a token that matched; it can never make an absent token appear.
//! Evaluation order is significant and is the order of insertion.

use super::string::{parse_version_token, DriverVersion};
use super::symbols::ProcAddress;
use crate::context::DriverIdentity;

/// Live driver state a quirk predicate may inspect.
///
/// Implementations must query the driver on every call; predicates rely on seeing the
/// current strings, not a snapshot taken when the capability string was built.
pub trait QuirkEnvironment {
    /// Whether the context renders directly to local hardware.
    fn is_direct_rendering(&self) -> bool;
    /// The renderer/vendor/version strings.
    fn driver_identity(&self) -> DriverIdentity;
    /// Resolves an entry point.
    fn resolve(&self, name: &str) -> Option<ProcAddress>;
}

/// Which tokens a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPattern {
    /// Exactly this token.
    Exact(&'static str),
    /// Any of these tokens.
    AnyOf(&'static [&'static str]),
    /// Any `<family>_VERSION_M_m` token except the one for `keep`.
    VersionOtherThan {
        /// The token family, e.g. `"GL"`.
        family: &'static str,
        /// The one version left alone.
        keep: DriverVersion,
    },
}

impl TokenPattern {
    /// Whether `token` falls under this pattern.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            TokenPattern::Exact(expected) => *expected == token,
            TokenPattern::AnyOf(candidates) => candidates.contains(&token),
            TokenPattern::VersionOtherThan { family, keep } => matches!(
                parse_version_token(token),
                Some((found, version)) if found == *family && version != *keep
            ),
        }
    }
}

/// The driver condition under which a rule fires.
#[derive(Debug, Clone)]
pub enum DriverPredicate {
    /// The session renders indirectly (e.g. forwarded over the network).
    IndirectRendering,
    /// At least one of these entry points fails to resolve.
    MissingEntryPoints(&'static [&'static str]),
    /// The renderer string contains any of these substrings.
    RendererContainsAny(&'static [&'static str]),
    /// The renderer, version and vendor strings all equal these values.
    DriverIdentityIs {
        /// Expected renderer string.
        renderer: &'static str,
        /// Expected version string.
        version: &'static str,
        /// Expected vendor string.
        vendor: &'static str,
    },
    /// An arbitrary check.
    Custom(fn(&dyn QuirkEnvironment) -> bool),
}

impl DriverPredicate {
    /// Evaluates the predicate against the live driver.
    pub fn holds(&self, env: &dyn QuirkEnvironment) -> bool {
        match self {
            DriverPredicate::IndirectRendering => !env.is_direct_rendering(),
            DriverPredicate::MissingEntryPoints(names) => {
                names.iter().any(|name| env.resolve(name).is_none())
            }
            DriverPredicate::RendererContainsAny(needles) => {
                let renderer = env.driver_identity().renderer;
                needles.iter().any(|needle| renderer.contains(needle))
            }
            DriverPredicate::DriverIdentityIs {
                renderer,
                version,
                vendor,
            } => {
                let identity = env.driver_identity();
                identity.renderer == *renderer
                    && identity.version == *version
                    && identity.vendor == *vendor
            }
            DriverPredicate::Custom(check) => check(env),
        }
    }
}

/// A single workaround: when a token matching `pattern` is supported and `predicate`
/// holds, the token is reported as unsupported.
#[derive(Debug, Clone)]
pub struct QuirkRule {
    /// A short name for logs.
    pub name: &'static str,
    /// The tokens this rule covers.
    pub pattern: TokenPattern,
    /// The driver condition.
    pub predicate: DriverPredicate,
}

impl QuirkRule {
    /// Creates a rule.
    pub const fn new(name: &'static str, pattern: TokenPattern, predicate: DriverPredicate) -> Self {
        Self {
            name,
            pattern,
            predicate,
        }
    }
}

/// An ordered list of quirk rules.
#[derive(Debug, Clone, Default)]
pub struct QuirkTable {
    rules: Vec<QuirkRule>,
}

impl QuirkTable {
    /// A table with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// The known driver workarounds, in evaluation order.
    ///
    /// `floor` is the API version every driver provides; its token is the only API
    /// version token that survives the indirect-rendering rule.
    pub fn builtin(floor: DriverVersion) -> Self {
        // Remote sessions report the server's version even though the forwarded
        // protocol does not carry the newer core features (pixel buffer objects in 2.1
        // being the known case). Only extensions and the floor version are trusted.
        let indirect = QuirkRule::new(
            "indirect-rendering-version-cap",
            TokenPattern::VersionOtherThan {
                family: "GL",
                keep: floor,
            },
            DriverPredicate::IndirectRendering,
        );
        // GeForce FX 5200 on Mac OS 10.3.9 claims 1.4 but has no point parameters.
        let point_parameters = QuirkRule::new(
            "gl-1.4-missing-point-parameters",
            TokenPattern::Exact("GL_VERSION_1_4"),
            DriverPredicate::MissingEntryPoints(&["glPointParameteri", "glPointParameteriv"]),
        );
        // NV2x chips implement GL_EXT_blend_func_separate (core in 1.4) in software.
        let nv2x_blend = QuirkRule::new(
            "nv2x-software-blend-func-separate",
            TokenPattern::Exact("GL_VERSION_1_4"),
            DriverPredicate::RendererContainsAny(&["Quadro4", "GeForce4"]),
        );
        // Radeon X1600 under Mac OS 10.4.11 advertises NPOT textures (core in 2.0) but
        // they do not work. Both the version and the extension go.
        let x1600_npot = QuirkRule::new(
            "radeon-x1600-npot",
            TokenPattern::AnyOf(&["GL_VERSION_2_0", "GL_ARB_texture_non_power_of_two"]),
            DriverPredicate::DriverIdentityIs {
                renderer: "ATI Radeon X1600 OpenGL Engine",
                version: "2.0 ATI-1.4.58",
                vendor: "ATI Technologies Inc.",
            },
        );

        Self {
            rules: vec![indirect, point_parameters, nv2x_blend, x1600_npot],
        }
    }

    /// Appends a rule. It runs after every rule already in the table.
    pub fn push(&mut self, rule: QuirkRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[QuirkRule] {
        &self.rules
    }

    /// Applies the table to a raw match result.
    ///
    /// Returns `false` as soon as a rule fires; an unmatched token is returned as-is
    /// without consulting the driver at all.
    pub fn apply(&self, token: &str, matched: bool, env: &dyn QuirkEnvironment) -> bool {
        if !matched {
            return false;
        }
        for rule in &self.rules {
            if rule.pattern.matches(token) && rule.predicate.holds(env) {
                log::debug!("Driver quirk '{}' suppresses '{token}'", rule.name);
                return false;
            }
        }
        true
    }
}
