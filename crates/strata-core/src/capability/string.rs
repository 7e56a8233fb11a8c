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

//! Capability strings and driver version parsing.

use std::fmt;

/// A `major.minor` API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DriverVersion {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
}

impl DriverVersion {
    /// Creates a version.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Extracts the first `major.minor` pair from a driver version string.
    ///
    /// Vendors append arbitrary text after the number (`"4.6.0 NVIDIA 535.54"`) and ES
    /// drivers prepend some (`"OpenGL ES 3.2 Mesa 23.1"`), so the first digit run that is
    /// followed by a dot and another digit run wins.
    pub fn parse(version: &str) -> Option<Self> {
        let bytes = version.as_bytes();
        let digits_from = |start: usize| {
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            end
        };

        let mut i = 0;
        while i < bytes.len() {
            if !bytes[i].is_ascii_digit() {
                i += 1;
                continue;
            }
            let major_end = digits_from(i);
            if major_end < bytes.len() && bytes[major_end] == b'.' {
                let minor_end = digits_from(major_end + 1);
                if minor_end > major_end + 1 {
                    let major = version[i..major_end].parse().ok()?;
                    let minor = version[major_end + 1..minor_end].parse().ok()?;
                    return Some(Self::new(major, minor));
                }
            }
            i = major_end;
        }
        None
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Splits a synthesized version token such as `GL_VERSION_2_1` into its family prefix
/// (`GL`) and version.
pub fn parse_version_token(token: &str) -> Option<(&str, DriverVersion)> {
    const MARKER: &str = "_VERSION_";
    let at = token.find(MARKER)?;
    let family = &token[..at];
    let (major, minor) = token[at + MARKER.len()..].split_once('_')?;
    if family.is_empty() {
        return None;
    }
    Some((
        family,
        DriverVersion::new(major.parse().ok()?, minor.parse().ok()?),
    ))
}

/// The immutable, whitespace-delimited set of capability tokens for one context.
///
/// Lookups are exact, whole-token comparisons: `GL_ARB_foo` never matches inside
/// `GL_ARB_foo_bar`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityString {
    raw: String,
}

impl CapabilityString {
    /// The empty capability string (no context, or a context that cannot report).
    pub const EMPTY: CapabilityString = CapabilityString { raw: String::new() };

    /// Wraps an already-assembled token list.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The raw string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Iterates over the tokens in insertion order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.raw.split_ascii_whitespace()
    }

    /// Number of tokens.
    pub fn token_count(&self) -> usize {
        self.tokens().count()
    }

    /// Whether the string holds no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.tokens().next().is_none()
    }

    /// Exact whole-token membership.
    pub fn contains(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens().any(|t| t == token)
    }
}

impl fmt::Display for CapabilityString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Assembles a [`CapabilityString`] from the pieces a context reports.
#[derive(Debug, Default)]
pub struct CapabilityStringBuilder {
    raw: String,
}

impl CapabilityStringBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every token of a space-separated list.
    pub fn push_list(&mut self, list: &str) -> &mut Self {
        for token in list.split_ascii_whitespace() {
            self.push_token(token);
        }
        self
    }

    /// Appends a single token.
    pub fn push_token(&mut self, token: &str) -> &mut Self {
        if token.is_empty() {
            return self;
        }
        if !self.raw.is_empty() {
            self.raw.push(' ');
        }
        self.raw.push_str(token);
        self
    }

    /// Appends `<prefix><M>_<m>` for every known version up to and including `reported`,
    /// lowest first.
    pub fn push_versions(
        &mut self,
        prefix: &str,
        known: &[DriverVersion],
        reported: DriverVersion,
    ) -> &mut Self {
        for version in known.iter().filter(|v| **v <= reported) {
            let token = format!("{prefix}{}_{}", version.major, version.minor);
            self.push_token(&token);
        }
        self
    }

    /// Finishes the string.
    pub fn build(self) -> CapabilityString {
        CapabilityString { raw: self.raw }
    }
}
