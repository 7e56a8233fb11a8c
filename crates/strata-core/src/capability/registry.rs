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

//! The capability registry of the currently bound context.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;

use super::profile::BackendProfile;
use super::quirks::{QuirkEnvironment, QuirkTable};
use super::string::{CapabilityString, CapabilityStringBuilder, DriverVersion};
use super::symbols::{ProcAddress, SymbolResolver};
use crate::context::{ContextBinding, ContextGeneration, ContextKind, DriverIdentity, GraphicsContext};

/// Read-only capability lookups, as needed by consumers such as the depth peeling
/// controller.
pub trait CapabilityQuery {
    /// The generation of the bound context, or `None` when nothing is bound.
    fn generation(&self) -> Option<ContextGeneration>;

    /// Whether the bound context supports `token`, after driver quirks.
    fn supports(&self, token: &str) -> bool;
}

static EMPTY: CapabilityString = CapabilityString::EMPTY;

#[derive(Debug)]
struct BoundState {
    binding: ContextBinding,
    capabilities: OnceCell<CapabilityString>,
    symbols: RefCell<HashMap<String, Option<ProcAddress>>>,
}

impl BoundState {
    fn new(binding: ContextBinding) -> Self {
        Self {
            binding,
            capabilities: OnceCell::new(),
            symbols: RefCell::new(HashMap::new()),
        }
    }
}

/// Answers "does the bound context support X?" and "where is entry point Y?".
///
/// The capability string is built lazily on the first query after a bind and then
/// reused until the next bind. Resolved entry points are cached per binding as well,
/// including misses.
#[derive(Debug)]
pub struct CapabilityRegistry {
    profile: BackendProfile,
    resolver: SymbolResolver,
    quirks: QuirkTable,
    bound: Option<BoundState>,
}

impl CapabilityRegistry {
    /// Creates a registry for `profile` with the built-in quirk table.
    pub fn new(profile: BackendProfile, resolver: SymbolResolver) -> Self {
        let quirks = QuirkTable::builtin(profile.floor_version);
        Self {
            profile,
            resolver,
            quirks,
            bound: None,
        }
    }

    /// Binds a context. Rebinding the same generation keeps every cache.
    pub fn bind(&mut self, binding: ContextBinding) {
        if self.generation() == Some(binding.generation()) {
            return;
        }
        log::info!(
            "{} capability registry bound to context {}",
            self.profile.name,
            binding.generation()
        );
        self.bound = Some(BoundState::new(binding));
    }

    /// Drops the bound context and every cache derived from it.
    pub fn unbind(&mut self) {
        if let Some(state) = self.bound.take() {
            log::debug!("Capability registry released context {}", state.binding.generation());
        }
    }

    /// The generation of the bound context.
    pub fn generation(&self) -> Option<ContextGeneration> {
        self.bound.as_ref().map(|state| state.binding.generation())
    }

    /// The bound context, if any.
    pub fn context(&self) -> Option<&dyn GraphicsContext> {
        self.bound.as_ref().map(|state| state.binding.context())
    }

    /// The backend profile.
    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    /// The entry point resolver.
    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    /// The quirk table, for appending site-specific rules.
    pub fn quirks_mut(&mut self) -> &mut QuirkTable {
        &mut self.quirks
    }

    /// The capability string of the bound context. Empty when nothing is bound.
    pub fn capability_string(&self) -> &CapabilityString {
        match &self.bound {
            Some(state) => state
                .capabilities
                .get_or_init(|| self.build_capability_string(state.binding.context())),
            None => &EMPTY,
        }
    }

    /// Whether the bound context supports `token`.
    pub fn supports(&self, token: &str) -> bool {
        let Some(state) = &self.bound else {
            return false;
        };
        let matched = self.capability_string().contains(token);
        let driver = LiveDriver {
            context: state.binding.context(),
            registry: self,
        };
        self.quirks.apply(token, matched, &driver)
    }

    /// Looks up an entry point. Results are cached for the lifetime of the binding.
    pub fn resolve(&self, name: &str) -> Option<ProcAddress> {
        let Some(state) = &self.bound else {
            return self.resolver.resolve(name);
        };
        if let Some(cached) = state.symbols.borrow().get(name) {
            return *cached;
        }
        let address = self.resolver.resolve(name);
        state.symbols.borrow_mut().insert(name.to_owned(), address);
        address
    }

    /// Resolves every entry point of an extension.
    ///
    /// Returns `true` only when all of `symbols` resolve. Every name is looked up even
    /// after a miss, so the cache is complete either way; each miss is logged at `warn`.
    /// Support for `token` is not checked; see
    /// [`load_supported_extension`](Self::load_supported_extension).
    pub fn load_extension(&self, token: &str, symbols: &[&str]) -> bool {
        let missing = self.resolve_all(symbols);
        for name in &missing {
            log::warn!("Entry point '{name}' of {token} could not be loaded");
        }
        missing.is_empty()
    }

    /// Loads an extension only if the bound context supports it.
    ///
    /// Fails quietly: an unsupported token or a missing entry point is only logged at
    /// `debug`, so callers must check the result.
    pub fn load_supported_extension(&self, token: &str, symbols: &[&str]) -> bool {
        if !self.supports(token) {
            return false;
        }
        let missing = self.resolve_all(symbols);
        if !missing.is_empty() {
            log::debug!("{token} is advertised but lacks {}", missing.join(" "));
        }
        missing.is_empty()
    }

    fn resolve_all<'s>(&self, symbols: &[&'s str]) -> Vec<&'s str> {
        symbols
            .iter()
            .copied()
            .filter(|name| self.resolve(name).is_none())
            .collect()
    }

    fn build_capability_string(&self, context: &dyn GraphicsContext) -> CapabilityString {
        match context.kind() {
            ContextKind::Native => {}
            kind => {
                log::warn!("Context of kind {kind:?} cannot report capabilities");
                return CapabilityString::default();
            }
        }

        context.make_current();
        if !context.is_current() {
            context.make_current();
        }
        if !context.is_current() {
            log::warn!("Context could not be made current; no capabilities reported");
            return CapabilityString::default();
        }

        let mut builder = CapabilityStringBuilder::new();
        if let Some(list) = context.extension_list_string() {
            builder.push_list(&list);
        }
        if let Some(list) = context.utility_extension_string() {
            builder.push_list(&list);
        }
        if let Some(list) = context.platform_extension_string() {
            builder.push_list(&list);
        }

        let identity = context.driver_identity();
        let version = identity.parsed_version().unwrap_or_else(|| {
            log::warn!("Unparsable driver version '{}'", identity.version);
            DriverVersion::default()
        });
        builder.push_versions(
            self.profile.version_token_prefix,
            self.profile.known_versions,
            version,
        );
        if let Some(platform) = context.platform_version() {
            builder.push_versions(
                self.profile.platform_version_token_prefix,
                self.profile.known_platform_versions,
                platform,
            );
        }

        let capabilities = builder.build();
        log::debug!(
            "Context reports {} capability tokens (driver {version}, renderer '{}')",
            capabilities.token_count(),
            identity.renderer
        );
        capabilities
    }
}

impl CapabilityQuery for CapabilityRegistry {
    fn generation(&self) -> Option<ContextGeneration> {
        CapabilityRegistry::generation(self)
    }

    fn supports(&self, token: &str) -> bool {
        CapabilityRegistry::supports(self, token)
    }
}

/// Quirk predicates see the driver through the bound context, with entry point lookups
/// going through the registry's cache.
struct LiveDriver<'a> {
    context: &'a dyn GraphicsContext,
    registry: &'a CapabilityRegistry,
}

impl QuirkEnvironment for LiveDriver<'_> {
    fn is_direct_rendering(&self) -> bool {
        self.context.is_direct_rendering()
    }

    fn driver_identity(&self) -> DriverIdentity {
        self.context.driver_identity()
    }

    fn resolve(&self, name: &str) -> Option<ProcAddress> {
        self.registry.resolve(name)
    }
}
