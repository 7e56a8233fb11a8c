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

//! Native entry point lookup.
//!
//! [`SymbolResolver`] works before any context is bound: on some
//! platforms the function that lists window-system extensions is itself an extension
//! entry point that has to be resolved first.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use super::profile::{BackendProfile, LoaderStrategy};

/// The address of a resolved native entry point. Never null.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcAddress(NonNull<c_void>);

impl ProcAddress {
    /// Wraps a raw address, mapping null to `None`.
    pub fn new(ptr: *const c_void) -> Option<Self> {
        NonNull::new(ptr.cast_mut()).map(Self)
    }

    /// The raw address.
    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr().cast_const()
    }
}

impl fmt::Debug for ProcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcAddress({:p})", self.0)
    }
}

/// Something that can look up a native entry point by name.
pub trait SymbolLoader {
    /// Returns the address of `name`, or `None` if this loader cannot find it.
    fn load(&self, name: &str) -> Option<ProcAddress>;
}

impl<F> SymbolLoader for F
where
    F: Fn(&str) -> Option<ProcAddress>,
{
    fn load(&self, name: &str) -> Option<ProcAddress> {
        self(name)
    }
}

/// Resolves entry points through a deterministic fallback chain.
///
/// For a [`LoaderStrategy::Mangled`] backend, `resolve("glFoo")`:
///
/// 1. looks up `"mglFoo"` through the backend loader (or, when no backend loader was
///    supplied, through the generic one);
/// 2. if that found nothing, looks up `"glFoo"` through the generic loader.
///
/// Names without the canonical prefix skip step 1. A [`LoaderStrategy::Generic`]
/// backend only ever performs step 2.
pub struct SymbolResolver {
    strategy: LoaderStrategy,
    generic: Box<dyn SymbolLoader>,
    backend: Option<Box<dyn SymbolLoader>>,
}

impl SymbolResolver {
    /// A resolver that passes every name straight to `generic`.
    pub fn new(generic: impl SymbolLoader + 'static) -> Self {
        Self {
            strategy: LoaderStrategy::Generic,
            generic: Box::new(generic),
            backend: None,
        }
    }

    /// A resolver following `profile`'s loader strategy.
    ///
    /// `backend` is the backend-specific dynamic loader used for mangled names; it is
    /// ignored for generic profiles.
    pub fn for_profile(
        profile: &BackendProfile,
        generic: Box<dyn SymbolLoader>,
        backend: Option<Box<dyn SymbolLoader>>,
    ) -> Self {
        Self {
            strategy: profile.loader,
            generic,
            backend,
        }
    }

    /// A resolver that never finds anything. Useful for contexts without a loader.
    pub fn none() -> Self {
        Self::new(|_: &str| -> Option<ProcAddress> { None })
    }

    /// The loader strategy in use.
    pub fn strategy(&self) -> LoaderStrategy {
        self.strategy
    }

    /// The backend-specific spelling of `name`, if the strategy renames it.
    pub fn mangled_name(&self, name: &str) -> Option<String> {
        match self.strategy {
            LoaderStrategy::Mangled {
                canonical_prefix,
                mangle_prefix,
            } if name.starts_with(canonical_prefix) => Some(format!("{mangle_prefix}{name}")),
            _ => None,
        }
    }

    /// Looks up `name`. Never fails: absence is `None`.
    pub fn resolve(&self, name: &str) -> Option<ProcAddress> {
        if let Some(mangled) = self.mangled_name(name) {
            let loader = self.backend.as_deref().unwrap_or(self.generic.as_ref());
            if let Some(address) = loader.load(&mangled) {
                return Some(address);
            }
            log::trace!("'{mangled}' not exported, falling back to '{name}'");
        }
        self.generic.load(name)
    }
}

impl fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("strategy", &self.strategy)
            .field("has_backend_loader", &self.backend.is_some())
            .finish()
    }
}
