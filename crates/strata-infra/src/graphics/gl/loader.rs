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


//! Symbol loaders backing [`strata_core::SymbolResolver`].

use std::ffi::{c_void, OsStr};
use std::fmt;

use anyhow::{Context, Result};
use strata_core::{ProcAddress, SymbolLoader};

/// Looks symbols up in a dynamic library, typically the running process itself.
///
/// This is the backend loader for name-mangled builds, whose `mgl*` entry points are
/// plain exported symbols rather than something the window system hands out.
pub struct DynamicLibraryLoader {
    library: libloading::Library,
    label: String,
}

impl DynamicLibraryLoader {
    /// Opens the symbol table of the running process and everything it has loaded.
    pub fn this_process() -> Result<Self> {
        #[cfg(unix)]
        let library: libloading::Library = libloading::os::unix::Library::this().into();
        #[cfg(windows)]
        let library: libloading::Library = libloading::os::windows::Library::this()
            .context("Failed to open the symbol table of the running process")?
            .into();

        log::debug!("Symbol loader opened on the running process");
        Ok(Self {
            library,
            label: "<process>".to_string(),
        })
    }

    /// Opens a shared library by path or file name.
    pub fn open(path: impl AsRef<OsStr>) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { libloading::Library::new(path) }
            .with_context(|| format!("Failed to open library {}", path.to_string_lossy()))?;

        log::info!("Symbol loader opened on {}", path.to_string_lossy());
        Ok(Self {
            library,
            label: path.to_string_lossy().into_owned(),
        })
    }
}

impl SymbolLoader for DynamicLibraryLoader {
    fn load(&self, name: &str) -> Option<ProcAddress> {
        let symbol = unsafe { self.library.get::<*const c_void>(name.as_bytes()) }.ok()?;
        ProcAddress::new(*symbol)
    }
}

impl fmt::Debug for DynamicLibraryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLibraryLoader")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Adapts a window-system `GetProcAddress` function into a [`SymbolLoader`].
///
/// Some implementations return small sentinel values instead of null for unknown
/// names; those are treated as absent.
pub struct ProcAddressLoader<F> {
    get_proc_address: F,
}

impl<F> ProcAddressLoader<F>
where
    F: Fn(&str) -> *const c_void,
{
    /// Wraps a `GetProcAddress`-style function.
    pub fn new(get_proc_address: F) -> Self {
        Self { get_proc_address }
    }
}

impl<F> SymbolLoader for ProcAddressLoader<F>
where
    F: Fn(&str) -> *const c_void,
{
    fn load(&self, name: &str) -> Option<ProcAddress> {
        let raw = (self.get_proc_address)(name);
        match raw as isize {
            1 | 2 | 3 | -1 => None,
            _ => ProcAddress::new(raw),
        }
    }
}

impl<F> fmt::Debug for ProcAddressLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcAddressLoader").finish_non_exhaustive()
    }
}
