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

//! Runtime capability negotiation.
//!
//! - [`CapabilityString`]: the immutable token set describing one context.
//! - [`BackendProfile`]: naming conventions and loader strategy of a backend family.
//! - [`SymbolResolver`]: entry point lookup with a deterministic fallback chain.
//! - [`QuirkTable`]: ordered driver workarounds applied after token matching.
//! - [`CapabilityRegistry`]: ties the above to the currently bound context.

mod profile;
mod quirks;
mod registry;
mod string;
mod symbols;

pub use self::profile::{BackendProfile, LoaderStrategy};
pub use self::quirks::{DriverPredicate, QuirkEnvironment, QuirkRule, QuirkTable, TokenPattern};
pub use self::registry::{CapabilityQuery, CapabilityRegistry};
pub use self::string::{parse_version_token, CapabilityString, CapabilityStringBuilder, DriverVersion};
pub use self::symbols::{ProcAddress, SymbolLoader, SymbolResolver};
