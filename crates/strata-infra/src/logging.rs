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


//! Process-wide logger setup.

use std::sync::Once;

use env_logger::{Builder, Env};
use log::LevelFilter;

static INIT: Once = Once::new();

/// How the process logger is configured.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: String,
    /// Per-module overrides applied on top of the filter, e.g. to quiet a chatty
    /// dependency.
    pub module_filters: Vec<(String, LevelFilter)>,
    /// Whether to prefix records with a timestamp.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            module_filters: Vec::new(),
            timestamps: true,
        }
    }
}

/// Installs `env_logger` as the global logger.
///
/// Only the first call has any effect; later calls, or a logger installed by someone
/// else, are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = Builder::from_env(Env::default().default_filter_or(config.default_filter));
        for (module, level) in &config.module_filters {
            builder.filter_module(module, *level);
        }
        if !config.timestamps {
            builder.format_timestamp(None);
        }
        if builder.try_init().is_err() {
            log::debug!("A global logger was already installed");
        }
    });
}
