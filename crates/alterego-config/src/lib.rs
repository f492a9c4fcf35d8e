// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Alter Ego.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `ALTEREGO_*` environment overrides, and miette
//! diagnostics with typo suggestions. The memory core consumes these values; it
//! never hard-codes capacities, thresholds, or timeouts.
//!
//! # Usage
//!
//! ```no_run
//! use alterego_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("STM capacity: {}", config.memory.stm_capacity);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AlterEgoConfig, BackendKind, BackendTimeouts, BudgetUnit, IndexStrategy,
    LocalBackendConfig, RemoteBackendConfig,
};

/// Load configuration from the XDG hierarchy and validate it.
///
/// On a Figment error the TOML sources are re-read so diagnostics can point
/// at the offending span.
pub fn load_and_validate() -> Result<AlterEgoConfig, Vec<ConfigError>> {
    validated(loader::load_config(), || {
        loader::search_paths()
            .iter()
            .filter_map(|path| read_source(path))
            .collect()
    })
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<AlterEgoConfig, Vec<ConfigError>> {
    validated(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<AlterEgoConfig, Vec<ConfigError>> {
    validated(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs validation on a loaded config, or turns the Figment error into
/// diagnostics against the sources `sources` yields.
fn validated(
    loaded: Result<AlterEgoConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<AlterEgoConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads a config file keyed by the absolute path Figment reports for it.
fn read_source(path: &Path) -> Option<(String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Some((absolute.display().to_string(), content))
}
