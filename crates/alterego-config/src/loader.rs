// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./alterego.toml` > `~/.config/alterego/alterego.toml`
//! > `/etc/alterego/alterego.toml` with environment variable overrides via the
//! `ALTEREGO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AlterEgoConfig;

/// Env var prefix for every override.
pub const ENV_PREFIX: &str = "ALTEREGO_";

/// Section prefixes, longest first, so `backend_remote_` wins over `backend_`.
const SECTION_PREFIXES: &[(&str, &str)] = &[
    ("backend_local_", "backend.local."),
    ("backend_remote_", "backend.remote."),
    ("backend_", "backend."),
    ("agent_", "agent."),
    ("storage_", "storage."),
    ("memory_", "memory."),
    ("context_", "context."),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/alterego/alterego.toml` (system-wide)
/// 3. `~/.config/alterego/alterego.toml` (user XDG config)
/// 4. `./alterego.toml` (local directory)
/// 5. `ALTEREGO_*` environment variables
pub fn load_config() -> Result<AlterEgoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<AlterEgoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AlterEgoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AlterEgoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AlterEgoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/alterego/alterego.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("alterego/alterego.toml"));
    }
    paths.push(PathBuf::from("alterego.toml"));
    paths
}

/// The layered Figment before extraction.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(AlterEgoConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config key.
///
/// `Env::split("_")` cannot be used because key names contain underscores:
/// `ALTEREGO_BACKEND_REMOTE_API_KEY` must become `backend.remote.api_key`.
pub fn map_env_key(key: &str) -> String {
    for (prefix, dotted) in SECTION_PREFIXES {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{dotted}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(key.as_str()).into())
}
