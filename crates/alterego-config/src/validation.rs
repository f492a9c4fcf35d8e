// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks cross-field and range constraints that serde attributes cannot
//! express, such as the prompt history never exceeding the short-term buffer.

use crate::diagnostic::ConfigError;
use crate::model::AlterEgoConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &AlterEgoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }
    if config.storage.data_dir.trim().is_empty() {
        fail("storage.data_dir must not be empty".to_string());
    }
    if config.agent.default_persona.trim().is_empty() {
        fail("agent.default_persona must not be empty".to_string());
    }

    let memory = &config.memory;
    if memory.stm_capacity == 0 {
        fail("memory.stm_capacity must be at least 1".to_string());
    }
    if memory.top_k == 0 {
        fail("memory.top_k must be at least 1".to_string());
    }
    if !(-1.0..=1.0).contains(&memory.similarity_threshold) {
        fail(format!(
            "memory.similarity_threshold must be within [-1, 1], got {}",
            memory.similarity_threshold
        ));
    }
    if let Some(max) = memory.max_distance {
        if max < 0.0 {
            fail(format!("memory.max_distance must be non-negative, got {max}"));
        }
    }

    let context = &config.context;
    if context.history_turns > memory.stm_capacity {
        fail(format!(
            "context.history_turns ({}) must not exceed memory.stm_capacity ({})",
            context.history_turns, memory.stm_capacity
        ));
    }
    if context.budget == Some(0) {
        fail("context.budget must be greater than 0 when set".to_string());
    }
    if context.long_term_summary && context.summary_interval == 0 {
        fail("context.summary_interval must be at least 1".to_string());
    }

    let local = &config.backend.local;
    if local.executable.trim().is_empty() {
        fail("backend.local.executable must not be empty".to_string());
    }
    for (key, secs) in [
        ("backend.local.startup_timeout_secs", local.startup_timeout_secs),
        ("backend.local.shutdown_timeout_secs", local.shutdown_timeout_secs),
        ("backend.local.query_timeout_secs", local.query_timeout_secs),
        ("backend.local.warm_up_timeout_secs", local.warm_up_timeout_secs),
        (
            "backend.remote.query_timeout_secs",
            config.backend.remote.query_timeout_secs,
        ),
        (
            "backend.remote.warm_up_timeout_secs",
            config.backend.remote.warm_up_timeout_secs,
        ),
    ] {
        if secs == 0 {
            fail(format!("{key} must be greater than 0"));
        }
    }

    let remote = &config.backend.remote;
    if !remote.base_url.starts_with("http://") && !remote.base_url.starts_with("https://") {
        fail(format!(
            "backend.remote.base_url `{}` must start with http:// or https://",
            remote.base_url
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
