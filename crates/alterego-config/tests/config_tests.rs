// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use alterego_config::diagnostic::ConfigError;
use alterego_config::model::AlterEgoConfig;
use alterego_config::{
    BackendKind, BudgetUnit, IndexStrategy, load_and_validate_str, load_config_from_str,
};

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[agent]
name = "test-agent"
log_level = "debug"
default_persona = "Sherlock"

[storage]
database_path = "/tmp/alterego-test.db"
data_dir = "/tmp/alterego-test"
export_transcript_json = false

[memory]
embeddings = false
stm_capacity = 3
top_k = 4
similarity_threshold = 0.4
index = "flat"
max_distance = 1.5

[context]
history_turns = 2
budget = 1200
budget_unit = "chars"
long_term_summary = true
summary_interval = 5

[backend]
default = "remote"

[backend.local]
executable = "/usr/local/bin/ollama"
model_name = "SHERLOCK"
query_timeout_secs = 30

[backend.remote]
api_key = "sk-test"
model = "gpt-4o-mini"
max_tokens = 200
max_retries = 0
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "test-agent");
    assert_eq!(config.agent.default_persona, "Sherlock");
    assert_eq!(config.storage.database_path, "/tmp/alterego-test.db");
    assert!(!config.storage.export_transcript_json);
    assert!(!config.memory.embeddings);
    assert_eq!(config.memory.stm_capacity, 3);
    assert_eq!(config.memory.top_k, 4);
    assert_eq!(config.memory.index, IndexStrategy::Flat);
    assert_eq!(config.memory.max_distance, Some(1.5));
    assert_eq!(config.context.history_turns, 2);
    assert_eq!(config.context.budget, Some(1200));
    assert_eq!(config.context.budget_unit, BudgetUnit::Chars);
    assert!(config.context.long_term_summary);
    assert_eq!(config.backend.default, BackendKind::Remote);
    assert_eq!(config.backend.local.executable, "/usr/local/bin/ollama");
    assert_eq!(config.backend.local.query_timeout_secs, 30);
    // Unset keys in a partially specified section keep their defaults.
    assert_eq!(config.backend.local.base_model, "artifish/llama3.2-uncensored");
    assert_eq!(config.backend.remote.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.backend.remote.max_tokens, Some(200));
    assert_eq!(config.backend.remote.max_retries, 0);
}

#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.agent.name, "alterego");
    assert_eq!(config.agent.log_level, "info");
    assert_eq!(config.agent.default_persona, "ALTER EGO");
    assert!(config.storage.wal_mode);
    assert!(config.storage.export_transcript_json);
    assert!(config.memory.embeddings);
    assert_eq!(config.memory.stm_capacity, 10);
    assert_eq!(config.memory.top_k, 2);
    assert!((config.memory.similarity_threshold - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.memory.index, IndexStrategy::Sqlite);
    assert_eq!(config.context.history_turns, 6);
    assert!(config.context.budget.is_none());
    assert!(!config.context.long_term_summary);
    assert_eq!(config.backend.default, BackendKind::Local);
    assert_eq!(config.backend.remote.model, "chatgpt-4o-latest");
    assert_eq!(config.backend.local.num_ctx, 4096);
    assert!(config.backend.remote.api_key.is_none());
}

#[test]
fn unknown_field_in_memory_produces_suggestion() {
    let toml = r#"
[memory]
stm_capcity = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "stm_capcity" && suggestion.as_deref() == Some("stm_capacity")
        )
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn unknown_field_in_nested_backend_section_is_rejected() {
    let toml = r#"
[backend.remote]
api_kye = "sk"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("api_kye"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn unknown_index_strategy_is_rejected() {
    let toml = r#"
[memory]
index = "faiss"
"#;
    assert!(load_and_validate_str(toml).is_err());
}

#[test]
fn semantic_validation_runs_after_parsing() {
    let toml = r#"
[memory]
stm_capacity = 3

[context]
history_turns = 5
"#;
    let errors = load_and_validate_str(toml).expect_err("history exceeds capacity");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("history_turns"))
    ));
}

/// Env overrides are applied after TOML; simulated with a keyed merge.
#[test]
fn later_layers_override_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let toml_content = r#"
[backend.remote]
model = "from-toml"
"#;

    let config: AlterEgoConfig = Figment::new()
        .merge(Serialized::defaults(AlterEgoConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("backend.remote.model", "from-env"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.backend.remote.model, "from-env");
}

#[test]
fn relevance_filter_reflects_memory_section() {
    let config = load_config_from_str(
        r#"
[memory]
similarity_threshold = 0.5
max_distance = 2.0
"#,
    )
    .unwrap();
    let filter = config.memory.relevance_filter();
    assert!((filter.min_similarity - 0.5).abs() < f32::EPSILON);
    assert_eq!(filter.max_distance, Some(2.0));
}

#[test]
fn backend_kind_parses_aliases() {
    assert_eq!("ollama".parse::<BackendKind>().unwrap(), BackendKind::Local);
    assert_eq!("OpenAI".parse::<BackendKind>().unwrap(), BackendKind::Remote);
    assert!("gemini".parse::<BackendKind>().is_err());
}

#[test]
fn timeouts_convert_to_durations() {
    let config = AlterEgoConfig::default();
    let local = config.backend.local.timeouts();
    assert_eq!(local.startup.as_secs(), 30);
    assert_eq!(local.warm_up.as_secs(), 300);
    let remote = config.backend.remote.timeouts();
    assert!(remote.startup.is_zero());
    assert_eq!(remote.query.as_secs(), 60);
}
