// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `alterego status` command implementation.
//!
//! Reports where memory lives, whether similarity search is available, and
//! the lifecycle state and health of each backend. Nothing is started.

use std::io::IsTerminal;

use colored::Colorize;
use serde::Serialize;

use alterego_agent::AgentContext;
use alterego_backend::BackendStatus;
use alterego_core::{AlterEgoError, HealthStatus};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub agent: String,
    pub database_path: String,
    pub data_dir: String,
    pub similarity_search: bool,
    pub default_backend: String,
    pub backends: Vec<BackendReport>,
}

#[derive(Debug, Serialize)]
pub struct BackendReport {
    pub kind: String,
    pub name: String,
    pub state: String,
    pub warm: bool,
    pub health: String,
}

impl From<&BackendStatus> for BackendReport {
    fn from(status: &BackendStatus) -> Self {
        Self {
            kind: status.kind.to_string(),
            name: status.name.clone(),
            state: status.state.to_string(),
            warm: status.warm,
            health: health_text(&status.health),
        }
    }
}

fn health_text(health: &HealthStatus) -> String {
    match health {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

pub async fn run_status(ctx: &AgentContext, json: bool, plain: bool) -> Result<(), AlterEgoError> {
    let config = ctx.config();
    let statuses = ctx.backend_status().await;
    let response = StatusResponse {
        agent: config.agent.name.clone(),
        database_path: config.storage.database_path.clone(),
        data_dir: config.storage.data_dir.clone(),
        similarity_search: ctx.similarity_enabled(),
        default_backend: config.backend.default.to_string(),
        backends: statuses.iter().map(BackendReport::from).collect(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    colored::control::set_override(use_color);
    print_status(&response);
    Ok(())
}

fn print_status(status: &StatusResponse) {
    println!("{}", status.agent.bold());
    println!("  database:   {}", status.database_path);
    println!("  data dir:   {}", status.data_dir);
    let similarity = if status.similarity_search {
        "enabled".green()
    } else {
        "disabled (no embedding model)".yellow()
    };
    println!("  similarity: {similarity}");
    println!();
    for backend in &status.backends {
        let marker = if backend.kind == status.default_backend {
            " (default)"
        } else {
            ""
        };
        let health = if backend.health == "healthy" {
            backend.health.green()
        } else {
            backend.health.red()
        };
        println!(
            "  {}{marker}: {} [{}] warm={} {health}",
            backend.kind.bold(),
            backend.name,
            backend.state,
            backend.warm
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_rendered_with_reason() {
        assert_eq!(health_text(&HealthStatus::Healthy), "healthy");
        assert_eq!(
            health_text(&HealthStatus::Unhealthy("no API key".into())),
            "unhealthy: no API key"
        );
    }

    #[test]
    fn json_report_shape() {
        let response = StatusResponse {
            agent: "alterego".into(),
            database_path: "/tmp/a.db".into(),
            data_dir: "/tmp".into(),
            similarity_search: false,
            default_backend: "local".into(),
            backends: vec![BackendReport {
                kind: "local".into(),
                name: "ollama".into(),
                state: "stopped".into(),
                warm: false,
                health: "healthy".into(),
            }],
        };
        let value: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["backends"][0]["state"], "stopped");
        assert_eq!(value["similarity_search"], false);
    }
}
