// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alter Ego - persona-aware conversational memory.
//!
//! This is the binary entry point. Every subcommand builds one
//! [`AgentContext`] from configuration, runs, and shuts the context down so
//! a local model server is never left behind.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod shell;
mod status;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use alterego_agent::AgentContext;
use alterego_config::ConfigError;
use alterego_config::model::{AlterEgoConfig, BackendKind};
use alterego_core::AlterEgoError;

/// Alter Ego - persona-aware conversational memory.
#[derive(Parser, Debug)]
#[command(name = "alterego", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the default search path.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Who is speaking and through which backend.
#[derive(Args, Debug, Clone, Default)]
pub struct PersonaArgs {
    /// Persona name (defaults to `agent.default_persona`).
    #[arg(long, short)]
    pub persona: Option<String>,

    /// Persona description appended to the safety preamble.
    #[arg(long, conflicts_with = "instructions_file")]
    pub instructions: Option<String>,

    /// Read the persona description from a file.
    #[arg(long, value_name = "FILE")]
    pub instructions_file: Option<PathBuf>,

    /// Backend to use: `local` or `remote` (defaults to `backend.default`).
    #[arg(long, short)]
    pub backend: Option<BackendKind>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one query and print the response.
    Query {
        #[command(flatten)]
        persona: PersonaArgs,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,

        /// Query text.
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Launch an interactive REPL session.
    Shell {
        #[command(flatten)]
        persona: PersonaArgs,
    },
    /// Print a persona's persisted transcript.
    History {
        #[arg(long, short)]
        persona: Option<String>,

        /// Only the last N turns.
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Delete everything remembered for a persona.
    Clear {
        #[arg(long, short)]
        persona: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
    /// Add free text to a persona's long-term memory.
    Note {
        #[arg(long, short)]
        persona: Option<String>,

        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Show configuration and backend status.
    Status {
        #[arg(long)]
        json: bool,

        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            alterego_config::render_errors(&errors);
            std::process::exit(2);
        }
    };
    init_tracing(&config.agent.log_level);

    let Some(command) = cli.command else {
        println!("alterego: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AlterEgoConfig, Vec<ConfigError>> {
    match path {
        Some(path) => alterego_config::load_and_validate_path(path),
        None => alterego_config::load_and_validate(),
    }
}

async fn run(command: Commands, config: AlterEgoConfig) -> Result<(), AlterEgoError> {
    let ctx = AgentContext::from_config(config).await?;
    let result = dispatch(&ctx, command).await;
    ctx.shutdown().await;
    result
}

async fn dispatch(ctx: &AgentContext, command: Commands) -> Result<(), AlterEgoError> {
    match command {
        Commands::Query {
            persona,
            json,
            text,
        } => commands::run_query(ctx, &persona, &text.join(" "), json).await,
        Commands::Shell { persona } => shell::run_shell(ctx, &persona).await,
        Commands::History {
            persona,
            limit,
            json,
        } => commands::run_history(ctx, persona.as_deref(), limit, json).await,
        Commands::Clear { persona, yes } => {
            commands::run_clear(ctx, persona.as_deref(), yes).await
        }
        Commands::Note { persona, text } => {
            commands::run_note(ctx, persona.as_deref(), &text.join(" ")).await
        }
        Commands::Status { json, plain } => status::run_status(ctx, json, plain).await,
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("alterego={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn query_joins_trailing_words() {
        let cli = Cli::try_parse_from([
            "alterego", "query", "--persona", "Ada", "--backend", "remote", "what", "is", "new",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Query { persona, text, json }) => {
                assert_eq!(persona.persona.as_deref(), Some("Ada"));
                assert_eq!(persona.backend, Some(BackendKind::Remote));
                assert_eq!(text.join(" "), "what is new");
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn backend_accepts_provider_aliases() {
        let cli = Cli::try_parse_from(["alterego", "shell", "-b", "ollama"]).unwrap();
        match cli.command {
            Some(Commands::Shell { persona }) => assert_eq!(persona.backend, Some(BackendKind::Local)),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["alterego", "shell", "-b", "cloud"]).is_err());
    }

    #[test]
    fn instructions_sources_conflict() {
        let result = Cli::try_parse_from([
            "alterego",
            "query",
            "--instructions",
            "x",
            "--instructions-file",
            "y.txt",
            "hi",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn query_requires_text() {
        assert!(Cli::try_parse_from(["alterego", "query"]).is_err());
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alterego.toml");
        std::fs::write(&path, "[agent]\nname = \"from-file\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.agent.name, "from-file");
    }
}
