// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: `query`, `history`, `clear`, `note`.

use colored::Colorize;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use tokio_util::sync::CancellationToken;

use alterego_agent::{AgentContext, QueryRequest, QueryResponse, shutdown_token};
use alterego_config::model::AlterEgoConfig;
use alterego_core::{AlterEgoError, Role, Turn};

use crate::PersonaArgs;

/// Persona name and instructions after applying defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPersona {
    pub name: String,
    pub instructions: String,
}

/// Fills in the configured default persona and reads the instructions
/// file when one is given. Without explicit instructions the persona is
/// described by its name alone.
pub fn resolve_persona(
    args: &PersonaArgs,
    config: &AlterEgoConfig,
) -> Result<ResolvedPersona, AlterEgoError> {
    let name = persona_name(args.persona.as_deref(), config);
    let instructions = match (&args.instructions, &args.instructions_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
            AlterEgoError::InvalidInput(format!(
                "cannot read instructions file {}: {e}",
                path.display()
            ))
        })?,
        (None, None) => format!("You are {name}."),
    };
    if instructions.trim().is_empty() {
        return Err(AlterEgoError::InvalidInput(
            "persona instructions must not be empty".into(),
        ));
    }
    Ok(ResolvedPersona { name, instructions })
}

pub fn persona_name(persona: Option<&str>, config: &AlterEgoConfig) -> String {
    persona
        .map(str::to_string)
        .unwrap_or_else(|| config.agent.default_persona.clone())
}

/// Runs the query, abandoning it once `shutdown` fires so the context can
/// still stop its backends.
pub async fn ask(
    ctx: &AgentContext,
    request: QueryRequest,
    shutdown: &CancellationToken,
) -> Result<QueryResponse, AlterEgoError> {
    tokio::select! {
        result = ctx.handle_query(request) => result,
        _ = shutdown.cancelled() => Err(AlterEgoError::Internal("interrupted".into())),
    }
}

pub async fn run_query(
    ctx: &AgentContext,
    args: &PersonaArgs,
    text: &str,
    json: bool,
) -> Result<(), AlterEgoError> {
    let persona = resolve_persona(args, ctx.config())?;
    let mut request = QueryRequest::new(persona.name, persona.instructions, text);
    request.backend = args.backend;

    let response = ask(ctx, request, &shutdown_token()).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&response)
            .map_err(|e| AlterEgoError::Internal(format!("cannot render response: {e}")))?;
        println!("{rendered}");
    } else {
        println!("{}", response.text);
        if !response.memory_persisted && !response.warm_up {
            eprintln!("{}", "warning: this exchange was not saved to memory".yellow());
        }
    }
    Ok(())
}

pub async fn run_history(
    ctx: &AgentContext,
    persona: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<(), AlterEgoError> {
    let persona = persona_name(persona, ctx.config());
    let turns = ctx.history(&persona, limit).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&turns)
            .map_err(|e| AlterEgoError::Internal(format!("cannot render history: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }
    if turns.is_empty() {
        println!("{}", format!("no history for {persona}").dimmed());
    }
    for turn in &turns {
        println!("{}", format_turn(turn, &persona));
    }
    Ok(())
}

/// `[timestamp] speaker: content`, the speaker being the persona for
/// assistant turns.
pub fn format_turn(turn: &Turn, persona: &str) -> String {
    let speaker = match turn.role {
        Role::User => "you".cyan(),
        Role::Assistant => persona.green(),
        Role::System => "system".dimmed(),
    };
    format!("{} {speaker}: {}", format!("[{}]", turn.timestamp).dimmed(), turn.content)
}

pub async fn run_clear(
    ctx: &AgentContext,
    persona: Option<&str>,
    yes: bool,
) -> Result<(), AlterEgoError> {
    let persona = persona_name(persona, ctx.config());
    if !yes && !confirm(&clear_question(&persona))? {
        println!("{}", "cancelled".dimmed());
        return Ok(());
    }
    ctx.clear_persona(&persona).await?;
    println!("cleared memory of {persona}");
    Ok(())
}

pub async fn run_note(
    ctx: &AgentContext,
    persona: Option<&str>,
    text: &str,
) -> Result<(), AlterEgoError> {
    let persona = persona_name(persona, ctx.config());
    if !ctx.similarity_enabled() {
        eprintln!(
            "{}",
            "warning: no embedding model, the note is stored but cannot be recalled".yellow()
        );
    }
    let id = ctx.add_note(&persona, text).await?;
    println!("stored note {id} for {persona}");
    Ok(())
}

fn clear_question(persona: &str) -> String {
    format!("Delete all memory of {persona}?")
}

/// Asks a yes/no question on the terminal. Anything but an explicit yes
/// is a no.
fn confirm(question: &str) -> Result<bool, AlterEgoError> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|e| AlterEgoError::Internal(format!("cannot read answer: {e}")))
}
