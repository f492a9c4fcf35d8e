// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `alterego shell` command implementation.
//!
//! Interactive REPL with readline history. Every line goes through
//! [`AgentContext::handle_query`]; slash commands inspect or change the
//! session without calling a backend.

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use alterego_agent::{AgentContext, QueryRequest, shutdown_token};
use alterego_config::model::BackendKind;
use alterego_core::AlterEgoError;

use crate::PersonaArgs;
use crate::commands::{ask, format_turn, resolve_persona};

const HELP: &str = "\
/history [n]      show the last n turns (default 10)
/note <text>      add text to long-term memory
/backend <kind>   switch to `local` or `remote`
/status           show backend status
/clear            forget everything about this persona
/quit             leave the shell";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum ShellInput<'a> {
    Empty,
    Quit,
    Help,
    History(usize),
    Note(&'a str),
    Backend(BackendKind),
    Status,
    Clear,
    Unknown(&'a str),
    Query(&'a str),
}

fn parse_line(line: &str) -> ShellInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ShellInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ShellInput::Query(line);
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, r)| (n, r.trim()));
    match name {
        "quit" | "exit" => ShellInput::Quit,
        "help" => ShellInput::Help,
        "history" => ShellInput::History(rest.parse().unwrap_or(10)),
        "note" if !rest.is_empty() => ShellInput::Note(rest),
        "backend" => rest
            .parse()
            .map_or(ShellInput::Unknown(line), ShellInput::Backend),
        "status" => ShellInput::Status,
        "clear" => ShellInput::Clear,
        _ => ShellInput::Unknown(line),
    }
}

/// Runs the REPL until `/quit`, Ctrl+D, or a shutdown signal.
pub async fn run_shell(ctx: &AgentContext, args: &PersonaArgs) -> Result<(), AlterEgoError> {
    let persona = resolve_persona(args, ctx.config())?;
    let mut backend = args.backend;
    let shutdown = shutdown_token();

    let mut rl = DefaultEditor::new()
        .map_err(|e| AlterEgoError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", format!("alterego shell: talking to {}", persona.name).bold().green());
    if !ctx.similarity_enabled() {
        println!("{}", "similarity search is off, only recent turns are remembered".yellow());
    }
    println!("Type {} for commands, {} to exit.\n", "/help".yellow(), "/quit".yellow());

    let prompt = format!("{}> ", "you".cyan());
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };
        let _ = rl.add_history_entry(line.as_str());

        match parse_line(&line) {
            ShellInput::Empty => {}
            ShellInput::Quit => break,
            ShellInput::Help => println!("{HELP}"),
            ShellInput::History(n) => match ctx.history(&persona.name, Some(n)).await {
                Ok(turns) => {
                    for turn in &turns {
                        println!("{}", format_turn(turn, &persona.name));
                    }
                }
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
            ShellInput::Note(text) => match ctx.add_note(&persona.name, text).await {
                Ok(id) => println!("{}", format!("stored note {id}").dimmed()),
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
            ShellInput::Backend(kind) => {
                backend = Some(kind);
                println!("{}", format!("using the {kind} backend").dimmed());
            }
            ShellInput::Status => {
                for status in ctx.backend_status().await {
                    println!(
                        "{}",
                        format!("{} ({}): {}, warm={}", status.kind, status.name, status.state, status.warm)
                            .dimmed()
                    );
                }
            }
            ShellInput::Clear => match ctx.clear_persona(&persona.name).await {
                Ok(()) => println!("{}", "memory cleared".dimmed()),
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
            ShellInput::Unknown(input) => {
                eprintln!("{} {input}, try /help", "unknown command".yellow());
            }
            ShellInput::Query(text) => {
                let mut request =
                    QueryRequest::new(&persona.name, &persona.instructions, text);
                request.backend = backend;
                match ask(ctx, request, &shutdown).await {
                    Ok(response) => {
                        println!("{}: {}", persona.name.green(), response.text);
                        if !response.memory_persisted && !response.warm_up {
                            eprintln!("{}", "(not saved to memory)".yellow());
                        }
                    }
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
            }
        }
    }

    debug!(persona = %persona.name, "shell session ended");
    println!("{}", "goodbye".dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_query() {
        assert_eq!(parse_line("  hello there "), ShellInput::Query("hello there"));
        assert_eq!(parse_line("   "), ShellInput::Empty);
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse_line("/quit"), ShellInput::Quit);
        assert_eq!(parse_line("/exit"), ShellInput::Quit);
        assert_eq!(parse_line("/history"), ShellInput::History(10));
        assert_eq!(parse_line("/history 4"), ShellInput::History(4));
        assert_eq!(parse_line("/note likes tea"), ShellInput::Note("likes tea"));
        assert_eq!(parse_line("/backend remote"), ShellInput::Backend(BackendKind::Remote));
        assert_eq!(parse_line("/clear"), ShellInput::Clear);
    }

    #[test]
    fn malformed_commands_are_unknown() {
        assert_eq!(parse_line("/note"), ShellInput::Unknown("/note"));
        assert_eq!(parse_line("/backend cloud"), ShellInput::Unknown("/backend cloud"));
        assert_eq!(parse_line("/dance"), ShellInput::Unknown("/dance"));
    }
}
