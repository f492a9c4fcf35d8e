// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term summary requests: condense older conversation into one
//! `summary` record that later prompts carry in place of the raw turns.

use alterego_core::{AssembledPrompt, ChatMessage, PromptShape, Role, Turn};

use crate::preamble::system_text;

/// Instructions for the summarization call.
pub const SUMMARY_INSTRUCTIONS: &str = r#"You are a conversation summarizer. Write a concise summary of the conversation below.

PRESERVE:
- Facts the user shared about themselves
- Names and references to people or things
- Preferences, commitments and decisions
- The emotional tone of the exchange

OMIT greetings, small talk and repetition.

Write two short paragraphs in the third person. If a previous summary is given, merge it with the new conversation."#;

fn conversation_text(turns: &[Turn], previous: Option<&str>) -> String {
    let mut text = String::new();
    if let Some(previous) = previous.filter(|p| !p.trim().is_empty()) {
        text.push_str("Previous summary:\n");
        text.push_str(previous.trim());
        text.push_str("\n\n");
    }
    text.push_str("Conversation:\n");
    for turn in turns {
        text.push_str(&format!("{}: {}\n", turn.role, turn.content));
    }
    text
}

/// Builds the summarization request for `shape`.
///
/// The completion shape keeps the persona's system text so a local backend
/// does not have to rebuild its model for this call; the instructions go
/// into the prompt instead.
pub fn summary_request(
    shape: PromptShape,
    persona_instructions: &str,
    turns: &[Turn],
    previous: Option<&str>,
) -> AssembledPrompt {
    let conversation = conversation_text(turns, previous);
    match shape {
        PromptShape::Completion => AssembledPrompt::Completion {
            system: system_text(persona_instructions),
            prompt: format!("{SUMMARY_INSTRUCTIONS}\n\n{conversation}\nSummary:"),
        },
        PromptShape::Chat => AssembledPrompt::Chat {
            messages: vec![
                ChatMessage::new(Role::System, SUMMARY_INSTRUCTIONS),
                ChatMessage::new(
                    Role::User,
                    format!("Summarize this conversation:\n\n{conversation}"),
                ),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_cover_key_elements() {
        assert!(SUMMARY_INSTRUCTIONS.contains("Facts"));
        assert!(SUMMARY_INSTRUCTIONS.contains("Names"));
        assert!(SUMMARY_INSTRUCTIONS.contains("Preferences"));
        assert!(SUMMARY_INSTRUCTIONS.contains("emotional tone"));
    }

    #[test]
    fn chat_request_carries_turns_and_previous() {
        let turns = [Turn::user("my cat is Miso"), Turn::assistant("cute name")];
        let AssembledPrompt::Chat { messages } =
            summary_request(PromptShape::Chat, "p", &turns, Some("They like cats."))
        else {
            panic!("expected chat");
        };
        assert_eq!(messages[0].content, SUMMARY_INSTRUCTIONS);
        let body = &messages[1].content;
        assert!(body.contains("Previous summary:\nThey like cats."));
        assert!(body.contains("user: my cat is Miso\nassistant: cute name"));
    }

    #[test]
    fn completion_request_ends_with_open_marker() {
        let AssembledPrompt::Completion { prompt, system } =
            summary_request(PromptShape::Completion, "persona", &[Turn::user("x")], None)
        else {
            panic!("expected completion");
        };
        assert!(prompt.ends_with("Summary:"));
        assert!(!prompt.contains("Previous summary"));
        assert!(system.ends_with("persona"));
    }
}
