// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budgeted prompt assembly.
//!
//! The assembler renders one of two request shapes from persona
//! instructions, retrieved memories, recent history, an optional long-term
//! summary and the new query. When a budget is set and the rendered prompt
//! is too large, content is shed in a fixed order, re-measuring after every
//! step:
//!
//! 1. retrieved memories, least relevant first, one at a time
//! 2. history turns, oldest first
//! 3. the long-term summary
//!
//! The preamble, persona instructions and the query are never shed. If they
//! alone exceed the budget, assembly fails with `ContextTooLarge`.

use alterego_config::model::{BudgetUnit, ContextConfig};
use alterego_core::{
    AlterEgoError, AssembledPrompt, ChatMessage, PromptShape, Role, SearchResult, Turn,
};
use tracing::debug;

use crate::budget::SizeCounter;
use crate::preamble::{system_text, warm_up_prompt};

const MEMORY_HEADER: &str = "Relevant Memory:";
const SUMMARY_HEADER: &str = "Summary of earlier conversation:";

/// Everything that may go into one prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub persona_instructions: &'a str,
    /// Retrieved memories. Sorted by relevance before use.
    pub memories: &'a [SearchResult],
    /// Short-term turns, oldest first. Only the newest `history_turns` are used.
    pub history: &'a [Turn],
    pub summary: Option<&'a str>,
    pub query: &'a str,
}

/// Builds backend requests under an optional size budget.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    history_turns: usize,
    budget: Option<usize>,
    counter: SizeCounter,
}

impl PromptAssembler {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            history_turns: config.history_turns,
            budget: config.budget,
            counter: SizeCounter::new(config.budget_unit),
        }
    }

    /// Replaces the budget, e.g. with a backend's own input limit.
    pub fn with_budget(mut self, budget: Option<usize>, unit: BudgetUnit) -> Self {
        self.budget = budget;
        self.counter = SizeCounter::new(unit);
        self
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    pub fn history_turns(&self) -> usize {
        self.history_turns
    }

    /// Size of `prompt` in the budget unit.
    pub fn measure(&self, prompt: &AssembledPrompt) -> usize {
        self.counter.measure(prompt)
    }

    /// The fixed warm-up request for `shape`.
    pub fn warm_up(&self, shape: PromptShape, persona_instructions: &str) -> AssembledPrompt {
        warm_up_prompt(shape, persona_instructions)
    }

    /// Renders the request, shedding content until it fits the budget.
    pub fn assemble(
        &self,
        shape: PromptShape,
        input: &PromptInput<'_>,
    ) -> Result<AssembledPrompt, AlterEgoError> {
        let system = system_text(input.persona_instructions);

        let mut memories: Vec<&SearchResult> = input.memories.iter().collect();
        memories.sort_by(|a, b| a.kind.relevance_order(a.score, b.score));
        for hit in &memories {
            debug!(memory = %hit.display_tagged(), "memory candidate");
        }

        let skip = input.history.len().saturating_sub(self.history_turns);
        let mut history: Vec<&Turn> = input.history[skip..].iter().collect();
        let mut summary = input.summary.filter(|s| !s.trim().is_empty());

        let Some(budget) = self.budget else {
            return Ok(render(shape, &system, summary, &memories, &history, input.query));
        };

        let mut shed = (0usize, 0usize, false);
        loop {
            let prompt = render(shape, &system, summary, &memories, &history, input.query);
            let size = self.counter.measure(&prompt);
            if size <= budget {
                if shed != (0, 0, false) {
                    debug!(
                        size,
                        budget,
                        memories_dropped = shed.0,
                        turns_dropped = shed.1,
                        summary_dropped = shed.2,
                        "prompt shrunk to fit budget"
                    );
                }
                return Ok(prompt);
            }
            if memories.pop().is_some() {
                shed.0 += 1;
            } else if !history.is_empty() {
                history.remove(0);
                shed.1 += 1;
            } else if summary.take().is_some() {
                shed.2 = true;
            } else {
                return Err(AlterEgoError::ContextTooLarge {
                    required: size,
                    budget,
                });
            }
        }
    }
}

fn render(
    shape: PromptShape,
    system: &str,
    summary: Option<&str>,
    memories: &[&SearchResult],
    history: &[&Turn],
    query: &str,
) -> AssembledPrompt {
    match shape {
        PromptShape::Completion => render_completion(system, summary, memories, history, query),
        PromptShape::Chat => render_chat(system, summary, memories, history, query),
    }
}

fn memory_block(memories: &[&SearchResult]) -> String {
    let mut block = String::from(MEMORY_HEADER);
    for hit in memories {
        block.push('\n');
        block.push_str(hit.text.trim());
    }
    block
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

fn render_completion(
    system: &str,
    summary: Option<&str>,
    memories: &[&SearchResult],
    history: &[&Turn],
    query: &str,
) -> AssembledPrompt {
    let mut prompt = String::new();
    if let Some(summary) = summary {
        prompt.push_str(SUMMARY_HEADER);
        prompt.push('\n');
        prompt.push_str(summary.trim());
        prompt.push_str("\n\n");
    }
    if !memories.is_empty() {
        prompt.push_str(&memory_block(memories));
        prompt.push_str("\n\n");
    }
    for turn in history {
        prompt.push_str(role_label(turn.role));
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(query);
    prompt.push_str("\nAssistant:");

    AssembledPrompt::Completion {
        system: system.to_string(),
        prompt,
    }
}

fn render_chat(
    system: &str,
    summary: Option<&str>,
    memories: &[&SearchResult],
    history: &[&Turn],
    query: &str,
) -> AssembledPrompt {
    let mut messages = vec![ChatMessage::new(Role::System, system)];
    if let Some(summary) = summary {
        messages.push(ChatMessage::new(
            Role::System,
            format!("{SUMMARY_HEADER}\n{}", summary.trim()),
        ));
    }
    if !memories.is_empty() {
        messages.push(ChatMessage::new(Role::System, memory_block(memories)));
    }
    messages.extend(
        history
            .iter()
            .map(|turn| ChatMessage::new(turn.role, turn.content.clone())),
    );
    messages.push(ChatMessage::new(Role::User, query));
    AssembledPrompt::Chat { messages }
}
