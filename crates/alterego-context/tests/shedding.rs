// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget shedding properties of the prompt assembler.

use alterego_config::model::{BudgetUnit, ContextConfig};
use alterego_context::{PromptAssembler, PromptInput, SAFETY_PREAMBLE};
use alterego_core::{AlterEgoError, AssembledPrompt, PromptShape, ScoreKind, SearchResult, Turn};
use proptest::prelude::*;

fn assembler(budget: Option<usize>) -> PromptAssembler {
    PromptAssembler::new(&ContextConfig {
        history_turns: 6,
        budget,
        budget_unit: BudgetUnit::Chars,
        ..ContextConfig::default()
    })
}

fn memories(scores: &[f32]) -> Vec<SearchResult> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &score)| SearchResult {
            text: format!("memory-{i:02}"),
            score,
            record_id: i as i64,
            kind: ScoreKind::Similarity,
        })
        .collect()
}

fn kept_memories(prompt: &AssembledPrompt) -> Vec<String> {
    let text = prompt.segments().join("\n");
    text.split('\n')
        .filter(|line| line.starts_with("memory-"))
        .map(str::to_string)
        .collect()
}

proptest! {
    #[test]
    fn output_fits_and_keeps_most_relevant(
        scores in proptest::collection::vec(0.0f32..1.0, 0..8),
        history_len in 0usize..6,
        slack in 0usize..400,
        chat in any::<bool>(),
    ) {
        let shape = if chat { PromptShape::Chat } else { PromptShape::Completion };
        let memories = memories(&scores);
        let history: Vec<Turn> = (0..history_len).map(|i| Turn::user(format!("turn {i}"))).collect();
        let input = PromptInput {
            persona_instructions: "You are a lighthouse keeper.",
            memories: &memories,
            history: &history,
            summary: None,
            query: "what did we talk about?",
        };

        let bare = PromptInput { memories: &[], history: &[], ..input };
        let floor = assembler(None).measure(&assembler(None).assemble(shape, &bare).unwrap());
        let budget = floor + slack;

        let a = assembler(Some(budget));
        let prompt = a.assemble(shape, &input).unwrap();
        prop_assert!(a.measure(&prompt) <= budget);

        let segments = prompt.segments();
        prop_assert!(segments[0].starts_with(SAFETY_PREAMBLE));
        prop_assert!(segments.last().unwrap().contains("what did we talk about?"));

        // Survivors are exactly the most relevant memories.
        let mut ranked = memories.clone();
        ScoreKind::Similarity.sort(&mut ranked);
        let kept = kept_memories(&prompt);
        let expected: Vec<String> = ranked.iter().take(kept.len()).map(|m| m.text.clone()).collect();
        prop_assert_eq!(kept, expected);
    }
}

#[test]
fn fails_only_when_bare_prompt_exceeds_budget() {
    let input = PromptInput {
        persona_instructions: "persona",
        memories: &[],
        history: &[],
        summary: Some("a summary"),
        query: "q",
    };
    let err = assembler(Some(5))
        .assemble(PromptShape::Chat, &input)
        .unwrap_err();
    assert!(matches!(err, AlterEgoError::ContextTooLarge { budget: 5, .. }));
}
