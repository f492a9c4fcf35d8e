// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt size measurement.

use std::sync::OnceLock;

use alterego_config::model::BudgetUnit;
use alterego_core::AssembledPrompt;
use tiktoken_rs::CoreBPE;
use tracing::warn;

fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    ENCODER
        .get_or_init(|| match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!(error = %e, "cl100k tokenizer unavailable, estimating 4 chars per token");
                None
            }
        })
        .as_ref()
}

/// Measures text in the configured unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeCounter {
    unit: BudgetUnit,
}

impl SizeCounter {
    pub fn new(unit: BudgetUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> BudgetUnit {
        self.unit
    }

    pub fn count(&self, text: &str) -> usize {
        match self.unit {
            BudgetUnit::Chars => text.chars().count(),
            BudgetUnit::Tokens => match encoder() {
                Some(bpe) => bpe.encode_with_special_tokens(text).len(),
                None => text.chars().count().div_ceil(4),
            },
        }
    }

    /// Total size of every segment the backend will read.
    pub fn measure(&self, prompt: &AssembledPrompt) -> usize {
        prompt.segments().into_iter().map(|s| self.count(s)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alterego_core::{ChatMessage, Role};

    #[test]
    fn chars_count_unicode_scalars() {
        let counter = SizeCounter::new(BudgetUnit::Chars);
        assert_eq!(counter.count("héllo"), 5);
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn tokens_are_fewer_than_chars_for_prose() {
        let counter = SizeCounter::new(BudgetUnit::Tokens);
        let text = "The quick brown fox jumps over the lazy dog.";
        let tokens = counter.count(text);
        assert!(tokens > 0);
        assert!(tokens < text.len());
    }

    #[test]
    fn measure_sums_all_segments() {
        let counter = SizeCounter::new(BudgetUnit::Chars);
        let prompt = AssembledPrompt::Chat {
            messages: vec![
                ChatMessage::new(Role::System, "abc"),
                ChatMessage::new(Role::User, "de"),
            ],
        };
        assert_eq!(counter.measure(&prompt), 5);
    }
}
