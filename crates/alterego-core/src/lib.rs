// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Alter Ego.
//!
//! This crate provides the trait definitions, error types, and common types
//! shared by the storage, memory, prompt assembly, and backend crates.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AlterEgoError, BackendErrorKind};
pub use types::{
    AdapterType, AssembledPrompt, ChatMessage, EmbeddingInput, EmbeddingOutput, EntryKind,
    Generation, HealthStatus, MemoryRecord, NewRecord, PromptShape, RelevanceFilter, Role,
    ScoreKind, SearchResult, TokenUsage, Turn, persona_dir_name,
};

pub use traits::{
    EmbeddingAdapter, GenerationBackend, PersistentStore, PluginAdapter, VectorIndex, embed_one,
    try_embed,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Embedding,
            AdapterType::Index,
            AdapterType::Backend,
        ] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn prompt_shape_parses_lowercase() {
        use std::str::FromStr;
        assert_eq!(PromptShape::from_str("chat").unwrap(), PromptShape::Chat);
        assert_eq!(PromptShape::Completion.to_string(), "completion");
    }

    #[test]
    fn assembled_prompt_segments_follow_order() {
        let prompt = AssembledPrompt::Chat {
            messages: vec![
                ChatMessage::new(Role::System, "sys"),
                ChatMessage::new(Role::User, "hi"),
            ],
        };
        assert_eq!(prompt.segments(), vec!["sys", "hi"]);
        assert_eq!(prompt.shape(), PromptShape::Chat);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _plugin<T: PluginAdapter>() {}
        fn _embedding<T: EmbeddingAdapter>() {}
        fn _store<T: PersistentStore>() {}
        fn _backend<T: GenerationBackend>() {}
        fn _index<T: VectorIndex>() {}
    }

    #[test]
    fn new_record_constructors_set_kind() {
        assert_eq!(NewRecord::note("n").kind, EntryKind::Note);
        assert_eq!(NewRecord::summary("s").kind, EntryKind::Summary);
        let turn = NewRecord::conversation(Turn::user("q"));
        assert_eq!(turn.kind, EntryKind::Conversation);
        assert_eq!(turn.importance, 1.0);
    }
}
