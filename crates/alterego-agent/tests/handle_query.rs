// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end query handling over the test harness.

use std::sync::Arc;
use std::time::Duration;

use alterego_agent::QueryRequest;
use alterego_backend::BackendState;
use alterego_config::model::{BackendKind, ContextConfig, MemoryConfig};
use alterego_context::{WARM_UP_QUERY, WARM_UP_RESPONSE, WARM_UP_SYSTEM};
use alterego_core::{AlterEgoError, AssembledPrompt, BackendErrorKind, PromptShape, Role};
use alterego_test_utils::{HashEmbedder, TestHarness};

const PERSONA: &str = "ALTER EGO";

fn text_of(prompt: &AssembledPrompt) -> String {
    prompt.segments().join("\n")
}

#[tokio::test]
async fn query_returns_text_and_persists_exchange() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Hello, I am here.".into()])
        .build()
        .await
        .unwrap();

    let response = harness.ask(PERSONA, "hello").await.unwrap();
    assert_eq!(response.text, "Hello, I am here.");
    assert_eq!(response.backend, BackendKind::Local);
    assert!(response.memory_persisted);
    assert!(!response.warm_up);
    assert!(response.usage.is_some());

    let history = harness.ctx().history(PERSONA, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!((history[0].role, history[0].content.as_str()), (Role::User, "hello"));
    assert_eq!(
        (history[1].role, history[1].content.as_str()),
        (Role::Assistant, "Hello, I am here.")
    );

    let prompts = harness.local.prompts();
    assert_eq!(prompts.len(), 1);
    match &prompts[0] {
        AssembledPrompt::Completion { system, prompt } => {
            assert!(system.contains("You are a test persona."));
            assert!(prompt.ends_with("User: hello\nAssistant:"));
        }
        other => panic!("expected completion prompt, got {other:?}"),
    }
}

#[tokio::test]
async fn later_prompts_carry_recent_history() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["It is Tuesday.".into(), "You asked about the day.".into()])
        .build()
        .await
        .unwrap();

    harness.ask(PERSONA, "what day is it").await.unwrap();
    harness.ask(PERSONA, "what did I ask").await.unwrap();

    let second = text_of(&harness.local.prompts()[1]);
    assert!(second.contains("User: what day is it\nAssistant: It is Tuesday.\nUser: what did I ask"));
}

#[tokio::test]
async fn relevant_memory_is_recalled_into_prompt() {
    let harness = TestHarness::builder()
        .with_embedder(Arc::new(HashEmbedder::new(1024)))
        .with_context(ContextConfig {
            history_turns: 0,
            ..ContextConfig::default()
        })
        .build()
        .await
        .unwrap();

    harness.ask(PERSONA, "my favourite colour is green").await.unwrap();
    harness.ask(PERSONA, "what is my favourite colour").await.unwrap();

    let second = text_of(&harness.local.prompts()[1]);
    assert!(second.contains("Relevant Memory:"));
    assert!(second.contains("my favourite colour is green"));
}

#[tokio::test]
async fn warm_up_never_touches_memory() {
    let harness = TestHarness::builder().build().await.unwrap();

    let response = harness.ask(PERSONA, WARM_UP_QUERY).await.unwrap();
    assert_eq!(response.text, WARM_UP_RESPONSE);
    assert!(response.warm_up);
    assert!(!response.memory_persisted);

    let again = harness.ask(PERSONA, "  Warm-Up ").await.unwrap();
    assert!(again.warm_up);
    assert_eq!(harness.local.calls(), 1);

    assert!(harness.ctx().history(PERSONA, None).await.unwrap().is_empty());
    let manager = harness.ctx().registry().get_or_create(PERSONA).await.unwrap();
    assert!(manager.get_short_term().is_empty());

    harness.ask(PERSONA, "first real question").await.unwrap();
    let real = text_of(&harness.local.prompts()[1]);
    assert!(!real.contains(WARM_UP_QUERY));
    assert!(!real.contains(WARM_UP_RESPONSE));
}

#[tokio::test]
async fn remote_warm_up_uses_fixed_chat_prompt() {
    let harness = TestHarness::builder().build().await.unwrap();

    harness
        .ask_backend(PERSONA, WARM_UP_QUERY, BackendKind::Remote)
        .await
        .unwrap();

    match &harness.remote.prompts()[0] {
        AssembledPrompt::Chat { messages } => {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].content, WARM_UP_SYSTEM);
            assert_eq!(messages[1].content, WARM_UP_QUERY);
        }
        other => panic!("expected chat prompt, got {other:?}"),
    }
    assert_eq!(harness.local.calls(), 0);
}

#[tokio::test]
async fn timeout_leaves_transcript_unchanged() {
    let harness = TestHarness::builder()
        .with_query_timeout(Duration::from_millis(200))
        .build()
        .await
        .unwrap();

    harness.ask(PERSONA, "before").await.unwrap();
    harness.local.set_delay(Duration::from_secs(2));

    let err = harness.ask(PERSONA, "too slow").await.unwrap_err();
    assert!(matches!(
        err,
        AlterEgoError::Backend {
            kind: BackendErrorKind::Timeout,
            ..
        }
    ));

    let history = harness.ctx().history(PERSONA, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|t| t.content != "too slow"));
    let manager = harness.ctx().registry().get_or_create(PERSONA).await.unwrap();
    assert_eq!(manager.get_short_term().len(), 2);

    harness.local.set_delay(Duration::ZERO);
    assert!(harness.ask(PERSONA, "after").await.is_ok());
}

#[tokio::test]
async fn backend_error_is_returned_without_persisting() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.local.set_failure(Some(BackendErrorKind::Status(500)));

    let err = harness.ask(PERSONA, "anyone there").await.unwrap_err();
    assert!(matches!(
        err,
        AlterEgoError::Backend {
            kind: BackendErrorKind::Status(500),
            ..
        }
    ));
    assert!(harness.ctx().history(PERSONA, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_still_returns_response() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["still answering".into()])
        .build()
        .await
        .unwrap();
    harness.store().set_fail_writes(true);

    let response = harness.ask(PERSONA, "can you hear me").await.unwrap();
    assert_eq!(response.text, "still answering");
    assert!(!response.memory_persisted);

    harness.store().set_fail_writes(false);
    assert!(harness.ctx().history(PERSONA, None).await.unwrap().is_empty());
    let manager = harness.ctx().registry().get_or_create(PERSONA).await.unwrap();
    assert!(manager.get_short_term().is_empty());
}

#[tokio::test]
async fn backend_selection_follows_request_then_default() {
    let harness = TestHarness::builder()
        .with_default_backend(BackendKind::Remote)
        .build()
        .await
        .unwrap();

    let by_default = harness.ask(PERSONA, "hello").await.unwrap();
    assert_eq!(by_default.backend, BackendKind::Remote);
    assert_eq!(harness.remote.prompts()[0].shape(), PromptShape::Chat);

    let explicit = harness
        .ask_backend(PERSONA, "hello again", BackendKind::Local)
        .await
        .unwrap();
    assert_eq!(explicit.backend, BackendKind::Local);
    assert_eq!(harness.local.prompts()[0].shape(), PromptShape::Completion);

    // Both backends share the persona's memory.
    let history = harness.ctx().history(PERSONA, None).await.unwrap();
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn summary_refreshes_on_interval_and_enters_prompt() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            "first answer".into(),
            "second answer".into(),
            "The user asked two questions.".into(),
            "third answer".into(),
        ])
        .with_context(ContextConfig {
            long_term_summary: true,
            summary_interval: 2,
            ..ContextConfig::default()
        })
        .build()
        .await
        .unwrap();

    harness.ask(PERSONA, "question one").await.unwrap();
    harness.ask(PERSONA, "question two").await.unwrap();
    assert_eq!(harness.local.calls(), 3);

    let manager = harness.ctx().registry().get_or_create(PERSONA).await.unwrap();
    assert_eq!(
        manager.latest_summary().await.unwrap().as_deref(),
        Some("The user asked two questions.")
    );

    let third = harness.ask(PERSONA, "question three").await.unwrap();
    assert_eq!(third.text, "third answer");
    let prompt = text_of(&harness.local.prompts()[3]);
    assert!(prompt.contains("Summary of earlier conversation:"));
    assert!(prompt.contains("The user asked two questions."));

    let history = harness.ctx().history(PERSONA, None).await.unwrap();
    assert_eq!(history.len(), 6);
}

#[tokio::test]
async fn clear_persona_forgets_history() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.ask(PERSONA, "remember this").await.unwrap();
    harness.ask("someone else", "and this").await.unwrap();

    harness.ctx().clear_persona(PERSONA).await.unwrap();

    assert!(harness.ctx().history(PERSONA, None).await.unwrap().is_empty());
    assert_eq!(harness.ctx().history("someone else", None).await.unwrap().len(), 2);

    harness.ask(PERSONA, "fresh start").await.unwrap();
    let prompt = text_of(&harness.local.prompts()[2]);
    assert!(!prompt.contains("remember this"));
}

#[tokio::test]
async fn blank_fields_are_rejected_before_dispatch() {
    let harness = TestHarness::builder().build().await.unwrap();

    for request in [
        QueryRequest::new(PERSONA, "instructions", "   "),
        QueryRequest::new("", "instructions", "hello"),
        QueryRequest::new(PERSONA, "", "hello"),
    ] {
        let err = harness.ctx().handle_query(request).await.unwrap_err();
        assert!(matches!(err, AlterEgoError::InvalidInput(_)));
    }
    assert_eq!(harness.local.calls(), 0);
}

#[tokio::test]
async fn oversized_query_fails_without_dispatch() {
    let harness = TestHarness::builder()
        .with_context(ContextConfig {
            budget: Some(10),
            ..ContextConfig::default()
        })
        .build()
        .await
        .unwrap();

    let err = harness.ask(PERSONA, "hello").await.unwrap_err();
    assert!(matches!(err, AlterEgoError::ContextTooLarge { .. }));
    assert_eq!(harness.local.calls(), 0);
    assert!(harness.ctx().history(PERSONA, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn short_term_memory_survives_restart() {
    let mut harness = TestHarness::builder()
        .with_memory(MemoryConfig {
            stm_capacity: 3,
            ..MemoryConfig::default()
        })
        .build()
        .await
        .unwrap();

    harness.local.push_response("B");
    harness.local.push_response("D");
    harness.ask(PERSONA, "A").await.unwrap();
    harness.ask(PERSONA, "C").await.unwrap();

    harness.restart().await.unwrap();

    let manager = harness.ctx().registry().get_or_create(PERSONA).await.unwrap();
    let stm: Vec<String> = manager
        .get_short_term()
        .into_iter()
        .map(|t| t.content)
        .collect();
    assert_eq!(stm, ["B", "C", "D"]);

    harness.ask(PERSONA, "E").await.unwrap();
    let prompt = text_of(&harness.local.prompts()[2]);
    assert!(prompt.contains("Assistant: B\nUser: C\nAssistant: D\nUser: E"));
}

#[tokio::test]
async fn backend_status_lists_both_backends() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.ask(PERSONA, "hello").await.unwrap();

    let statuses = harness.ctx().backend_status().await;
    let kinds: Vec<BackendKind> = statuses.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, [BackendKind::Local, BackendKind::Remote]);
    assert_eq!(statuses[0].state, BackendState::Ready);
    assert_eq!(statuses[1].state, BackendState::Stopped);
}
