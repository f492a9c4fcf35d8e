// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound query and its outcome.

use serde::Serialize;

use alterego_config::model::BackendKind;
use alterego_core::{AlterEgoError, TokenUsage};

/// One user query addressed to a persona.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub persona: String,
    /// Free-text persona description appended after the safety preamble.
    pub instructions: String,
    pub query: String,
    /// `None` selects the configured default backend.
    pub backend: Option<BackendKind>,
}

impl QueryRequest {
    pub fn new(
        persona: impl Into<String>,
        instructions: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            persona: persona.into(),
            instructions: instructions.into(),
            query: query.into(),
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Rejects blank persona names, instructions and queries.
    pub fn validate(&self) -> Result<(), AlterEgoError> {
        for (field, value) in [
            ("persona", &self.persona),
            ("instructions", &self.instructions),
            ("query", &self.query),
        ] {
            if value.trim().is_empty() {
                return Err(AlterEgoError::InvalidInput(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Result of a handled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub text: String,
    pub backend: BackendKind,
    /// `false` when the exchange could not be written to long-term memory.
    /// The text is still the backend's answer.
    pub memory_persisted: bool,
    /// The query was the warm-up sentinel; nothing was remembered.
    pub warm_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}
