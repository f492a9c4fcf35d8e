// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the memory, prompt, and backend crates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Default importance assigned to new memory records.
pub const DEFAULT_IMPORTANCE: f32 = 1.0;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Embedding,
    Index,
    Backend,
}

/// Speaker of a turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// What a persisted record represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A user or assistant turn. Only these make up the transcript.
    Conversation,
    /// Free text added directly to a vector index.
    Note,
    /// A condensed summary of older conversation.
    Summary,
}

/// One utterance. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: String,
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// Creates a turn stamped with the current UTC time.
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::now(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::now(Role::Assistant, content)
    }
}

/// A record about to be persisted.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub turn: Turn,
    pub kind: EntryKind,
    pub importance: f32,
}

impl NewRecord {
    /// A conversation turn with default importance.
    pub fn conversation(turn: Turn) -> Self {
        Self {
            turn,
            kind: EntryKind::Conversation,
            importance: DEFAULT_IMPORTANCE,
        }
    }

    /// Free text stored for retrieval but kept out of the transcript.
    pub fn note(content: impl Into<String>) -> Self {
        Self {
            turn: Turn::now(Role::System, content),
            kind: EntryKind::Note,
            importance: DEFAULT_IMPORTANCE,
        }
    }

    pub fn summary(content: impl Into<String>) -> Self {
        Self {
            turn: Turn::now(Role::System, content),
            kind: EntryKind::Summary,
            importance: DEFAULT_IMPORTANCE,
        }
    }
}

/// A persisted turn plus its retrieval metadata.
///
/// `embedding` is `None` when no embedding model was available at write time.
/// Such records stay in the transcript but never appear in similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: i64,
    pub persona: String,
    pub kind: EntryKind,
    pub turn: Turn,
    pub importance: f32,
    pub embedding: Option<Vec<f32>>,
}

/// Which convention a [`SearchResult::score`] follows.
///
/// Scores from different conventions are never comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ScoreKind {
    /// Cosine similarity in `[-1, 1]`, higher is closer.
    Similarity,
    /// Squared Euclidean distance, lower is closer.
    Distance,
}

impl ScoreKind {
    /// Orders `a` before `b` when `a` is more relevant.
    ///
    /// A total order: NaN scores sort as the least relevant similarity and
    /// the farthest distance.
    pub fn relevance_order(self, a: f32, b: f32) -> Ordering {
        match self {
            Self::Similarity => {
                let (a, b) = (nan_to(a, f32::NEG_INFINITY), nan_to(b, f32::NEG_INFINITY));
                b.total_cmp(&a)
            }
            Self::Distance => {
                let (a, b) = (nan_to(a, f32::INFINITY), nan_to(b, f32::INFINITY));
                a.total_cmp(&b)
            }
        }
    }

    /// Sorts results most relevant first.
    pub fn sort(self, results: &mut [SearchResult]) {
        results.sort_by(|a, b| self.relevance_order(a.score, b.score));
    }
}

fn nan_to(score: f32, fallback: f32) -> f32 {
    if score.is_nan() { fallback } else { score }
}

/// A single retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
    pub record_id: i64,
    pub kind: ScoreKind,
}

impl SearchResult {
    /// Debug rendering with the score and its convention.
    pub fn display_tagged(&self) -> String {
        let label = match self.kind {
            ScoreKind::Similarity => "sim",
            ScoreKind::Distance => "dist",
        };
        format!("[{label} {:.3}] {}", self.score, self.text)
    }
}

/// Minimum relevance a hit needs to be used in a prompt.
///
/// Each convention has its own cut-off. `max_distance = None` accepts every
/// distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    pub min_similarity: f32,
    pub max_distance: Option<f32>,
}

impl RelevanceFilter {
    pub fn accepts(&self, result: &SearchResult) -> bool {
        match result.kind {
            ScoreKind::Similarity => result.score > self.min_similarity,
            ScoreKind::Distance => self.max_distance.is_none_or(|max| result.score <= max),
        }
    }
}

/// One role/content pair of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request layout a backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PromptShape {
    /// One flattened text prompt ending in an open `Assistant:` marker.
    Completion,
    /// An ordered list of role/content messages.
    Chat,
}

/// A fully assembled backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledPrompt {
    /// `system` becomes the model instructions, `prompt` the text to continue.
    Completion { system: String, prompt: String },
    Chat { messages: Vec<ChatMessage> },
}

impl AssembledPrompt {
    pub fn shape(&self) -> PromptShape {
        match self {
            Self::Completion { .. } => PromptShape::Completion,
            Self::Chat { .. } => PromptShape::Chat,
        }
    }

    /// Every piece of text the backend will read, in order.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::Completion { system, prompt } => vec![system.as_str(), prompt.as_str()],
            Self::Chat { messages } => messages.iter().map(|m| m.content.as_str()).collect(),
        }
    }
}

/// Token counters reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Generated text returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter, one vector per input text.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

/// Filesystem-safe directory name for a persona.
///
/// The readable part keeps letters, digits, spaces, `-` and `_`, with
/// anything else replaced by `_`, so a persona name can never escape its
/// parent directory. The suffix is a short SHA-256 of the raw name, which
/// keeps look-alike personas such as `a/b` and `a_b` apart.
pub fn persona_dir_name(persona: &str) -> String {
    let cleaned: String = persona
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(persona.as_bytes());
    let suffix = hex::encode(&digest[..8]);
    if cleaned.is_empty() {
        format!("_-{suffix}")
    } else {
        format!("{cleaned}-{suffix}")
    }
}
