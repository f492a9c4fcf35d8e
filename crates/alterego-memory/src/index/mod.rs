// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index strategies.
//!
//! - [`SqliteCosineIndex`]: brute-force cosine scan over the store's embedded
//!   records. Scores are similarities, higher is closer.
//! - [`FlatIndex`]: exact in-memory L2 index with a binary snapshot and a JSON
//!   sidecar per persona. Scores are squared distances, lower is closer.

pub mod flat;
pub mod sqlite;

pub use flat::FlatIndex;
pub use sqlite::SqliteCosineIndex;

/// Cosine similarity. Returns 0.0 when either vector has zero norm or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Squared Euclidean distance. Callers must check the lengths match.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
