// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic long-term summary refresh.

use alterego_backend::BackendOrchestrator;
use alterego_context::summary_request;
use alterego_memory::MemoryManager;
use tracing::{debug, info, warn};

/// Whether the exchange just remembered should trigger a refresh.
pub fn summary_due(remembered: usize, interval: usize) -> bool {
    interval > 0 && remembered > 0 && remembered % interval == 0
}

/// Condenses the persona's recent transcript, merged with the previous
/// summary, into a new `summary` record.
///
/// Every failure is logged and absorbed: a missing summary only means the
/// next prompts carry less context.
pub async fn refresh_summary(
    manager: &MemoryManager,
    backend: &BackendOrchestrator,
    persona_instructions: &str,
    window: usize,
) {
    let persona = manager.persona();
    let turns = match manager.transcript(Some(window)).await {
        Ok(turns) if !turns.is_empty() => turns,
        Ok(_) => return,
        Err(e) => {
            warn!(persona, error = %e, "cannot read transcript for summary");
            return;
        }
    };
    let previous = match manager.latest_summary().await {
        Ok(previous) => previous,
        Err(e) => {
            warn!(persona, error = %e, "cannot read previous summary");
            None
        }
    };

    let prompt = summary_request(
        backend.prompt_shape(),
        persona_instructions,
        &turns,
        previous.as_deref(),
    );
    let generation = match backend.query(&prompt).await {
        Ok(generation) => generation,
        Err(e) => {
            warn!(persona, error = %e, "summary generation failed");
            return;
        }
    };
    if generation.text.trim().is_empty() {
        debug!(persona, "backend returned an empty summary, keeping the previous one");
        return;
    }

    match manager.store_summary(generation.text.trim()).await {
        Ok(record_id) => info!(persona, record_id, turns = turns.len(), "long-term summary refreshed"),
        Err(e) => warn!(persona, error = %e, "failed to store summary"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_every_interval() {
        assert!(!summary_due(0, 3));
        assert!(!summary_due(2, 3));
        assert!(summary_due(3, 3));
        assert!(summary_due(6, 3));
        assert!(!summary_due(5, 0));
    }
}
