// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for Alter Ego.
//!
//! Turns persona instructions, retrieved memory, recent history and the new
//! query into either a flattened completion prompt or a chat message list,
//! within an optional token or character budget.

pub mod assembler;
pub mod budget;
pub mod preamble;
pub mod summary;

pub use assembler::{PromptAssembler, PromptInput};
pub use budget::SizeCounter;
pub use preamble::{
    SAFETY_PREAMBLE, WARM_UP_QUERY, WARM_UP_RESPONSE, WARM_UP_SYSTEM, flatten, is_warm_up,
    system_text, warm_up_prompt,
};
pub use summary::{SUMMARY_INSTRUCTIONS, summary_request};
