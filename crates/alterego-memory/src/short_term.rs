// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded buffer of the most recent turns.

use std::collections::VecDeque;

use alterego_core::Turn;

/// FIFO ring of at most `capacity` turns, oldest first.
///
/// Seeded once from the persisted transcript tail; afterwards it is only
/// changed by [`ShortTermMemory::append`] and [`ShortTermMemory::clear`].
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl ShortTermMemory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Builds the buffer from a transcript tail. Only the last `capacity`
    /// turns are kept if the tail is longer.
    pub fn rehydrate(capacity: usize, tail: Vec<Turn>) -> Self {
        let mut stm = Self::new(capacity);
        for turn in tail {
            stm.append(turn);
        }
        stm
    }

    pub fn get(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// The newest `m` turns, oldest first.
    pub fn tail(&self, m: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(m);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
