//! Bounded conversation memory.
//!
//! A fixed-capacity FIFO of the most recent turns for one session.
//! The eviction rule is explicit: appending beyond capacity drops
//! exactly the oldest turn. Turns are never mutated after append.

use std::collections::VecDeque;

use crate::types::Turn;

/// Ordered log of the most recent turns, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl ConversationMemory {
    /// Create an empty memory holding at most `capacity` turns.
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a completed turn, evicting the oldest when full.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Snapshot of the stored turns, oldest first.
    pub fn recent(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no turns are stored.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Configured maximum number of turns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
