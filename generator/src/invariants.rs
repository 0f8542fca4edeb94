//! Structural checks every generated conversation must pass.
//!
//! Consumers rely on these; the composer asserts them in debug builds and the
//! test suites run them over whole batches.

use std::collections::HashSet;

use shared_types::{Conversation, Document, Role, INTENT_GREETING};

use crate::composer::{TurnWindow, MIN_DURATION_SECONDS};
use crate::config::MIN_WINDOW_TURNS;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{id}: conversation has no turns")]
    Empty { id: String },

    #[error("{id}: {len} turns is outside the window {min}-{max}")]
    OutsideWindow {
        id: String,
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("{id}: {len} turns cannot hold authentication and conclusion")]
    TooShort { id: String, len: usize },

    #[error("{id}: turn at position {position} has turn_id {found}")]
    TurnId {
        id: String,
        position: usize,
        found: u32,
    },

    #[error("{id}: timestamp of turn {turn_id} does not increase")]
    Timestamp { id: String, turn_id: u32 },

    #[error("{id}: expected exactly one ended_call turn, found {count}")]
    EndedCallCount { id: String, count: usize },

    #[error("{id}: ended_call turn is not the last turn")]
    EndedCallNotLast { id: String },

    #[error("{id}: conversation does not open with a caller greeting")]
    Opening { id: String },

    #[error("{id}: duration_seconds is {found}, expected {expected}")]
    Duration {
        id: String,
        found: i64,
        expected: i64,
    },

    #[error("duplicate conversation_id {id}")]
    DuplicateId { id: String },
}

/// `max(60, last - first)` in whole seconds.
pub fn expected_duration(conversation: &Conversation) -> i64 {
    match (conversation.first_turn(), conversation.last_turn()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp)
            .num_seconds()
            .max(MIN_DURATION_SECONDS),
        _ => MIN_DURATION_SECONDS,
    }
}

pub fn check_conversation(
    conversation: &Conversation,
    window: Option<TurnWindow>,
) -> Result<(), InvariantViolation> {
    let id = || conversation.conversation_id.clone();
    let turns = &conversation.turns;
    let len = turns.len();

    let Some(first) = turns.first() else {
        return Err(InvariantViolation::Empty { id: id() });
    };

    if let Some(window) = window {
        if !window.contains(len) {
            return Err(InvariantViolation::OutsideWindow {
                id: id(),
                len,
                min: window.min,
                max: window.max,
            });
        }
    }
    if len < MIN_WINDOW_TURNS {
        return Err(InvariantViolation::TooShort { id: id(), len });
    }

    for (position, turn) in turns.iter().enumerate() {
        if turn.turn_id as usize != position + 1 {
            return Err(InvariantViolation::TurnId {
                id: id(),
                position,
                found: turn.turn_id,
            });
        }
    }

    if let Some(pair) = turns
        .windows(2)
        .find(|pair| pair[1].timestamp <= pair[0].timestamp)
    {
        return Err(InvariantViolation::Timestamp {
            id: id(),
            turn_id: pair[1].turn_id,
        });
    }

    let count = turns.iter().filter(|turn| turn.ended_call).count();
    if count != 1 {
        return Err(InvariantViolation::EndedCallCount { id: id(), count });
    }
    if !turns[len - 1].ended_call {
        return Err(InvariantViolation::EndedCallNotLast { id: id() });
    }

    if first.role != Role::Caller || first.intent != INTENT_GREETING {
        return Err(InvariantViolation::Opening { id: id() });
    }

    let expected = expected_duration(conversation);
    if conversation.duration_seconds != expected {
        return Err(InvariantViolation::Duration {
            id: id(),
            found: conversation.duration_seconds,
            expected,
        });
    }

    Ok(())
}

/// Check every conversation and that ids are unique across the document.
pub fn check_document(document: &Document) -> Result<(), InvariantViolation> {
    let mut seen = HashSet::new();
    for conversation in &document.conversations {
        if !seen.insert(conversation.conversation_id.as_str()) {
            return Err(InvariantViolation::DuplicateId {
                id: conversation.conversation_id.clone(),
            });
        }
        check_conversation(conversation, None)?;
    }
    Ok(())
}
