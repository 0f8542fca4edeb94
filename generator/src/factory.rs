//! Turn factory
//!
//! Builds one immutable [`Turn`] from typed fields. No validation beyond type
//! shape; callers own well-formedness.

use chrono::{DateTime, Utc};
use shared_types::{Action, Role, Sentiment, Turn};

/// Everything about a turn except its id and timestamp, which the build
/// state assigns when the turn is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSpec {
    pub role: Role,
    pub text: String,
    pub intent: String,
    pub sentiment: Sentiment,
    pub actions: Vec<Action>,
    pub ended_call: bool,
}

impl TurnSpec {
    pub fn new(role: Role, intent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            intent: intent.into(),
            sentiment: Sentiment::Neutral,
            actions: Vec::new(),
            ended_call: false,
        }
    }

    pub fn caller(intent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Role::Caller, intent, text)
    }

    pub fn bot(intent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Role::Bot, intent, text)
    }

    pub fn sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn ends_call(mut self) -> Self {
        self.ended_call = true;
        self
    }
}

/// Render a spec into a turn. An empty action list is omitted from the record.
pub fn make_turn(turn_id: u32, spec: TurnSpec, timestamp: DateTime<Utc>) -> Turn {
    let agentic_action = if spec.actions.is_empty() {
        None
    } else {
        Some(spec.actions)
    };

    Turn {
        role: spec.role,
        turn_id,
        text: spec.text,
        timestamp,
        intent: spec.intent,
        sentiment: spec.sentiment,
        ended_call: spec.ended_call,
        agentic_action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::memory_entry;

    #[test]
    fn test_empty_actions_are_omitted() {
        let ts = crate::config::default_base_start();
        let turn = make_turn(1, TurnSpec::caller("greeting", "Hi"), ts);
        assert!(turn.agentic_action.is_none());
        assert!(!turn.ended_call);
        assert_eq!(turn.sentiment, Sentiment::Neutral);
        assert_eq!(turn.timestamp, ts);
    }

    #[test]
    fn test_builder_fields_flow_through() {
        let ts = crate::config::default_base_start();
        let spec = TurnSpec::bot("farewell", "Have a great day!")
            .sentiment(Sentiment::Positive)
            .actions(vec![Action::persistent_storage(memory_entry(
                "final_summary",
                "case_closed",
            ))])
            .ends_call();
        let turn = make_turn(7, spec, ts);
        assert_eq!(turn.turn_id, 7);
        assert_eq!(turn.role, Role::Bot);
        assert_eq!(turn.intent, "farewell");
        assert_eq!(turn.sentiment, Sentiment::Positive);
        assert!(turn.ended_call);
        assert_eq!(turn.actions().len(), 1);
    }
}
