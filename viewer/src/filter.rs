//! Conversation filter
//!
//! Every predicate narrows the selection; a default filter keeps everything.
//! Scope and position restrict which turns the sentiment and text predicates
//! look at.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use regex::{Regex, RegexBuilder};
use shared_types::{Conversation, Document, Role, Sentiment, Turn, INTENT_CONVERSATION_END};

/// Who ended the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndedBy {
    #[default]
    Any,
    Caller,
    Bot,
}

impl EndedBy {
    fn role(&self) -> Option<Role> {
        match self {
            EndedBy::Any => None,
            EndedBy::Caller => Some(Role::Caller),
            EndedBy::Bot => Some(Role::Bot),
        }
    }
}

/// Which speaker's turns are searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Conversation,
    Caller,
    Bot,
}

impl Scope {
    fn admits(&self, role: Role) -> bool {
        match self {
            Scope::Conversation => true,
            Scope::Caller => role == Role::Caller,
            Scope::Bot => role == Role::Bot,
        }
    }
}

/// Which turn positions are searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Anywhere,
    First,
    Last,
}

impl Position {
    fn admits(&self, index: usize, len: usize) -> bool {
        match self {
            Position::Anywhere => true,
            Position::First => index == 0,
            Position::Last => index + 1 == len,
        }
    }
}

/// The role that ended the conversation, if any.
///
/// A last turn without `ended_call` still counts as ended by the bot when it
/// is a bot `conversation_end` turn; otherwise the conversation is open.
pub fn ended_by(conversation: &Conversation) -> Option<Role> {
    let last = conversation.last_turn()?;
    if last.ended_call {
        Some(last.role)
    } else if last.role == Role::Bot && last.intent == INTENT_CONVERSATION_END {
        Some(Role::Bot)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
struct TextPattern {
    source: String,
    regex: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct ConversationFilter {
    pub turns: Option<RangeInclusive<usize>>,
    pub duration_seconds: Option<RangeInclusive<i64>>,
    pub ended_by: EndedBy,
    pub intent: Option<String>,
    pub tool: Option<String>,
    pub sentiments: BTreeSet<Sentiment>,
    pub scope: Scope,
    pub position: Position,
    pattern: Option<TextPattern>,
}

impl Default for ConversationFilter {
    fn default() -> Self {
        Self {
            turns: None,
            duration_seconds: None,
            ended_by: EndedBy::Any,
            intent: None,
            tool: None,
            sentiments: Sentiment::ALL.into_iter().collect(),
            scope: Scope::Conversation,
            position: Position::Anywhere,
            pattern: None,
        }
    }
}

impl ConversationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the case-insensitive text search. An empty pattern clears it.
    /// A pattern that fails to compile is kept but matches nothing.
    pub fn set_pattern(&mut self, pattern: &str) {
        if pattern.is_empty() {
            self.pattern = None;
            return;
        }
        let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::warn!(pattern, error = %err, "invalid search pattern");
                None
            }
        };
        self.pattern = Some(TextPattern {
            source: pattern.to_string(),
            regex,
        });
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.set_pattern(pattern);
        self
    }

    pub fn with_turns(mut self, range: RangeInclusive<usize>) -> Self {
        self.turns = Some(range);
        self
    }

    pub fn with_duration(mut self, range: RangeInclusive<i64>) -> Self {
        self.duration_seconds = Some(range);
        self
    }

    pub fn with_ended_by(mut self, ended_by: EndedBy) -> Self {
        self.ended_by = ended_by;
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Keep only conversations with a searched turn in one of `sentiments`.
    pub fn with_sentiments(mut self, sentiments: impl IntoIterator<Item = Sentiment>) -> Self {
        self.sentiments = sentiments.into_iter().collect();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.source.as_str())
    }

    /// True when a search pattern is set but does not compile.
    pub fn pattern_is_invalid(&self) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.regex.is_none())
    }

    pub fn matches(&self, conversation: &Conversation) -> bool {
        let turns = &conversation.turns;

        if let Some(range) = &self.turns {
            if !range.contains(&turns.len()) {
                return false;
            }
        }
        if let Some(range) = &self.duration_seconds {
            if !range.contains(&conversation.duration_seconds) {
                return false;
            }
        }

        if let Some(role) = self.ended_by.role() {
            if ended_by(conversation) != Some(role) {
                return false;
            }
        }

        if let Some(intent) = &self.intent {
            if !turns.iter().any(|turn| &turn.intent == intent) {
                return false;
            }
        }

        let sentiment_hit = self
            .searched_turns(turns)
            .any(|turn| self.sentiments.contains(&turn.sentiment));
        if !sentiment_hit {
            return false;
        }

        if let Some(pattern) = &self.pattern {
            let Some(regex) = &pattern.regex else {
                return false;
            };
            if !self.searched_turns(turns).any(|turn| regex.is_match(&turn.text)) {
                return false;
            }
        }

        if let Some(tool) = &self.tool {
            if !turns.iter().any(|turn| turn.uses_tool(tool)) {
                return false;
            }
        }

        true
    }

    /// Matching conversations, in document order.
    pub fn apply<'a>(&self, document: &'a Document) -> Vec<&'a Conversation> {
        document
            .conversations
            .iter()
            .filter(|conversation| self.matches(conversation))
            .collect()
    }

    fn searched_turns<'a>(&'a self, turns: &'a [Turn]) -> impl Iterator<Item = &'a Turn> + 'a {
        let len = turns.len();
        turns.iter().enumerate().filter_map(move |(index, turn)| {
            (self.scope.admits(turn.role) && self.position.admits(index, len)).then_some(turn)
        })
    }
}
