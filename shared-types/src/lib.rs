//! Shared transcript types between generator and viewer
//!
//! These types are used by both:
//! - The batch generator (native Rust)
//! - The conversation viewer (query layer and TypeScript front end)
//!
//! Serializable with serde for the JSON transcript document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Core Types
// ============================================================================

/// Who produced an utterance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../viewer/bindings/transcript.ts")]
pub enum Role {
    Caller,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Caller => "caller",
            Role::Bot => "bot",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment label attached to every turn. Missing values decode as neutral.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../viewer/bindings/transcript.ts")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

// ============================================================================
// Agentic Actions
// ============================================================================

/// A side-effecting step taken by the bot within a turn.
///
/// Order inside a turn matters: a `ToolCall` precedes its `ToolOutput`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "../../viewer/bindings/transcript.ts")]
pub enum Action {
    ToolCall {
        tool_name: String,
        #[ts(type = "unknown")]
        request: serde_json::Value,
    },
    ToolOutput {
        tool_name: String,
        #[ts(type = "unknown")]
        response: serde_json::Value,
    },
    /// Write to cross-turn conversation memory
    PersistentStorage {
        tool_name: String,
        #[ts(type = "unknown")]
        response: serde_json::Value,
    },
    /// Handoff to a human or specialist agent
    AgentInvocation { description: String },
}

impl Action {
    pub fn tool_call(tool_name: impl Into<String>, request: serde_json::Value) -> Self {
        Self::ToolCall {
            tool_name: tool_name.into(),
            request,
        }
    }

    pub fn tool_output(tool_name: impl Into<String>, response: serde_json::Value) -> Self {
        Self::ToolOutput {
            tool_name: tool_name.into(),
            response,
        }
    }

    /// Memory writes always go through the `conversation_memory` tool.
    pub fn persistent_storage(response: serde_json::Value) -> Self {
        Self::PersistentStorage {
            tool_name: MEMORY_TOOL_NAME.to_string(),
            response,
        }
    }

    pub fn agent_invocation(description: impl Into<String>) -> Self {
        Self::AgentInvocation {
            description: description.into(),
        }
    }

    /// Tool name for every variant except agent invocations.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Action::ToolCall { tool_name, .. }
            | Action::ToolOutput { tool_name, .. }
            | Action::PersistentStorage { tool_name, .. } => Some(tool_name),
            Action::AgentInvocation { .. } => None,
        }
    }
}

// ============================================================================
// Transcript Document
// ============================================================================

/// One utterance in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../viewer/bindings/transcript.ts")]
pub struct Turn {
    pub role: Role,

    /// 1-based position in the final conversation
    pub turn_id: u32,

    #[serde(default)]
    pub text: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub intent: String,

    #[serde(default)]
    pub sentiment: Sentiment,

    #[serde(default)]
    pub ended_call: bool,

    /// Omitted entirely when the turn performs no action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub agentic_action: Option<Vec<Action>>,
}

impl Turn {
    /// Actions on this turn; absent and empty are the same thing.
    pub fn actions(&self) -> &[Action] {
        self.agentic_action.as_deref().unwrap_or(&[])
    }

    pub fn uses_tool(&self, tool_name: &str) -> bool {
        self.actions()
            .iter()
            .any(|action| action.tool_name() == Some(tool_name))
    }
}

/// The unit of output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../viewer/bindings/transcript.ts")]
pub struct Conversation {
    pub conversation_id: String,
    #[serde(default)]
    pub duration_seconds: i64,
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn first_turn(&self) -> Option<&Turn> {
        self.turns.first()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// Top-level container; insertion order is presentation order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, TS)]
#[ts(export, export_to = "../../viewer/bindings/transcript.ts")]
pub struct Document {
    pub conversations: Vec<Conversation>,
}

impl Document {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self { conversations }
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Tool name used by every persistent-storage action
pub const MEMORY_TOOL_NAME: &str = "conversation_memory";

/// Tool names
pub const TOOL_VERIFY_IDENTITY: &str = "verify_employee_identity";
pub const TOOL_QUERY_KNOWLEDGEBASE: &str = "query_knowledgebase";
pub const TOOL_FORWARD_TO_HUMAN: &str = "forward_to_human";
pub const TOOL_QUERY_ORDER_SYSTEM: &str = "query_order_system";
pub const TOOL_UPDATE_BENEFITS_PORTAL: &str = "update_benefits_portal";
pub const TOOL_PAYROLL_LOOKUP: &str = "payroll_system_lookup";
pub const TOOL_PAYROLL_ADJUSTMENT: &str = "submit_payroll_adjustment";

/// Intents with structural meaning
pub const INTENT_GREETING: &str = "greeting";
pub const INTENT_FAREWELL: &str = "farewell";
pub const INTENT_CONVERSATION_END: &str = "conversation_end";
pub const INTENT_ESCALATION: &str = "escalation";

/// Build a `{key, value}` memory payload.
pub fn memory_entry(key: &str, value: impl Into<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "key": key,
        "value": value.into(),
    })
}

// ============================================================================
// Tests
// ============================================================================
