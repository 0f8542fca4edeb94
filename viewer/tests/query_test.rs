//! Viewer queries over a generated-shape document loaded from disk.
//!
//! Run with: cargo test -p viewer --test query_test

use shared_types::{Role, Sentiment, TOOL_QUERY_KNOWLEDGEBASE};
use viewer::{
    export_selection, format_duration, global_sentiment, intent_facets, sentiment_breakdown,
    tool_facets, total_duration, ConversationFilter, DocumentStore, EndedBy, Position, Scope,
};

const DOCUMENT: &str = r#"{
  "conversations": [
    {
      "conversation_id": "conv_ext_001",
      "duration_seconds": 95,
      "turns": [
        {"role": "caller", "turn_id": 1, "text": "Hi, this is Riley.", "timestamp": "2025-09-20T08:00:00Z",
         "intent": "greeting", "sentiment": "neutral"},
        {"role": "bot", "turn_id": 2, "text": "Let me check vpn troubleshooting steps.", "timestamp": "2025-09-20T08:00:12Z",
         "intent": "knowledge_lookup", "sentiment": "neutral",
         "agentic_action": [
           {"type": "tool_call", "tool_name": "query_knowledgebase", "request": {"query": "vpn troubleshooting steps", "locale": "en-US"}},
           {"type": "tool_output", "tool_name": "query_knowledgebase", "response": {"article_id": "kb_431", "confidence": 0.74}}
         ]},
        {"role": "caller", "turn_id": 3, "text": "That covers everything, thank you!", "timestamp": "2025-09-20T08:00:40Z",
         "intent": "gratitude", "sentiment": "positive"},
        {"role": "caller", "turn_id": 4, "text": "Goodbye.", "timestamp": "2025-09-20T08:01:35Z",
         "intent": "farewell", "sentiment": "positive", "ended_call": true}
      ]
    },
    {
      "conversation_id": "conv_ext_002",
      "duration_seconds": 3723,
      "turns": [
        {"role": "caller", "turn_id": 1, "text": "My paycheck is missing overtime.", "timestamp": "2025-09-21T09:00:00Z",
         "intent": "payroll_issue", "sentiment": "negative"},
        {"role": "bot", "turn_id": 2, "text": "I'll escalate this.", "timestamp": "2025-09-21T09:00:10Z",
         "intent": "escalation",
         "agentic_action": [
           {"type": "tool_call", "tool_name": "forward_to_human", "request": {"routing_target": "payroll_operations"}},
           {"type": "agent_invocation", "description": "Escalated to payroll_operations"}
         ]},
        {"role": "bot", "turn_id": 3, "text": "Ending the call now.", "timestamp": "2025-09-21T10:02:03Z",
         "intent": "conversation_end"}
      ]
    },
    {
      "conversation_id": "conv_ext_003",
      "duration_seconds": 60,
      "turns": [
        {"role": "caller", "turn_id": 1, "text": "Hello?", "timestamp": "2025-09-22T11:00:00Z", "intent": "greeting"},
        {"role": "bot", "turn_id": 2, "text": "Are you still there?", "timestamp": "2025-09-22T11:00:20Z",
         "intent": "check_in", "agentic_action": []}
      ]
    }
  ]
}"#;

fn store() -> DocumentStore {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("sample_input_ext.json");
    std::fs::write(&path, DOCUMENT).unwrap();

    let mut store = DocumentStore::new();
    store.load_path(&path).unwrap();
    store
}

fn ids(selection: &[&shared_types::Conversation]) -> Vec<String> {
    selection.iter().map(|c| c.conversation_id.clone()).collect()
}

#[test]
fn test_default_filter_keeps_everything_in_order() {
    let store = store();
    let selection = ConversationFilter::default().apply(store.document());
    assert_eq!(ids(&selection), vec!["conv_ext_001", "conv_ext_002", "conv_ext_003"]);
}

#[test]
fn test_ended_by_partitions_closed_conversations() {
    let store = store();
    let document = store.document();

    let caller = ConversationFilter::new().with_ended_by(EndedBy::Caller);
    assert_eq!(ids(&caller.apply(document)), vec!["conv_ext_001"]);

    let bot = ConversationFilter::new().with_ended_by(EndedBy::Bot);
    assert_eq!(ids(&bot.apply(document)), vec!["conv_ext_002"]);

    // Fields are public for callers that assemble a filter incrementally.
    let mut open_only = ConversationFilter::new();
    open_only.ended_by = EndedBy::Any;
    open_only.turns = Some(2..=2);
    assert_eq!(ids(&open_only.apply(document)), vec!["conv_ext_003"]);
}

#[test]
fn test_facets() {
    let store = store();
    let document = store.document();
    assert_eq!(
        tool_facets(document),
        vec!["forward_to_human".to_string(), TOOL_QUERY_KNOWLEDGEBASE.to_string()]
    );

    let intents = intent_facets(document);
    assert_eq!(intents.first().map(String::as_str), Some("check_in"));
    assert!(intents.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(intents.len(), 8);
}

#[test]
fn test_text_search_with_scope_and_position() {
    let store = store();
    let document = store.document();

    let filter = ConversationFilter::new().with_pattern("VPN");
    assert_eq!(ids(&filter.apply(document)), vec!["conv_ext_001"]);

    let first_caller = ConversationFilter::new()
        .with_scope(Scope::Caller)
        .with_position(Position::First)
        .with_pattern("^hello");
    assert_eq!(ids(&first_caller.apply(document)), vec!["conv_ext_003"]);

    let broken = ConversationFilter::new().with_pattern("[a-");
    assert!(broken.pattern_is_invalid());
    assert!(broken.apply(document).is_empty());
}

#[test]
fn test_sentiment_aggregates() {
    let store = store();
    let document = store.document();

    let first = sentiment_breakdown(&document.conversations[0]);
    assert_eq!(first[0].sentiment, Sentiment::Positive);
    assert_eq!((first[0].count, first[0].percent), (2, 50));
    assert_eq!((first[1].count, first[1].percent), (2, 50));
    assert_eq!((first[2].count, first[2].percent), (0, 0));

    let negative = ConversationFilter::new().with_sentiments([Sentiment::Negative]);
    let selection = negative.apply(document);
    assert_eq!(ids(&selection), vec!["conv_ext_002"]);

    // 1 negative, 2 neutral (one by default) of 3 turns
    let shares = global_sentiment(&selection);
    assert_eq!(shares[1].count, 2);
    assert_eq!(shares[1].percent, 67);
    assert_eq!(shares[2].percent, 33);
}

#[test]
fn test_duration_totals_and_export() {
    let store = store();
    let document = store.document();
    let filter = ConversationFilter::new().with_duration(61..=10_000);
    let selection = filter.apply(document);
    assert_eq!(total_duration(&selection), 95 + 3723);
    assert_eq!(format_duration(total_duration(&selection)), "1h 3m 38s");

    let exported = export_selection(&selection);
    assert_eq!(exported.len(), 2);
    let json = serde_json::to_value(&exported).unwrap();
    assert_eq!(json["conversations"][1]["conversation_id"], "conv_ext_002");
    assert_eq!(json["conversations"][1]["turns"][0]["role"], "caller");

    let open = &document.conversations[2];
    assert_eq!(open.turns[1].role, Role::Bot);
    assert!(open.turns[1].actions().is_empty());
    assert!(open.turns[1].agentic_action.is_some());
}

#[test]
fn test_intent_and_tool_predicates_combine() {
    let store = store();
    let document = store.document();

    let escalated = ConversationFilter::new().with_intent("escalation");
    assert_eq!(ids(&escalated.apply(document)), vec!["conv_ext_002"]);

    let knowledge = ConversationFilter::new().with_tool(TOOL_QUERY_KNOWLEDGEBASE);
    assert_eq!(ids(&knowledge.apply(document)), vec!["conv_ext_001"]);

    let both = ConversationFilter::new()
        .with_intent("escalation")
        .with_tool(TOOL_QUERY_KNOWLEDGEBASE);
    assert!(both.apply(document).is_empty());

    // Agent invocations carry no tool name.
    let handoff = ConversationFilter::new().with_tool("Escalated to payroll_operations");
    assert!(handoff.apply(document).is_empty());
}
