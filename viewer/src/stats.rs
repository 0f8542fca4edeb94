//! Aggregates over a selection of conversations.

use std::collections::BTreeSet;

use serde::Serialize;
use shared_types::{Conversation, Document, Sentiment, Turn};

/// Share of turns carrying one sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SentimentShare {
    pub sentiment: Sentiment,
    pub count: usize,
    /// Rounded to the nearest whole percent; 0 when there are no turns
    pub percent: u32,
}

fn breakdown<'a>(turns: impl Iterator<Item = &'a Turn>) -> Vec<SentimentShare> {
    let mut counts = [0usize; 3];
    let mut total = 0usize;
    for turn in turns {
        let slot = match turn.sentiment {
            Sentiment::Positive => 0,
            Sentiment::Neutral => 1,
            Sentiment::Negative => 2,
        };
        counts[slot] += 1;
        total += 1;
    }

    Sentiment::ALL
        .into_iter()
        .zip(counts)
        .map(|(sentiment, count)| SentimentShare {
            sentiment,
            count,
            percent: if total == 0 {
                0
            } else {
                (count as f64 * 100.0 / total as f64).round() as u32
            },
        })
        .collect()
}

/// Positive, neutral and negative shares of one conversation's turns.
pub fn sentiment_breakdown(conversation: &Conversation) -> Vec<SentimentShare> {
    breakdown(conversation.turns.iter())
}

/// Shares across every turn of every selected conversation.
pub fn global_sentiment(conversations: &[&Conversation]) -> Vec<SentimentShare> {
    breakdown(conversations.iter().flat_map(|c| c.turns.iter()))
}

pub fn total_duration(conversations: &[&Conversation]) -> i64 {
    conversations.iter().map(|c| c.duration_seconds).sum()
}

/// `"1h 2m 3s"`; hours and minutes are dropped when zero, seconds never are.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{secs}s"));
    parts.join(" ")
}

/// Sorted distinct non-empty intents in the document.
pub fn intent_facets(document: &Document) -> Vec<String> {
    document
        .conversations
        .iter()
        .flat_map(|c| c.turns.iter())
        .filter(|turn| !turn.intent.is_empty())
        .map(|turn| turn.intent.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct tool names referenced by any action in the document.
pub fn tool_facets(document: &Document) -> Vec<String> {
    document
        .conversations
        .iter()
        .flat_map(|c| c.turns.iter())
        .flat_map(|turn| turn.actions())
        .filter_map(|action| action.tool_name())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Copy the selection into a standalone document.
pub fn export_selection(conversations: &[&Conversation]) -> Document {
    Document::new(conversations.iter().map(|c| (*c).clone()).collect())
}
