//! Conversation composer
//!
//! Runs one conversation end to end:
//!
//! 1. Authentication, always first.
//! 2. A random number of body blocks, each possibly followed by a case reroute.
//! 3. Length repair before the close: small-talk padding up to `min`, or
//!    truncation to the earliest `max` turns.
//! 4. Conclusion, unconditionally.
//! 5. Length repair after the close: interior trimming that keeps the closing
//!    block intact, or check-in pairs inserted before the terminal turn.
//! 6. A synthetic farewell if the last turn still does not end the call.
//! 7. Renumbering `turn_id` to 1-based positions.
//! 8. Duration from the start timestamp, floored at 60 seconds.
//!
//! The close is never trimmed and nothing is ever placed after it.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use shared_types::{Conversation, Sentiment, Turn, INTENT_FAREWELL};
use tracing::{debug, trace};

use crate::blocks::{CallerIdentity, ConversationBuilder, CONCLUSION_TURNS};
use crate::catalog::{pick, ScenarioCatalog};
use crate::config::{CompositionConfig, ConfigError, MIN_WINDOW_TURNS};
use crate::factory::{make_turn, TurnSpec};

pub const MIN_DURATION_SECONDS: i64 = 60;

const CHECK_IN_DELAY: RangeInclusive<i64> = 6..=12;
const CHECK_IN_REPLY_DELAY: RangeInclusive<i64> = 6..=10;
const TERMINAL_DELAY: RangeInclusive<i64> = 5..=10;

/// Inclusive target length for one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnWindow {
    pub min: usize,
    pub max: usize,
}

impl TurnWindow {
    /// `max` must exceed `min` and leave room for authentication plus conclusion.
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        if max <= min {
            return Err(ConfigError::InvertedWindow { min, max });
        }
        if max < MIN_WINDOW_TURNS {
            return Err(ConfigError::BelowMinimum {
                name: "max_turns",
                required: MIN_WINDOW_TURNS,
                found: max,
            });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Body blocks eligible for random selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyBlock {
    KnowledgeLookup,
    BenefitChange,
    PayrollInquiry,
    StatusUpdate,
}

impl BodyBlock {
    pub const ALL: [BodyBlock; 4] = [
        BodyBlock::KnowledgeLookup,
        BodyBlock::BenefitChange,
        BodyBlock::PayrollInquiry,
        BodyBlock::StatusUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyBlock::KnowledgeLookup => "knowledge_lookup",
            BodyBlock::BenefitChange => "benefit_change",
            BodyBlock::PayrollInquiry => "payroll_inquiry",
            BodyBlock::StatusUpdate => "status_update",
        }
    }
}

impl FromStr for BodyBlock {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|block| block.as_str() == value)
            .ok_or_else(|| ConfigError::UnknownBodyBlock(value.to_string()))
    }
}

impl std::fmt::Display for BodyBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-conversation inputs drawn by the batch driver
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationPlan {
    pub conversation_id: String,
    pub window: TurnWindow,
    pub identity: CallerIdentity,
    pub started_at: DateTime<Utc>,
}

/// Which repairs fired while composing one conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairLog {
    pub body_blocks: Vec<BodyBlock>,
    pub escalations: usize,
    pub padded_turns: usize,
    pub trimmed_turns: usize,
    pub post_conclusion_trimmed: usize,
    pub post_conclusion_padded: usize,
    pub synthetic_terminal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedConversation {
    pub conversation: Conversation,
    pub window: TurnWindow,
    pub repairs: RepairLog,
}

pub fn compose_conversation<R: Rng + ?Sized>(
    plan: ConversationPlan,
    composition: &CompositionConfig,
    catalog: &ScenarioCatalog,
    rng: &mut R,
) -> ComposedConversation {
    let ConversationPlan {
        conversation_id,
        window,
        identity,
        started_at,
    } = plan;
    let mut repairs = RepairLog::default();

    let mut builder = ConversationBuilder::new(&mut *rng, catalog, identity, started_at);
    builder.authenticate();

    let iterations = if composition.body_iterations.is_empty() {
        0
    } else {
        builder
            .rng()
            .random_range(composition.body_iterations.clone())
    };
    let escalation_probability = composition.escalation_probability.clamp(0.0, 1.0);
    let mut used_topics: HashSet<String> = HashSet::new();

    for _ in 0..iterations {
        let Some(block) = choose_block(builder.rng(), &composition.body_blocks) else {
            break;
        };
        match block {
            BodyBlock::KnowledgeLookup => {
                let topic = choose_topic(builder.rng(), &catalog.knowledge_topics, &used_topics);
                used_topics.insert(topic.clone());
                builder.knowledge_lookup(&topic);
            }
            BodyBlock::BenefitChange => builder.benefit_change(),
            BodyBlock::PayrollInquiry => builder.payroll_inquiry(),
            BodyBlock::StatusUpdate => builder.status_update(),
        }
        repairs.body_blocks.push(block);

        if builder.rng().random_bool(escalation_probability) {
            builder.case_reroute();
            repairs.escalations += 1;
        }
    }

    // Length target, before the close
    repairs.padded_turns = builder.pad_small_talk(window.min);
    repairs.trimmed_turns = builder.truncate(window.max);

    builder.conclude();
    let (turns, started_at) = builder.finish();

    // Correction after the close
    let (mut turns, trimmed) = trim_preserving_close(turns, window.max);
    repairs.post_conclusion_trimmed = trimmed;
    repairs.post_conclusion_padded = pad_before_terminal(&mut turns, window.min, rng);
    repairs.synthetic_terminal = ensure_terminal(&mut turns, started_at, rng);

    renumber(&mut turns);
    let duration_seconds = duration_seconds(started_at, &turns);

    trace!(conversation_id = %conversation_id, ?repairs, "composition repairs");
    debug!(
        conversation_id = %conversation_id,
        turns = turns.len(),
        min = window.min,
        max = window.max,
        duration_seconds,
        "composed conversation"
    );

    let composed = ComposedConversation {
        conversation: Conversation {
            conversation_id,
            duration_seconds,
            turns,
        },
        window,
        repairs,
    };
    debug_assert!(
        crate::invariants::check_conversation(&composed.conversation, Some(composed.window))
            .is_ok()
    );
    composed
}

fn choose_block<R: Rng + ?Sized>(rng: &mut R, blocks: &[BodyBlock]) -> Option<BodyBlock> {
    if blocks.is_empty() {
        return None;
    }
    Some(blocks[rng.random_range(0..blocks.len())])
}

/// Pick a topic not used yet in this conversation; once every topic has been
/// used, any topic may repeat.
pub fn choose_topic<R: Rng + ?Sized>(
    rng: &mut R,
    topics: &[String],
    used: &HashSet<String>,
) -> String {
    let unused: Vec<String> = topics
        .iter()
        .filter(|topic| !used.contains(*topic))
        .cloned()
        .collect();
    if unused.is_empty() {
        pick(rng, topics).to_string()
    } else {
        pick(rng, &unused).to_string()
    }
}

/// Keep the closing block plus the earliest `max - CONCLUSION_TURNS` turns
/// before it. Returns the kept turns and how many were dropped.
pub fn trim_preserving_close(turns: Vec<Turn>, max_turns: usize) -> (Vec<Turn>, usize) {
    if turns.len() <= max_turns {
        return (turns, 0);
    }
    let original = turns.len();
    let close_start = original.saturating_sub(CONCLUSION_TURNS);
    let head_len = max_turns.saturating_sub(CONCLUSION_TURNS).min(close_start);

    let mut turns = turns;
    let close = turns.split_off(close_start);
    turns.truncate(head_len);
    turns.extend(close);

    let dropped = original - turns.len();
    debug!(dropped, max_turns, "trimmed interior turns to preserve close");
    (turns, dropped)
}

/// Insert bot/caller check-in pairs immediately before the terminal turn until
/// `min_turns` is met. The terminal turn stays last and is moved later in time
/// when needed so timestamps keep increasing. Returns the number of turns added.
pub fn pad_before_terminal<R: Rng + ?Sized>(
    turns: &mut Vec<Turn>,
    min_turns: usize,
    rng: &mut R,
) -> usize {
    let Some(terminal) = turns.pop() else {
        return 0;
    };
    let before = turns.len() + 1;
    let mut clock = turns
        .last()
        .map(|turn| turn.timestamp)
        .unwrap_or(terminal.timestamp);

    while turns.len() + 1 < min_turns {
        clock += Duration::seconds(rng.random_range(CHECK_IN_DELAY));
        turns.push(make_turn(
            0,
            TurnSpec::bot("check_in", "Just confirming if you need anything else today."),
            clock,
        ));
        clock += Duration::seconds(rng.random_range(CHECK_IN_REPLY_DELAY));
        turns.push(make_turn(
            0,
            TurnSpec::caller("acknowledgement", "No, that's all. Thanks.")
                .sentiment(Sentiment::Positive),
            clock,
        ));
    }

    let added = turns.len() + 1 - before;
    let mut terminal = terminal;
    if added > 0 && terminal.timestamp <= clock {
        terminal.timestamp = clock + Duration::seconds(rng.random_range(TERMINAL_DELAY));
    }
    turns.push(terminal);
    if added > 0 {
        debug!(added, min_turns, "inserted check-ins before terminal turn");
    }
    added
}

/// Append a farewell that ends the call when the last turn does not.
/// Returns whether a turn was added.
pub fn ensure_terminal<R: Rng + ?Sized>(
    turns: &mut Vec<Turn>,
    started_at: DateTime<Utc>,
    rng: &mut R,
) -> bool {
    if turns.last().is_some_and(|turn| turn.ended_call) {
        return false;
    }
    let anchor = turns.last().map(|turn| turn.timestamp).unwrap_or(started_at);
    let timestamp = anchor + Duration::seconds(rng.random_range(TERMINAL_DELAY));
    turns.push(make_turn(
        0,
        TurnSpec::caller(INTENT_FAREWELL, "Thanks again, bye!")
            .sentiment(Sentiment::Positive)
            .ends_call(),
        timestamp,
    ));
    debug!("appended synthetic farewell turn");
    true
}

/// Overwrite provisional ids with 1-based positions.
pub fn renumber(turns: &mut [Turn]) {
    for (index, turn) in turns.iter_mut().enumerate() {
        turn.turn_id = index as u32 + 1;
    }
}

/// Whole seconds from the start to the last turn, never below 60.
pub fn duration_seconds(started_at: DateTime<Utc>, turns: &[Turn]) -> i64 {
    let elapsed = turns
        .last()
        .map(|turn| (turn.timestamp - started_at).num_seconds())
        .unwrap_or(0);
    elapsed.max(MIN_DURATION_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared_types::Role;

    fn start() -> DateTime<Utc> {
        crate::config::default_base_start()
    }

    fn turn(role: Role, offset_secs: i64, ended_call: bool) -> Turn {
        let spec = TurnSpec::new(role, "filler", "...");
        let spec = if ended_call { spec.ends_call() } else { spec };
        make_turn(99, spec, start() + Duration::seconds(offset_secs))
    }

    fn closed_run(len: usize) -> Vec<Turn> {
        (0..len)
            .map(|i| turn(Role::Caller, i as i64 * 10, i + 1 == len))
            .collect()
    }

    #[test]
    fn test_window_validation() {
        assert!(TurnWindow::new(10, 12).is_ok());
        assert_eq!(
            TurnWindow::new(12, 12).unwrap_err(),
            ConfigError::InvertedWindow { min: 12, max: 12 }
        );
        assert!(matches!(
            TurnWindow::new(3, 8).unwrap_err(),
            ConfigError::BelowMinimum { found: 8, .. }
        ));
        let window = TurnWindow::new(10, 12).unwrap();
        assert!(window.contains(10) && window.contains(12));
        assert!(!window.contains(9) && !window.contains(13));
    }

    #[test]
    fn test_body_block_names_round_trip() {
        for block in BodyBlock::ALL {
            assert_eq!(block.as_str().parse::<BodyBlock>().unwrap(), block);
        }
        assert!("small_talk".parse::<BodyBlock>().is_err());
    }

    #[test]
    fn test_choose_topic_avoids_used_then_falls_back() {
        let topics: Vec<String> = vec!["a".into(), "b".into()];
        let mut rng = StdRng::seed_from_u64(5);
        let used: HashSet<String> = ["a".to_string()].into_iter().collect();
        for _ in 0..20 {
            assert_eq!(choose_topic(&mut rng, &topics, &used), "b");
        }
        let all_used: HashSet<String> = topics.iter().cloned().collect();
        let topic = choose_topic(&mut rng, &topics, &all_used);
        assert!(topics.contains(&topic));
    }

    #[test]
    fn test_trim_preserves_close() {
        let turns = closed_run(15);
        let last_three: Vec<Turn> = turns[12..].to_vec();
        let (trimmed, dropped) = trim_preserving_close(turns, 12);
        assert_eq!(trimmed.len(), 12);
        assert_eq!(dropped, 3);
        assert_eq!(&trimmed[9..], &last_three[..]);
        assert!(trimmed.last().unwrap().ended_call);
        for pair in trimmed.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }

        let (untouched, dropped) = trim_preserving_close(closed_run(10), 12);
        assert_eq!(untouched.len(), 10);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_padding_goes_before_terminal() {
        let mut turns = closed_run(9);
        let mut rng = StdRng::seed_from_u64(6);
        let added = pad_before_terminal(&mut turns, 12, &mut rng);
        assert_eq!(added, 4);
        assert_eq!(turns.len(), 13);
        assert!(turns.last().unwrap().ended_call);
        assert_eq!(turns.iter().filter(|t| t.ended_call).count(), 1);
        assert_eq!(turns[8].intent, "check_in");
        assert_eq!(turns[11].intent, "acknowledgement");
        for pair in turns.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }

        let mut long_enough = closed_run(12);
        assert_eq!(pad_before_terminal(&mut long_enough, 12, &mut rng), 0);
        assert_eq!(long_enough, closed_run(12));
    }

    #[test]
    fn test_ensure_terminal() {
        let mut rng = StdRng::seed_from_u64(7);

        let mut open: Vec<Turn> = (0..3).map(|i| turn(Role::Bot, i * 10, false)).collect();
        assert!(ensure_terminal(&mut open, start(), &mut rng));
        assert_eq!(open.len(), 4);
        assert!(open[3].ended_call);
        assert!(open[3].timestamp > open[2].timestamp);

        let mut empty = Vec::new();
        assert!(ensure_terminal(&mut empty, start(), &mut rng));
        assert_eq!(empty.len(), 1);
        assert!(empty[0].timestamp > start());

        let mut closed = closed_run(9);
        assert!(!ensure_terminal(&mut closed, start(), &mut rng));
        assert_eq!(closed.len(), 9);
    }

    #[test]
    fn test_renumber_and_duration() {
        let mut turns = closed_run(9);
        renumber(&mut turns);
        let ids: Vec<u32> = turns.iter().map(|t| t.turn_id).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<u32>>());

        // 8 gaps of 10s = 80s
        assert_eq!(duration_seconds(start(), &turns), 80);
        assert_eq!(duration_seconds(start(), &turns[..3]), MIN_DURATION_SECONDS);
        assert_eq!(duration_seconds(start(), &[]), MIN_DURATION_SECONDS);
    }
}
