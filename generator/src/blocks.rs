//! Conversation build state and block generators.
//!
//! A [`ConversationBuilder`] owns the turns accumulated so far, the running
//! clock and the caller identity for exactly one in-flight conversation. Each
//! block method appends a fixed-shape run of turns. Every turn after the first
//! is preceded by a random positive delay, so timestamps strictly increase
//! while the builder is append-only. Only [`ConversationBuilder::conclude`]
//! produces an `ended_call` turn.

use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;
use shared_types::{
    memory_entry, Action, Sentiment, Turn, INTENT_ESCALATION, INTENT_FAREWELL, INTENT_GREETING,
    TOOL_FORWARD_TO_HUMAN, TOOL_PAYROLL_ADJUSTMENT, TOOL_PAYROLL_LOOKUP, TOOL_QUERY_KNOWLEDGEBASE,
    TOOL_QUERY_ORDER_SYSTEM, TOOL_UPDATE_BENEFITS_PORTAL, TOOL_VERIFY_IDENTITY,
};

use crate::catalog::{pick, ScenarioCatalog};
use crate::factory::{make_turn, TurnSpec};

pub const AUTHENTICATION_TURNS: usize = 6;
pub const CONCLUSION_TURNS: usize = 3;

// Per-step delay bounds in seconds
const AUTH_DELAY: RangeInclusive<i64> = 6..=18;
const KNOWLEDGE_DELAY: RangeInclusive<i64> = 7..=16;
const REROUTE_DELAY: RangeInclusive<i64> = 5..=15;
const STATUS_DELAY: RangeInclusive<i64> = 6..=12;
const BENEFIT_DELAY: RangeInclusive<i64> = 6..=15;
const PAYROLL_DELAY: RangeInclusive<i64> = 5..=12;
const CONCLUSION_DELAY: RangeInclusive<i64> = 5..=10;
const SMALL_TALK_PROMPT_DELAY: RangeInclusive<i64> = 5..=10;
const SMALL_TALK_REPLY_DELAY: RangeInclusive<i64> = 5..=9;

/// Identity fields threaded through blocks that reference the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub name: String,
    pub employee_id: String,
    pub pin_fragment: String,
}

impl CallerIdentity {
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, catalog: &ScenarioCatalog) -> Self {
        Self {
            name: pick(rng, &catalog.callers).to_string(),
            employee_id: format!("EMP{}", rng.random_range(10_000..=99_999)),
            pin_fragment: rng.random_range(10..=99).to_string(),
        }
    }
}

pub struct ConversationBuilder<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
    catalog: &'a ScenarioCatalog,
    identity: CallerIdentity,
    turns: Vec<Turn>,
    started_at: DateTime<Utc>,
    clock: DateTime<Utc>,
}

impl<'a, R: Rng + ?Sized> ConversationBuilder<'a, R> {
    pub fn new(
        rng: &'a mut R,
        catalog: &'a ScenarioCatalog,
        identity: CallerIdentity,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            rng,
            catalog,
            identity,
            turns: Vec::new(),
            started_at,
            clock: started_at,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Random source shared with the composer for block selection.
    pub fn rng(&mut self) -> &mut R {
        &mut *self.rng
    }

    /// Release the accumulated turns and the conversation start time.
    pub fn finish(self) -> (Vec<Turn>, DateTime<Utc>) {
        (self.turns, self.started_at)
    }

    fn push(&mut self, spec: TurnSpec, delay: RangeInclusive<i64>) {
        if !self.is_empty() {
            let secs = self.rng.random_range(delay);
            self.clock += Duration::seconds(secs);
        }
        let turn_id = self.turns.len() as u32 + 1;
        self.turns.push(make_turn(turn_id, spec, self.clock));
    }

    fn pick(&mut self, items: &'a [String]) -> &'a str {
        pick(&mut *self.rng, items)
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    /// Greeting, id and PIN exchange, then a verified-identity turn.
    pub fn authenticate(&mut self) {
        let CallerIdentity {
            name,
            employee_id,
            pin_fragment,
        } = self.identity.clone();

        self.push(
            TurnSpec::caller(
                INTENT_GREETING,
                format!("Hi, this is {name}. I need help verifying my account details."),
            ),
            AUTH_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "authentication",
                "Thanks for calling. To get started, may I have your employee ID?",
            ),
            AUTH_DELAY,
        );
        self.push(
            TurnSpec::caller("provide_employee_id", format!("Sure, it's {employee_id}.")),
            AUTH_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "authentication",
                "Thank you. For security, can you confirm the first two digits of your PIN?",
            ),
            AUTH_DELAY,
        );
        self.push(
            TurnSpec::caller("provide_pin_digits", format!("They are {pin_fragment}.")),
            AUTH_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "authentication_success",
                "Great, I've confirmed your identity. How can I assist you today?",
            )
            .sentiment(Sentiment::Positive)
            .actions(vec![
                Action::tool_call(
                    TOOL_VERIFY_IDENTITY,
                    json!({ "employee_id": employee_id, "pin_prefix": pin_fragment }),
                ),
                Action::tool_output(
                    TOOL_VERIFY_IDENTITY,
                    json!({ "status": "verified", "employee": employee_id }),
                ),
                Action::persistent_storage(memory_entry("last_verified_user", employee_id.clone())),
            ]),
            AUTH_DELAY,
        );
    }

    pub fn knowledge_lookup(&mut self, topic: &str) {
        let question = match self.rng.random_range(0..3) {
            0 => format!("I need more information on {topic}."),
            1 => format!("Can you look up {topic}?"),
            _ => format!("What does the knowledge base say about {topic}?"),
        };
        let response = match self.rng.random_range(0..3) {
            0 => format!("Let me check {topic}."),
            1 => format!("I'll search the knowledge base for {topic}."),
            _ => format!("Give me a moment to review {topic}."),
        };
        let article_id = format!("kb_{}", self.rng.random_range(100..=999));
        let confidence = (self.rng.random_range(0.6..0.9_f64) * 100.0).round() / 100.0;

        self.push(TurnSpec::caller("knowledge_request", question), KNOWLEDGE_DELAY);
        self.push(
            TurnSpec::bot("knowledge_lookup", response).actions(vec![
                Action::tool_call(
                    TOOL_QUERY_KNOWLEDGEBASE,
                    json!({ "query": topic, "locale": "en-US" }),
                ),
                Action::tool_output(
                    TOOL_QUERY_KNOWLEDGEBASE,
                    json!({
                        "article_id": article_id,
                        "summary": format!("Summary for {topic}"),
                        "confidence": confidence,
                    }),
                ),
            ]),
            KNOWLEDGE_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "knowledge_response",
                format!(
                    "The knowledge base recommends the following: \
                     {topic} guidance is now on your email."
                ),
            )
            .sentiment(Sentiment::Positive),
            KNOWLEDGE_DELAY,
        );
    }

    /// Hand the case to a human team.
    pub fn case_reroute(&mut self) {
        let catalog = self.catalog;
        let target = self.pick(&catalog.departments).to_string();
        let ticket_id = format!("case_{}", self.rng.random_range(10_000..=99_999));

        self.push(
            TurnSpec::bot(
                INTENT_ESCALATION,
                "This might require a specialist. I'll escalate it for you now.",
            )
            .actions(vec![
                Action::tool_call(
                    TOOL_FORWARD_TO_HUMAN,
                    json!({ "routing_target": target, "ticket_id": ticket_id }),
                ),
                Action::agent_invocation(format!("Escalated to {target}")),
                Action::persistent_storage(memory_entry("last_ticket_id", ticket_id.clone())),
            ]),
            REROUTE_DELAY,
        );
        self.push(
            TurnSpec::caller(
                "acknowledge_escalation",
                "Okay, I'll wait for the specialist.",
            ),
            REROUTE_DELAY,
        );
    }

    pub fn status_update(&mut self) {
        let catalog = self.catalog;
        let order_id = format!("order_{}", self.rng.random_range(2_000..=7_000));
        let status = self.pick(&catalog.order_statuses).to_string();
        let eta_days = self.rng.random_range(1..=7);

        self.push(
            TurnSpec::caller(
                "order_status_request",
                format!("Can you tell me the status of order {order_id}?"),
            ),
            STATUS_DELAY,
        );
        self.push(
            TurnSpec::bot("order_status_lookup", "I'll look that up for you.").actions(vec![
                Action::tool_call(TOOL_QUERY_ORDER_SYSTEM, json!({ "order_id": order_id })),
                Action::tool_output(
                    TOOL_QUERY_ORDER_SYSTEM,
                    json!({ "order_id": order_id, "status": status, "eta_days": eta_days }),
                ),
            ]),
            STATUS_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "order_status_response",
                format!(
                    "The order {order_id} is currently being processed. \
                     I'll send you updates as it progresses."
                ),
            )
            .sentiment(Sentiment::Positive),
            STATUS_DELAY,
        );
    }

    pub fn benefit_change(&mut self) {
        let catalog = self.catalog;
        let benefit = self.pick(&catalog.benefit_types).to_string();
        let plan = self.pick(&catalog.benefit_plans).to_string();

        self.push(
            TurnSpec::caller(
                "benefits_change_request",
                format!("I need to update my {benefit} plan enrollment."),
            ),
            BENEFIT_DELAY,
        );
        self.push(
            TurnSpec::bot("benefits_change_process", "Absolutely, I'll process that now.").actions(
                vec![
                    Action::tool_call(
                        TOOL_UPDATE_BENEFITS_PORTAL,
                        json!({ "benefit_type": benefit, "plan": plan }),
                    ),
                    Action::tool_output(
                        TOOL_UPDATE_BENEFITS_PORTAL,
                        json!({ "benefit_type": benefit, "plan": plan, "status": "submitted" }),
                    ),
                    Action::persistent_storage(memory_entry(
                        "last_benefit_change",
                        format!("{benefit}_{plan}"),
                    )),
                ],
            ),
            BENEFIT_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "benefits_change_confirm",
                format!("Your {benefit} plan has been updated to {plan}."),
            )
            .sentiment(Sentiment::Positive),
            BENEFIT_DELAY,
        );
    }

    /// Lookup and correction both carry actions.
    pub fn payroll_inquiry(&mut self) {
        let catalog = self.catalog;
        let month = self.pick(&catalog.payroll_months).to_string();
        let payroll_id = format!("pay_{}", self.rng.random_range(1_000..=9_999));
        let overtime_hours = self.rng.random_range(0..=10);
        let completion_days = self.rng.random_range(1..=3);

        self.push(
            TurnSpec::caller(
                "payroll_issue",
                format!("I think my {month} paycheck is missing overtime hours."),
            )
            .sentiment(Sentiment::Negative),
            PAYROLL_DELAY,
        );
        self.push(
            TurnSpec::bot("payroll_lookup", "Let me review the payroll record.").actions(vec![
                Action::tool_call(
                    TOOL_PAYROLL_LOOKUP,
                    json!({ "payroll_id": payroll_id, "month": month }),
                ),
                Action::tool_output(
                    TOOL_PAYROLL_LOOKUP,
                    json!({
                        "payroll_id": payroll_id,
                        "overtime_hours": overtime_hours,
                        "status": "reviewed",
                    }),
                ),
            ]),
            PAYROLL_DELAY,
        );
        self.push(
            TurnSpec::bot(
                "payroll_resolution",
                "I see the overtime was not captured. I'll submit a correction request now.",
            )
            .actions(vec![
                Action::tool_call(
                    TOOL_PAYROLL_ADJUSTMENT,
                    json!({ "payroll_id": payroll_id, "adjustment": "add_overtime" }),
                ),
                Action::tool_output(
                    TOOL_PAYROLL_ADJUSTMENT,
                    json!({
                        "payroll_id": payroll_id,
                        "status": "pending_manager_review",
                        "expected_completion_days": completion_days,
                    }),
                ),
            ]),
            PAYROLL_DELAY,
        );
    }

    /// Append bot check-in / caller acknowledgement pairs until at least
    /// `min_turns` turns exist. Returns the number of turns added.
    pub fn pad_small_talk(&mut self, min_turns: usize) -> usize {
        let catalog = self.catalog;
        let before = self.turns.len();
        while self.turns.len() < min_turns {
            let prompt = self.pick(&catalog.small_talk_prompts).to_string();
            let reply = self.pick(&catalog.small_talk_replies).to_string();
            self.push(TurnSpec::bot("status_update", prompt), SMALL_TALK_PROMPT_DELAY);
            self.push(
                TurnSpec::caller("acknowledgement", reply),
                SMALL_TALK_REPLY_DELAY,
            );
        }
        self.turns.len() - before
    }

    /// Keep the earliest `max_turns` turns and rewind the clock to the new
    /// last turn. Returns the number of turns dropped.
    pub fn truncate(&mut self, max_turns: usize) -> usize {
        if self.turns.len() <= max_turns {
            return 0;
        }
        let dropped = self.turns.len() - max_turns;
        self.turns.truncate(max_turns);
        self.clock = self
            .turns
            .last()
            .map(|turn| turn.timestamp)
            .unwrap_or(self.started_at);
        dropped
    }

    /// Gratitude, farewell with a case-closed memory write, and the caller's
    /// goodbye that ends the call.
    pub fn conclude(&mut self) {
        self.push(
            TurnSpec::caller("gratitude", "That covers everything, thank you!")
                .sentiment(Sentiment::Positive),
            CONCLUSION_DELAY,
        );
        self.push(
            TurnSpec::bot(INTENT_FAREWELL, "Happy to help. Have a great day!")
                .sentiment(Sentiment::Positive)
                .actions(vec![Action::persistent_storage(memory_entry(
                    "final_summary",
                    "case_closed",
                ))]),
            CONCLUSION_DELAY,
        );
        self.push(
            TurnSpec::caller(INTENT_FAREWELL, "Goodbye.")
                .sentiment(Sentiment::Positive)
                .ends_call(),
            CONCLUSION_DELAY,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared_types::{Role, MEMORY_TOOL_NAME};

    fn identity() -> CallerIdentity {
        CallerIdentity {
            name: "Riley".to_string(),
            employee_id: "EMP12345".to_string(),
            pin_fragment: "42".to_string(),
        }
    }

    fn assert_strictly_increasing(turns: &[Turn]) {
        for pair in turns.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn test_authentication_shape() {
        let catalog = ScenarioCatalog::built_in().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let start = crate::config::default_base_start();
        let mut builder = ConversationBuilder::new(&mut rng, &catalog, identity(), start);
        builder.authenticate();

        let turns = builder.turns();
        assert_eq!(turns.len(), AUTHENTICATION_TURNS);
        assert_eq!(turns[0].timestamp, start);
        assert_eq!(turns[0].intent, INTENT_GREETING);
        assert!(turns[0].text.contains("Riley"));
        assert!(turns[2].text.contains("EMP12345"));
        assert!(turns[4].text.contains("42"));

        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::Caller, Role::Bot, Role::Caller, Role::Bot, Role::Caller, Role::Bot]
        );

        let actions = turns[5].actions();
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            Action::ToolCall { tool_name, .. } if tool_name == TOOL_VERIFY_IDENTITY
        ));
        assert!(matches!(
            &actions[1],
            Action::ToolOutput { response, .. } if response["status"] == "verified"
        ));
        assert!(matches!(
            &actions[2],
            Action::PersistentStorage { tool_name, .. } if tool_name == MEMORY_TOOL_NAME
        ));
        assert!(turns[..5].iter().all(|t| t.agentic_action.is_none()));
        assert_strictly_increasing(turns);
    }

    #[test]
    fn test_body_blocks_shapes() {
        let catalog = ScenarioCatalog::built_in().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let start = crate::config::default_base_start();
        let mut builder = ConversationBuilder::new(&mut rng, &catalog, identity(), start);

        builder.knowledge_lookup("holiday calendar");
        assert_eq!(builder.len(), 3);
        assert!(builder.turns()[1].uses_tool(TOOL_QUERY_KNOWLEDGEBASE));

        builder.case_reroute();
        assert_eq!(builder.len(), 5);
        let escalation = &builder.turns()[3];
        assert_eq!(escalation.intent, INTENT_ESCALATION);
        assert!(escalation
            .actions()
            .iter()
            .any(|a| matches!(a, Action::AgentInvocation { .. })));

        builder.status_update();
        builder.benefit_change();
        builder.payroll_inquiry();
        assert_eq!(builder.len(), 14);

        let payroll = &builder.turns()[11..14];
        assert_eq!(
            payroll.iter().filter(|t| t.agentic_action.is_some()).count(),
            2
        );
        assert!(builder.turns().iter().all(|t| !t.ended_call));
        assert_strictly_increasing(builder.turns());
    }

    #[test]
    fn test_padding_and_truncation() {
        let catalog = ScenarioCatalog::built_in().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let start = crate::config::default_base_start();
        let mut builder = ConversationBuilder::new(&mut rng, &catalog, identity(), start);
        builder.authenticate();

        assert_eq!(builder.pad_small_talk(11), 6);
        assert_eq!(builder.len(), 12);
        assert_eq!(builder.pad_small_talk(5), 0);

        assert_eq!(builder.truncate(9), 3);
        assert_eq!(builder.len(), 9);
        assert_eq!(builder.clock(), builder.turns()[8].timestamp);
        assert_eq!(builder.truncate(20), 0);
    }

    #[test]
    fn test_conclusion_ends_call() {
        let catalog = ScenarioCatalog::built_in().unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let start = crate::config::default_base_start();
        let mut builder = ConversationBuilder::new(&mut rng, &catalog, identity(), start);
        assert!(builder.is_empty());
        builder.authenticate();
        builder.conclude();

        let (turns, started_at) = builder.finish();
        assert_eq!(started_at, start);
        assert_eq!(turns.len(), AUTHENTICATION_TURNS + CONCLUSION_TURNS);
        assert_eq!(turns.iter().filter(|t| t.ended_call).count(), 1);
        assert!(turns.last().unwrap().ended_call);
        assert_strictly_increasing(&turns);
    }
}
