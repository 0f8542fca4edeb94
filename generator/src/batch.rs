//! Batch driver
//!
//! Produces `conversation_count` independent conversations. A master `StdRng`
//! seeded from the batch seed hands each conversation its own seed in index
//! order, so output depends only on the seed, never on scheduling.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::Document;
use tracing::info;

use crate::blocks::CallerIdentity;
use crate::catalog::ScenarioCatalog;
use crate::composer::{compose_conversation, ComposedConversation, ConversationPlan, TurnWindow};
use crate::config::{ConfigError, GeneratorConfig};

const MAX_DAY_OFFSET: i64 = 14;
const MAX_MINUTE_OFFSET: i64 = 9 * 60;

/// Conversations in document order, with the windows they were composed against
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub seed: u64,
    pub conversations: Vec<ComposedConversation>,
}

impl Batch {
    pub fn document(&self) -> Document {
        Document::new(
            self.conversations
                .iter()
                .map(|composed| composed.conversation.clone())
                .collect(),
        )
    }

    pub fn into_document(self) -> Document {
        Document::new(
            self.conversations
                .into_iter()
                .map(|composed| composed.conversation)
                .collect(),
        )
    }

    pub fn total_turns(&self) -> usize {
        self.conversations
            .iter()
            .map(|composed| composed.conversation.turns.len())
            .sum()
    }

    pub fn escalations(&self) -> usize {
        self.conversations
            .iter()
            .map(|composed| composed.repairs.escalations)
            .sum()
    }
}

/// `{prefix}{index + 1}` zero-padded to `width` digits.
pub fn conversation_id(prefix: &str, width: usize, index: usize) -> String {
    format!("{prefix}{:0width$}", index + 1)
}

/// Draw the window, identity and start time for one conversation.
pub fn draw_plan<R: Rng + ?Sized>(
    rng: &mut R,
    index: usize,
    config: &GeneratorConfig,
    catalog: &ScenarioCatalog,
) -> Result<ConversationPlan, ConfigError> {
    let composition = &config.composition;
    let identity = CallerIdentity::draw(rng, catalog);
    let min = rng.random_range(composition.min_turns.clone());
    let max = rng.random_range(composition.max_turns.clone());
    let started_at = draw_start(rng, config.base_start);

    Ok(ConversationPlan {
        conversation_id: conversation_id(&config.id_prefix, config.id_width, index),
        window: TurnWindow::new(min, max)?,
        identity,
        started_at,
    })
}

fn draw_start<R: Rng + ?Sized>(rng: &mut R, base: DateTime<Utc>) -> DateTime<Utc> {
    base + Duration::days(rng.random_range(0..=MAX_DAY_OFFSET))
        + Duration::minutes(rng.random_range(0..=MAX_MINUTE_OFFSET))
}

/// Generate every conversation for `config` from `seed`.
pub fn generate_batch(
    config: &GeneratorConfig,
    catalog: &ScenarioCatalog,
    seed: u64,
) -> Result<Batch, ConfigError> {
    config.validate()?;

    let mut master = StdRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..config.conversation_count)
        .map(|_| master.random::<u64>())
        .collect();

    let conversations = seeds
        .into_iter()
        .enumerate()
        .map(|(index, conversation_seed)| -> Result<ComposedConversation, ConfigError> {
            let mut rng = StdRng::seed_from_u64(conversation_seed);
            let plan = draw_plan(&mut rng, index, config, catalog)?;
            Ok(compose_conversation(
                plan,
                &config.composition,
                catalog,
                &mut rng,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let batch = Batch {
        seed,
        conversations,
    };
    info!(
        seed,
        conversations = batch.conversations.len(),
        turns = batch.total_turns(),
        escalations = batch.escalations(),
        "generated batch"
    );
    Ok(batch)
}
