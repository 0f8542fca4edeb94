use std::ops::RangeInclusive;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::composer::{BodyBlock, TurnWindow};

/// Authentication (6 turns) plus Conclusion (3 turns).
pub const MIN_WINDOW_TURNS: usize = 9;

/// 2025-09-20T08:00:00Z
const DEFAULT_BASE_START_SECS: i64 = 1_758_355_200;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse env var {key}={value}: {reason}")]
    Parse {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Conversation count must be at least 1")]
    EmptyBatch,

    #[error("{name} range {lo}-{hi} is empty")]
    EmptyRange {
        name: &'static str,
        lo: usize,
        hi: usize,
    },

    #[error("{name} must be at least {required}, got {found}")]
    BelowMinimum {
        name: &'static str,
        required: usize,
        found: usize,
    },

    #[error("Max turns ({max}) must be greater than min turns ({min})")]
    InvertedWindow { min: usize, max: usize },

    #[error("Escalation probability {0} is outside [0, 1]")]
    EscalationProbability(f64),

    #[error("No body blocks enabled")]
    NoBodyBlocks,

    #[error("Unknown body block '{0}'")]
    UnknownBodyBlock(String),
}

/// Shape of every conversation in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionConfig {
    /// Sub-range the per-conversation minimum is drawn from
    pub min_turns: RangeInclusive<usize>,
    /// Sub-range the per-conversation maximum is drawn from; lies above `min_turns`
    pub max_turns: RangeInclusive<usize>,
    /// How many body blocks follow authentication
    pub body_iterations: RangeInclusive<usize>,
    /// Chance of a case reroute after each body block
    pub escalation_probability: f64,
    /// Body blocks eligible for selection
    pub body_blocks: Vec<BodyBlock>,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            min_turns: 10..=18,
            max_turns: 20..=30,
            body_iterations: 2..=4,
            escalation_probability: 0.25,
            body_blocks: BodyBlock::ALL.to_vec(),
        }
    }
}

impl CompositionConfig {
    /// Every window this config can draw must satisfy `TurnWindow::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("min_turns", &self.min_turns)?;
        non_empty("max_turns", &self.max_turns)?;
        non_empty("body_iterations", &self.body_iterations)?;

        at_least("min_turns", 1, *self.min_turns.start())?;
        at_least("body_iterations", 1, *self.body_iterations.start())?;

        // The tightest pairing is the largest min against the smallest max.
        TurnWindow::new(*self.min_turns.end(), *self.max_turns.start())?;

        if !(0.0..=1.0).contains(&self.escalation_probability) {
            return Err(ConfigError::EscalationProbability(
                self.escalation_probability,
            ));
        }
        if self.body_blocks.is_empty() {
            return Err(ConfigError::NoBodyBlocks);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of conversations in the document
    pub conversation_count: usize,
    /// Sink destination
    pub output_path: PathBuf,
    /// Master seed; drawn from OS entropy when unset
    pub seed: Option<u64>,
    /// Earliest possible conversation start
    pub base_start: DateTime<Utc>,
    pub composition: CompositionConfig,
    /// Conversation ids are `{id_prefix}{index:0id_width}`
    pub id_prefix: String,
    pub id_width: usize,
    /// Optional TOML scenario catalog override
    pub catalog_path: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            conversation_count: 500,
            output_path: PathBuf::from("data/sample_input_ext.json"),
            seed: None,
            base_start: default_base_start(),
            composition: CompositionConfig::default(),
            id_prefix: "conv_ext_".to_string(),
            id_width: 3,
            catalog_path: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, then validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let composition = CompositionConfig {
            min_turns: env_range(&lookup, "TRANSCRIPT_MIN_TURNS", defaults.composition.min_turns)?,
            max_turns: env_range(&lookup, "TRANSCRIPT_MAX_TURNS", defaults.composition.max_turns)?,
            body_iterations: env_range(
                &lookup,
                "TRANSCRIPT_BODY_ITERATIONS",
                defaults.composition.body_iterations,
            )?,
            escalation_probability: env_parse(
                &lookup,
                "TRANSCRIPT_ESCALATION_PROBABILITY",
                defaults.composition.escalation_probability,
            )?,
            body_blocks: env_csv(&lookup, "TRANSCRIPT_BODY_BLOCKS")
                .map(|names| {
                    names
                        .iter()
                        .map(|name| name.parse::<BodyBlock>())
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or(defaults.composition.body_blocks),
        };

        let config = Self {
            conversation_count: env_parse(
                &lookup,
                "TRANSCRIPT_COUNT",
                defaults.conversation_count,
            )?,
            output_path: lookup("TRANSCRIPT_OUTPUT")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            seed: env_parse_opt(&lookup, "TRANSCRIPT_SEED")?,
            base_start: env_parse(&lookup, "TRANSCRIPT_BASE_START", defaults.base_start)?,
            composition,
            id_prefix: env_str(&lookup, "TRANSCRIPT_ID_PREFIX", &defaults.id_prefix),
            id_width: env_parse(&lookup, "TRANSCRIPT_ID_WIDTH", defaults.id_width)?,
            catalog_path: lookup("TRANSCRIPT_CATALOG_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conversation_count == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        self.composition.validate()
    }
}

pub fn default_base_start() -> DateTime<Utc> {
    DateTime::from_timestamp(DEFAULT_BASE_START_SECS, 0).unwrap_or_default()
}

fn non_empty(name: &'static str, range: &RangeInclusive<usize>) -> Result<(), ConfigError> {
    if range.is_empty() {
        return Err(ConfigError::EmptyRange {
            name,
            lo: *range.start(),
            hi: *range.end(),
        });
    }
    Ok(())
}

fn at_least(name: &'static str, required: usize, found: usize) -> Result<(), ConfigError> {
    if found < required {
        return Err(ConfigError::BelowMinimum {
            name,
            required,
            found,
        });
    }
    Ok(())
}

fn parse_error(key: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(env_parse_opt(lookup, key)?.unwrap_or(default))
}

fn env_parse_opt<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) if !val.trim().is_empty() => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| parse_error(key, &val, e)),
        _ => Ok(None),
    }
}

fn env_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Inclusive `lo-hi` range; a single number means `n-n`.
fn env_range<F>(
    lookup: &F,
    key: &str,
    default: RangeInclusive<usize>,
) -> Result<RangeInclusive<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            parse_range(&raw).map_err(|e| parse_error(key, &raw, e))
        }
        _ => Ok(default),
    }
}

fn parse_range(raw: &str) -> Result<RangeInclusive<usize>, std::num::ParseIntError> {
    let (lo, hi) = raw.split_once('-').unwrap_or((raw, raw));
    Ok(lo.trim().parse()?..=hi.trim().parse()?)
}

fn env_csv<F>(lookup: &F, key: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
