//! Defines all configuration structures for the SRTT engine.
//!
//! These structs are deserialized with `serde` from layered sources: built-in
//! defaults, an optional TOML file and `SRTT__SECTION__KEY` environment
//! variables. Configuration is fixed once the engine is created.

use crate::common::{Location, ResponseCode};
use crate::components::builder::SequenceBuilder;
use crate::components::pair::{PairPolicy, SequencePair};
use crate::components::selector::Schedule;
use crate::components::sequence::CyclicSequence;
use crate::error::SrttError;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The top-level configuration for the `SrttEngine`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SrttConfig {
    /// Alphabet, block structure and timing of the task.
    #[serde(default)]
    pub task: TaskConfig,

    /// How the regular and irregular sequences are obtained.
    #[serde(default)]
    pub sequences: SequenceConfig,

    /// Where results go and how randomness is seeded.
    #[serde(default)]
    pub session: SessionConfig,

    /// Mapping from keys to response codes, used by interactive front ends.
    #[serde(default)]
    pub input: InputConfig,
}

/// Task parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Number of placeholder locations (alphabet size).
    #[serde(default = "default_locations")]
    pub locations: usize,

    /// Length of the context that determines the next location.
    #[serde(default = "default_conditional_order")]
    pub conditional_order: usize,

    #[serde(default = "default_trials_per_block")]
    pub trials_per_block: usize,

    #[serde(default = "default_blocks")]
    pub blocks: usize,

    /// Stimulus onset asynchrony: the pause between a response and the next
    /// stimulus, in milliseconds.
    #[serde(default = "default_soa_ms")]
    pub soa_ms: u64,

    /// Probability that a trial follows the regular sequence.
    #[serde(default = "default_p_regular")]
    pub p_regular: f64,
}

/// Sequence source.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// Build a fresh random pair for every session. When false, `regular` and
    /// `irregular` are used as given.
    #[serde(default = "default_true")]
    pub auto_generate: bool,

    /// Flip a fair coin to decide which of the two sequences is the regular one.
    #[serde(default = "default_true")]
    pub randomize_roles: bool,

    #[serde(default = "default_regular")]
    pub regular: Vec<u8>,

    #[serde(default = "default_irregular")]
    pub irregular: Vec<u8>,

    /// Full construction attempts per sequence.
    #[serde(default = "default_max_build_attempts")]
    pub max_build_attempts: usize,

    /// Second sequences tried against one first sequence.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Times both sequences are rebuilt before giving up.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

/// Output and seeding.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Directory that receives `result_<id>_<timestamp>.txt` files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Fixed seed for reproducible sessions. Drawn from entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Key mapping for interactive front ends.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// One key per location, left to right. The key's index is the response code.
    #[serde(default = "default_response_keys")]
    pub response_keys: Vec<char>,
}

// --- Default value functions for serde ---

fn default_locations() -> usize {
    4
}

fn default_conditional_order() -> usize {
    2
}

fn default_trials_per_block() -> usize {
    120
}

fn default_blocks() -> usize {
    8
}

fn default_soa_ms() -> u64 {
    250
}

fn default_p_regular() -> f64 {
    0.85
}

fn default_true() -> bool {
    true
}

fn default_regular() -> Vec<u8> {
    vec![0, 1, 0, 3, 2, 1, 3, 0, 2, 3, 1, 2]
}

fn default_irregular() -> Vec<u8> {
    vec![2, 0, 3, 1, 0, 2, 1, 2, 3, 0, 1, 3]
}

fn default_max_build_attempts() -> usize {
    crate::components::builder::DEFAULT_MAX_ATTEMPTS
}

fn default_max_candidates() -> usize {
    PairPolicy::default().max_candidates
}

fn default_max_rounds() -> usize {
    PairPolicy::default().max_rounds
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_response_keys() -> Vec<char> {
    vec!['c', 'v', 'b', 'n']
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            conditional_order: default_conditional_order(),
            trials_per_block: default_trials_per_block(),
            blocks: default_blocks(),
            soa_ms: default_soa_ms(),
            p_regular: default_p_regular(),
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            auto_generate: true,
            randomize_roles: true,
            regular: default_regular(),
            irregular: default_irregular(),
            max_build_attempts: default_max_build_attempts(),
            max_candidates: default_max_candidates(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            seed: None,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            response_keys: default_response_keys(),
        }
    }
}

impl SrttConfig {
    /// Loads the configuration from an optional TOML file and `SRTT__*`
    /// environment variables, on top of the defaults, and validates it.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: SrttConfig = builder
            .add_source(
                config::Environment::with_prefix("SRTT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration sources")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that cannot be expressed by types alone.
    pub fn validate(&self) -> Result<(), SrttError> {
        let task = &self.task;
        if task.locations < 2 || task.locations > 10 {
            return Err(invalid(format!(
                "locations must be between 2 and 10, got {}",
                task.locations
            )));
        }
        // Construction only realizes pairwise transitions: with a longer
        // context, mixing the two sequences produces contexts that neither
        // sequence contains.
        if !(1..=2).contains(&task.conditional_order) {
            return Err(invalid(format!(
                "conditional_order must be 1 or 2, got {}",
                task.conditional_order
            )));
        }
        self.schedule().check()?;

        let keys = &self.input.response_keys;
        if keys.len() != task.locations {
            return Err(invalid(format!(
                "expected {} response keys, got {}",
                task.locations,
                keys.len()
            )));
        }
        let distinct: HashSet<char> = keys.iter().map(|k| k.to_ascii_lowercase()).collect();
        if distinct.len() != keys.len() {
            return Err(invalid("response keys must be distinct".to_string()));
        }

        if !self.sequences.auto_generate {
            self.configured_pair()?;
        }
        Ok(())
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            trials_per_block: self.task.trials_per_block,
            blocks: self.task.blocks,
            p_regular: self.task.p_regular,
        }
    }

    pub fn soa(&self) -> Duration {
        Duration::from_millis(self.task.soa_ms)
    }

    pub fn builder(&self) -> Result<SequenceBuilder, SrttError> {
        Ok(
            SequenceBuilder::new(self.task.locations, self.task.conditional_order)?
                .with_max_attempts(self.sequences.max_build_attempts),
        )
    }

    pub fn pair_policy(&self) -> PairPolicy {
        PairPolicy {
            max_candidates: self.sequences.max_candidates,
            max_rounds: self.sequences.max_rounds,
        }
    }

    /// The pair given in the configuration file, validated.
    pub fn configured_pair(&self) -> Result<SequencePair, SrttError> {
        let expected = self.builder()?.sequence_len();
        let parse = |digits: &[u8]| -> Result<CyclicSequence, SrttError> {
            if digits.len() != expected {
                return Err(invalid(format!(
                    "configured sequences need {expected} items, got {}",
                    digits.len()
                )));
            }
            CyclicSequence::new(
                digits.iter().copied().map(Location).collect(),
                self.task.locations,
                self.task.conditional_order,
            )
        };
        SequencePair::new(
            parse(&self.sequences.regular)?,
            parse(&self.sequences.irregular)?,
        )
    }

    /// The response code bound to `key`, if any.
    pub fn response_for_key(&self, key: char) -> Option<ResponseCode> {
        self.input
            .response_keys
            .iter()
            .position(|&k| k.eq_ignore_ascii_case(&key))
            .map(|index| ResponseCode(index as u8))
    }
}

fn invalid(message: String) -> SrttError {
    SrttError::InvalidParameters(message)
}
