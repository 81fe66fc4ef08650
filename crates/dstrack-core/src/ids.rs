//! Run and experiment identifiers.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, TrackError};

/// Identifier of an experiment inside the metadata index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(i64);

impl ExperimentId {
    /// The experiment every store is created with.
    pub const DEFAULT: ExperimentId = ExperimentId(0);

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32 lowercase hex characters drawn from 16 random bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Draws a fresh identifier from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == 32
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(TrackError::Store(
                ErrorInfo::new("store.run_id", "run id must be 32 lowercase hex characters")
                    .with_context("run_id", s),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RunId {
    type Error = TrackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RunId> for String {
    fn from(value: RunId) -> Self {
        value.0
    }
}

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brisk", "calm", "clever", "crisp", "dapper", "eager", "fleet", "gentle",
    "glossy", "honest", "keen", "lucid", "mellow", "nimble", "placid", "quiet", "rustic",
    "sleek", "steady", "sunny", "tidy", "vivid", "wry",
];

const NOUNS: &[&str] = &[
    "badger", "bison", "crane", "dingo", "egret", "ferret", "finch", "gecko", "heron", "ibis",
    "jackal", "koala", "lark", "lemur", "marten", "newt", "otter", "panda", "quail", "raven",
    "shrew", "stoat", "tapir", "vole", "wren",
];

/// Generates a human friendly run name of the form `adjective-noun-n`.
pub fn generate_run_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(rng).copied().unwrap_or("run");
    let suffix: u16 = rng.gen_range(0..1000);
    format!("{adjective}-{noun}-{suffix}")
}
