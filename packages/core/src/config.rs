//! Engine configuration.
//!
//! All settings have defaults matching the STAC annotation conventions, so
//! `Config::default()` is enough for STAC-style documents. A JSON file may
//! override any subset of fields:
//!
//! ```json
//! {
//!   "ranks": { "dialogue": -4, "turn": -3, "edu": -2, "token": -1 },
//!   "checks": { "connectivity": false }
//! }
//! ```
//!
//! | Field | Default | Meaning |
//! |-------|---------|---------|
//! | `ranks` | STAC table | type string → nesting rank (outermost most negative) |
//! | `group_rank` | outermost rank | rank of the top-level grouping annotations |
//! | `checks.misalignment` | `true` | flag spans with non-whitespace just outside them |
//! | `checks.features` | `true` | audit missing / unexpected / FIXME features |
//! | `checks.connectivity` | `true` | flag units with no incoming relation |
//! | `checks.turn_prefix` | `^\s*\d+\s*:[^:]*:\s*` | regex for the `NNN : speaker :` turn prefix |
//! | `checks.backwards_whitelist` | `["Conditional"]` | outgoing labels that count as connected |
//! | `checks.acknowledgement` | `true` | flag acknowledgements of a speaker's own units |
//! | `checks.acknowledgement_label` | `"Acknowledgement"` | relation label the check applies to |
//! | `checks.speaker_feature` | `"Emitter"` | turn feature naming the speaker |

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::UnitKind;

/// Errors returned while loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid turn prefix pattern: {0}")]
    BadPattern(#[from] regex::Error),

    #[error("rank for type {0:?} must be non-zero; rank 0 means \"not placed\"")]
    ZeroRank(String),
}

/// Caller-supplied nesting order over annotation types.
///
/// The outermost type has the most negative rank. Types missing from the
/// table get rank 0 and are left out of the enclosure forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable {
    ranks: BTreeMap<String, i32>,
}

impl RankTable {
    /// An empty table: nothing is ranked.
    pub fn new() -> Self {
        Self {
            ranks: BTreeMap::new(),
        }
    }

    /// The STAC hierarchy: dialogue > turn > EDU > token.
    pub fn stac() -> Self {
        let mut table = Self::new()
            .with(UnitKind::Dialogue.name(), -4)
            .with(UnitKind::Turn.name(), -3)
            .with(UnitKind::Token.name(), -1);
        for name in UnitKind::segment_names() {
            table = table.with(name, -2);
        }
        table
    }

    pub fn with(mut self, type_name: impl Into<String>, rank: i32) -> Self {
        self.ranks.insert(type_name.into(), rank);
        self
    }

    /// Rank of `type_name`; 0 when the type is not in the table.
    pub fn rank(&self, type_name: &str) -> i32 {
        self.ranks.get(type_name).copied().unwrap_or(0)
    }

    /// The most negative rank in the table.
    pub fn outermost(&self) -> Option<i32> {
        self.ranks.values().copied().filter(|r| *r != 0).min()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.ranks.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::stac()
    }
}

/// Which optional checks run, and their parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checks {
    pub misalignment: bool,
    pub features: bool,
    pub connectivity: bool,
    pub turn_prefix: String,
    pub backwards_whitelist: Vec<String>,
    pub acknowledgement: bool,
    pub acknowledgement_label: String,
    pub speaker_feature: String,
}

impl Default for Checks {
    fn default() -> Self {
        Self {
            misalignment: true,
            features: true,
            connectivity: true,
            turn_prefix: r"^\s*\d+\s*:[^:]*:\s*".into(),
            backwards_whitelist: vec!["Conditional".into()],
            acknowledgement: true,
            acknowledgement_label: "Acknowledgement".into(),
            speaker_feature: "Emitter".into(),
        }
    }
}

/// Expected features per rough type: `EDU`, `relation`, or the annotation
/// or schema type itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureRules {
    pub expected: BTreeMap<String, BTreeSet<String>>,
    /// Features never reported as unexpected.
    pub ignored: BTreeSet<String>,
    /// Lower-cased EDU texts exempt from the missing-feature check.
    pub text_whitelist: BTreeSet<String>,
}

impl Default for FeatureRules {
    fn default() -> Self {
        let set = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        let mut expected = BTreeMap::new();
        expected.insert("EDU".to_string(), set(&["Addressee", "Surface_act"]));
        expected.insert("relation".to_string(), set(&["Argument_scope"]));
        expected.insert(
            "Resource".to_string(),
            set(&["Status", "Quantity", "Correctness", "Kind"]),
        );
        expected.insert("Preference".to_string(), BTreeSet::new());
        expected.insert("Several_resources".to_string(), set(&["Operator"]));
        expected.insert("Complex_discourse_unit".to_string(), BTreeSet::new());
        Self {
            expected,
            ignored: set(&["Comments", "highlight"]),
            text_whitelist: set(&[":)", ":p", ":d", ":o", ":/", ":(", "^_^", "...", "lol"]),
        }
    }
}

/// Everything the document pipeline needs besides the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ranks: RankTable,
    pub group_rank: Option<i32>,
    pub checks: Checks,
    pub features: FeatureRules,
}

impl Config {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((name, _)) = self.ranks.iter().find(|(_, r)| *r == 0) {
            return Err(ConfigError::ZeroRank(name.to_string()));
        }
        self.turn_prefix()?;
        Ok(())
    }

    /// Rank of the annotations that delimit top-level groups.
    pub fn group_rank(&self) -> Option<i32> {
        self.group_rank.or_else(|| self.ranks.outermost())
    }

    pub fn turn_prefix(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.checks.turn_prefix)
    }
}

// --- tests -------------------------------------------------------------------
