use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whitelist/blacklist pair governing scoring.
///
/// The serialized shape matches the remote ruleset document:
/// `{ "whiteList": [..], "blackList": [{ "pattern": .., "points": .. }] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(rename = "whiteList", default)]
    pub whitelist: Vec<String>,
    #[serde(rename = "blackList", default)]
    pub blacklist: Vec<BlacklistEntry>,
}

/// A blacklist rule pairing matchable text with a point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    #[serde(rename = "pattern")]
    pub text: String,
    #[serde(default)]
    pub points: f64,
}

/// Which of the two ruleset lists an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl ListKind {
    pub fn label(self) -> &'static str {
        match self {
            ListKind::Whitelist => "whitelist",
            ListKind::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when an edit names a list other than `whitelist` or `blacklist`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid list kind '{0}': expected 'whitelist' or 'blacklist'")]
pub struct InvalidListKind(pub String);

impl FromStr for ListKind {
    type Err = InvalidListKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "whitelist" => Ok(ListKind::Whitelist),
            "blacklist" => Ok(ListKind::Blacklist),
            other => Err(InvalidListKind(other.to_string())),
        }
    }
}

impl Ruleset {
    pub fn new(whitelist: Vec<String>, blacklist: Vec<BlacklistEntry>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    pub fn add_whitelist_entry(&mut self, text: impl Into<String>) {
        self.whitelist.push(text.into());
    }

    /// Appends a blacklist rule; a missing point value counts as zero.
    pub fn add_blacklist_entry(&mut self, text: impl Into<String>, points: Option<f64>) {
        self.blacklist.push(BlacklistEntry {
            text: text.into(),
            points: points.unwrap_or_default(),
        });
    }

    /// Routes an edit to the matching list. `points` is ignored for whitelist edits.
    pub fn modify_pattern(&mut self, list: ListKind, text: impl Into<String>, points: Option<f64>) {
        match list {
            ListKind::Whitelist => self.add_whitelist_entry(text),
            ListKind::Blacklist => self.add_blacklist_entry(text, points),
        }
    }
}
