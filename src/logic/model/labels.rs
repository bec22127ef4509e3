//! Class labels
//!
//! Exactly one scheme applies per deployed artifact; the two are never mixed.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Label enumeration for a deployed model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelScheme {
    /// 0 = Safe, 1 = Phishing
    Binary,
    /// 0 = Safe, 1 = Suspicious, 2 = BitB attack
    Bitb,
}

/// Human-facing verdict for a class index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Phishing,
    Suspicious,
    BitbAttack,
}

impl Verdict {
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Safe => "Page Verified as Safe",
            Verdict::Phishing => "BitB Attack Detected",
            Verdict::Suspicious => "Suspicious Behavior Detected",
            Verdict::BitbAttack => "BitB Attack Detected",
        }
    }
}

impl LabelScheme {
    pub fn class_count(&self) -> usize {
        self.verdicts().len()
    }

    pub fn verdicts(&self) -> &'static [Verdict] {
        match self {
            LabelScheme::Binary => &[Verdict::Safe, Verdict::Phishing],
            LabelScheme::Bitb => &[Verdict::Safe, Verdict::Suspicious, Verdict::BitbAttack],
        }
    }

    /// Scheme whose width equals `classes`
    pub fn for_class_count(classes: usize) -> Option<Self> {
        match classes {
            2 => Some(LabelScheme::Binary),
            3 => Some(LabelScheme::Bitb),
            _ => None,
        }
    }

    /// `None` for indices outside the scheme
    pub fn verdict(&self, class: usize) -> Option<Verdict> {
        self.verdicts().get(class).copied()
    }
}

impl fmt::Display for LabelScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelScheme::Binary => write!(f, "binary"),
            LabelScheme::Bitb => write!(f, "bitb"),
        }
    }
}

impl FromStr for LabelScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" => Ok(LabelScheme::Binary),
            "bitb" => Ok(LabelScheme::Bitb),
            other => Err(format!("unknown label scheme '{}' (expected binary or bitb)", other)),
        }
    }
}
