use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Balance bucket a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKey {
    Credit,
    TextSnap,
    EquationSnap,
}

impl LedgerKey {
    pub const ALL: [LedgerKey; 3] = [
        LedgerKey::Credit,
        LedgerKey::TextSnap,
        LedgerKey::EquationSnap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKey::Credit => "credit",
            LedgerKey::TextSnap => "text_snap",
            LedgerKey::EquationSnap => "equation_snap",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(LedgerKey::Credit),
            "text_snap" => Some(LedgerKey::TextSnap),
            "equation_snap" => Some(LedgerKey::EquationSnap),
            _ => None,
        }
    }
}

impl Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
