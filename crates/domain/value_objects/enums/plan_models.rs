use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// How OCR requests are priced: against the float `credit` balance, or one
/// unit against the per-category snap counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModel {
    #[default]
    Credit,
    Snaps,
}

impl Display for PlanModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let model = match self {
            PlanModel::Credit => "credit",
            PlanModel::Snaps => "snaps",
        };
        write!(f, "{}", model)
    }
}

impl PlanModel {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "credit" | "credits" => Some(PlanModel::Credit),
            "snap" | "snaps" => Some(PlanModel::Snaps),
            _ => None,
        }
    }
}
