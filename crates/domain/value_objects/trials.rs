use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{credits::CreditBalances, enums::trial_statuses::TrialStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateTrialModel {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialActivationDto {
    pub status: TrialStatus,
    pub expired_at: DateTime<Utc>,
}

/// Length of a trial and what it grants.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSettings {
    pub period: Duration,
    pub grants: CreditBalances,
}
