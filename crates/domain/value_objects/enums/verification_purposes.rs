use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationPurpose {
    ResetPassword,
    VerifyEmail,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPurpose::ResetPassword => "RESET_PASSWORD",
            VerificationPurpose::VerifyEmail => "VERIFY_EMAIL",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "RESET_PASSWORD" => Some(VerificationPurpose::ResetPassword),
            "VERIFY_EMAIL" => Some(VerificationPurpose::VerifyEmail),
            _ => None,
        }
    }
}

impl Display for VerificationPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
