use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::verification_purposes::VerificationPurpose;

pub const VERIFICATION_CODE_LENGTH: usize = 6;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Returned to the client after a code was issued. The code itself only
/// travels by email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedCodeDto {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeQuery {
    #[serde(rename = "type")]
    pub purpose: String,
    pub email: String,
    pub code: String,
}

impl VerifyCodeQuery {
    pub fn purpose(&self) -> Option<VerificationPurpose> {
        VerificationPurpose::from_str(self.purpose.trim())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestCodeQuery {
    pub recipient: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordModel {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Cheap shape check. The identity provider remains the authority on
/// whether the address exists.
pub fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

pub fn is_well_formed_code(value: &str) -> bool {
    value.len() == VERIFICATION_CODE_LENGTH && value.chars().all(|c| c.is_ascii_digit())
}
