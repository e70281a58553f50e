use serde::{Deserialize, Serialize};

/// Verified bearer token contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub disabled: bool,
}

impl IdentityUser {
    pub fn email_matches(&self, claimed: &str) -> bool {
        match self.email.as_deref() {
            Some(email) => email.trim().eq_ignore_ascii_case(claimed.trim()),
            None => false,
        }
    }
}
