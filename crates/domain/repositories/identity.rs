use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::identity::{IdentityClaims, IdentityUser};

/// Authentication provider: token verification and admin user operations.
#[automock]
#[async_trait]
pub trait IdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<IdentityClaims>;

    async fn get_user(&self, user_id: &str) -> Result<Option<IdentityUser>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>>;

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()>;

    async fn delete_user(&self, user_id: &str) -> Result<()>;
}
