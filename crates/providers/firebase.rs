use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    jwk::JwkSet,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::ensure_success;
use crate::domain::{
    repositories::identity::IdentityProvider,
    value_objects::identity::{IdentityClaims, IdentityUser},
};

const PROVIDER: &str = "firebase";
const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ADMIN_SCOPE: &str =
    "https://www.googleapis.com/auth/identitytoolkit https://www.googleapis.com/auth/cloud-platform";
const SIGNING_KEYS_TTL_SECS: i64 = 3600;
const ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Service account credentials as downloaded from the Firebase console.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid firebase service account json")
    }
}

struct SigningKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: DateTime<Utc>,
}

struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    disabled: bool,
}

impl From<AccountRecord> for IdentityUser {
    fn from(value: AccountRecord) -> Self {
        Self {
            user_id: value.local_id,
            email: value.email,
            email_verified: value.email_verified,
            disabled: value.disabled,
        }
    }
}

/// Firebase Authentication: ID tokens are checked against Google's published
/// signing keys, admin operations go through the Identity Toolkit REST API
/// with a service-account access token.
pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    project_id: String,
    service_account: ServiceAccountKey,
    signing_keys: RwLock<Option<SigningKeys>>,
    access_token: Mutex<Option<AccessToken>>,
}

impl FirebaseIdentityProvider {
    pub fn new(project_id: String, service_account: ServiceAccountKey) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id,
            service_account,
            signing_keys: RwLock::new(None),
            access_token: Mutex::new(None),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);
        validation
    }

    fn admin_url(&self, action: &str) -> String {
        format!(
            "{IDENTITY_TOOLKIT_URL}/projects/{}/accounts:{action}",
            self.project_id
        )
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cached = self.signing_keys.read().await;
            if let Some(cached) = cached.as_ref() {
                let fresh =
                    Utc::now() - cached.fetched_at < Duration::seconds(SIGNING_KEYS_TTL_SECS);
                if let Some(key) = cached.keys.get(kid).filter(|_| fresh) {
                    return Ok(key.clone());
                }
            }
        }

        let keys = self.fetch_signing_keys().await?;
        let key = keys.get(kid).cloned();

        *self.signing_keys.write().await = Some(SigningKeys {
            keys,
            fetched_at: Utc::now(),
        });

        key.ok_or_else(|| anyhow!("token signed with unknown key id"))
    }

    async fn fetch_signing_keys(&self) -> Result<HashMap<String, DecodingKey>> {
        debug!("firebase: refreshing token signing keys");
        let resp = self.http.get(JWKS_URL).send().await?;
        let resp = ensure_success(resp, PROVIDER, "fetch signing keys").await?;
        let jwks: JwkSet = resp.json().await?;

        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => warn!(%kid, error = %err, "firebase: skipping unusable signing key"),
            }
        }

        if keys.is_empty() {
            bail!("firebase published no usable signing keys");
        }

        Ok(keys)
    }

    async fn admin_access_token(&self) -> Result<String> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.token.clone());
            }
        }

        let token_uri = self
            .service_account
            .token_uri
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_URI);
        let now = Utc::now().timestamp();
        let assertion_claims = AssertionClaims {
            iss: &self.service_account.client_email,
            scope: ADMIN_SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + ACCESS_TOKEN_LIFETIME_SECS,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.service_account.private_key.as_bytes())
            .context("invalid service account private key")?;
        let assertion = encode(
            &Header::new(Algorithm::RS256),
            &assertion_claims,
            &encoding_key,
        )?;

        let resp = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, "exchange service account assertion").await?;
        let token: AccessTokenResponse = resp.json().await?;

        info!("firebase: admin access token refreshed");
        *cached = Some(AccessToken {
            token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });

        Ok(token.access_token)
    }

    async fn admin_call(&self, action: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let access_token = self.admin_access_token().await?;
        let resp = self
            .http
            .post(self.admin_url(action))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        ensure_success(resp, PROVIDER, action).await
    }

    async fn lookup(&self, body: serde_json::Value) -> Result<Option<IdentityUser>> {
        let resp = self.admin_call("lookup", body).await?;
        let lookup: LookupResponse = resp.json().await?;
        Ok(lookup.users.into_iter().next().map(IdentityUser::from))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<IdentityClaims> {
        let header = decode_header(token).context("malformed id token")?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow!("id token has no key id"))?;
        let key = self.decoding_key(&kid).await?;

        let data = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|err| anyhow!("id token validation failed: {}", err))?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            bail!("id token has an empty subject");
        }

        Ok(IdentityClaims {
            user_id: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<IdentityUser>> {
        self.lookup(json!({ "localId": [user_id] })).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>> {
        self.lookup(json!({ "email": [email] })).await
    }

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        self.admin_call(
            "update",
            json!({ "localId": user_id, "password": new_password }),
        )
        .await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.admin_call("delete", json!({ "localId": user_id }))
            .await?;
        Ok(())
    }
}
