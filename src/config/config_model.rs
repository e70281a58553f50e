use crates::domain::value_objects::{
    enums::plan_models::PlanModel, pricing::PriceSettings, rate_limits::RateLimitPolicy,
};

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub firebase: Firebase,
    pub webhook: Webhook,
    pub vision: Vision,
    pub mathpix: Mathpix,
    pub open_router: OpenRouter,
    pub smtp: Smtp,
    pub entitlements: Entitlements,
    pub verification: Verification,
    pub catalog: CatalogPaths,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Firebase {
    /// Falls back to the project id inside the service account file.
    pub project_id: Option<String>,
    pub credentials_path: String,
}

#[derive(Debug, Clone)]
pub struct Webhook {
    pub bearer: String,
}

#[derive(Debug, Clone)]
pub struct Vision {
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Mathpix {
    pub app_id: String,
    pub app_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenRouter {
    pub api_key: String,
    pub base_url: Option<String>,
    pub referer: String,
    pub title: String,
    pub stream_idle_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Smtp {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Entitlements {
    pub plan_model: PlanModel,
    pub prices: PriceSettings,
    pub trial_period_days: i64,
    pub trial_credit_amount: f64,
    pub trial_text_snaps: f64,
    pub trial_equation_snaps: f64,
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub code_ttl_secs: i64,
    pub email_limit: RateLimitPolicy,
    pub ip_limit: RateLimitPolicy,
}

#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub app_store_plans: String,
    pub play_store_plans: String,
    pub store_packages: String,
}
