use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use crates::domain::value_objects::{
    enums::plan_models::PlanModel, pricing::PriceSettings, rate_limits::RateLimitPolicy,
};

use super::{
    config_model::{
        BackendServer, CatalogPaths, Database, DotEnvyConfig, Entitlements, Firebase, Mathpix,
        OpenRouter, Smtp, Verification, Vision, Webhook,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("{} is invalid", key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.required(key)?
            .parse()
            .with_context(|| format!("{} is invalid", key))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("{} is invalid", key)),
            None => Ok(default),
        }
    }

    fn rate_limit(&self, prefix: &str) -> Result<RateLimitPolicy> {
        let defaults = RateLimitPolicy::default();
        let policy = RateLimitPolicy {
            rate: self.parsed_or(&format!("{prefix}_RATE_LIMIT_RATE"), defaults.rate)?,
            burst: self.parsed_or(&format!("{prefix}_RATE_LIMIT_BURST"), defaults.burst)?,
            period: Duration::seconds(self.parsed_or(
                &format!("{prefix}_RATE_LIMIT_PERIOD_SECS"),
                defaults.period.num_seconds(),
            )?),
        };

        if policy.rate == 0 || policy.burst == 0 || policy.period <= Duration::zero() {
            return Err(anyhow!("{} rate limit must be positive", prefix));
        }

        Ok(policy)
    }
}

pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    let stage = env
        .optional("STAGE")
        .map(|raw| Stage::try_from(&raw))
        .transpose()?
        .unwrap_or_default();

    let backend_server = BackendServer {
        port: env.parsed("SERVER_PORT_BACKEND")?,
        body_limit: env.parsed("SERVER_BODY_LIMIT")?,
        timeout: env.parsed("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: env.required("DATABASE_URL")?,
        max_connections: env.parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let firebase = Firebase {
        project_id: env.optional("FIREBASE_PROJECT_ID"),
        credentials_path: env.required("FIREBASE_CREDENTIALS_PATH")?,
    };

    let webhook = Webhook {
        bearer: env.required("WEBHOOK_BEARER")?,
    };

    let vision = Vision {
        api_key: env.required("GOOGLE_VISION_API_KEY")?,
        base_url: env.optional("GOOGLE_VISION_URL"),
    };

    let mathpix = Mathpix {
        app_id: env.required("OCR_APP")?,
        app_key: env.required("OCR_KEY")?,
        base_url: env.optional("OCR_URL"),
    };

    let open_router = OpenRouter {
        api_key: env.required("OPENROUTER_API_KEY")?,
        base_url: env.optional("OPENROUTER_URL"),
        referer: env.or("OPENROUTER_REFERER", "https://lensquery.com"),
        title: env.or("OPENROUTER_TITLE", "LensQuery"),
        stream_idle_timeout_secs: env.parsed_or("LLM_STREAM_IDLE_TIMEOUT_SECS", 60)?,
    };

    let smtp_username = env.required("SMTP_USERNAME")?;
    let smtp = Smtp {
        host: env.or("SMTP_HOST", "smtp.gmail.com"),
        port: env.parsed_or("SMTP_PORT", 587)?,
        password: env.required("SMTP_PASSWORD")?,
        from: env
            .optional("SMTP_FROM")
            .unwrap_or_else(|| format!("LensQuery <{}>", smtp_username)),
        username: smtp_username,
    };

    let plan_model = match env.optional("PLAN_MODEL") {
        Some(raw) => PlanModel::from_str(&raw)
            .ok_or_else(|| anyhow!("PLAN_MODEL is invalid: {}", raw))?,
        None => PlanModel::default(),
    };

    let default_prices = PriceSettings::default();
    let text_price = env.parsed_or("FREE_TEXT_SNAP_PRICE", default_prices.text_price)?;
    let prices = PriceSettings {
        text_price,
        document_price: env.parsed_or("DOCUMENT_TEXT_PRICE", text_price)?,
        label_price: env.parsed_or("LABEL_DETECTION_PRICE", text_price)?,
        equation_price: env.parsed_or("EQUATION_TEXT_SNAP_PRICE", default_prices.equation_price)?,
        chat_min_price: env.parsed_or("CHAT_MIN_PRICE", default_prices.chat_min_price)?,
        chat_price_multiplier: env.parsed_or(
            "CHAT_PRICE_MULTIPLIER",
            default_prices.chat_price_multiplier,
        )?,
    };

    let entitlements = Entitlements {
        plan_model,
        prices,
        trial_period_days: env.parsed_or("TRIAL_PERIOD_DAYS", 7)?,
        trial_credit_amount: env.parsed_or("TRIAL_CREDIT_AMOUNT", 0.5)?,
        trial_text_snaps: env.parsed_or("TRIAL_TEXT_SNAPS", 30.0)?,
        trial_equation_snaps: env.parsed_or("TRIAL_EQUATION_SNAPS", 20.0)?,
    };

    let verification = Verification {
        code_ttl_secs: env.parsed_or("ACCOUNT_VERIFICATION_CODE_TTL", 600)?,
        email_limit: env.rate_limit("EMAIL")?,
        ip_limit: env.rate_limit("IP")?,
    };

    let catalog = CatalogPaths {
        app_store_plans: env.or("APPSTORE_PLANS_PATH", "config/appstore_plans.json"),
        play_store_plans: env.or("PLAYSTORE_PLANS_PATH", "config/playstore_plans.json"),
        store_packages: env.or("STORE_PACKAGES_PATH", "config/store_packages.json"),
    };

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        firebase,
        webhook,
        vision,
        mathpix,
        open_router,
        smtp,
        entitlements,
        verification,
        catalog,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn required_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SERVER_PORT_BACKEND", "8080"),
            ("SERVER_BODY_LIMIT", "10"),
            ("SERVER_TIMEOUT", "30"),
            ("DATABASE_URL", "postgres://localhost:5432/lensquery"),
            ("FIREBASE_CREDENTIALS_PATH", "/secrets/firebase.json"),
            ("WEBHOOK_BEARER", "hook-secret"),
            ("GOOGLE_VISION_API_KEY", "vision-key"),
            ("OCR_APP", "mathpix-app"),
            ("OCR_KEY", "mathpix-key"),
            ("OPENROUTER_API_KEY", "router-key"),
            ("SMTP_USERNAME", "mailer@lensquery.com"),
            ("SMTP_PASSWORD", "mail-secret"),
        ])
    }

    fn load_with(vars: HashMap<&'static str, &'static str>) -> Result<DotEnvyConfig> {
        load_from(|key| vars.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn defaults_apply_when_optional_values_are_absent() {
        let config = load_with(required_vars()).unwrap();

        assert_eq!(config.stage, Stage::Local);
        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.entitlements.plan_model, PlanModel::Credit);
        assert_eq!(config.entitlements.prices, PriceSettings::default());
        assert_eq!(config.entitlements.trial_period_days, 7);
        assert_eq!(config.entitlements.trial_credit_amount, 0.5);
        assert_eq!(config.verification.code_ttl_secs, 600);
        assert_eq!(config.verification.email_limit, RateLimitPolicy::default());
        assert_eq!(config.open_router.stream_idle_timeout_secs, 60);
        assert_eq!(config.smtp.from, "LensQuery <mailer@lensquery.com>");
        assert_eq!(config.catalog.app_store_plans, "config/appstore_plans.json");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = required_vars();
        vars.insert("STAGE", "production");
        vars.insert("PLAN_MODEL", "snaps");
        vars.insert("FREE_TEXT_SNAP_PRICE", "0.03");
        vars.insert("IP_RATE_LIMIT_RATE", "20");
        vars.insert("IP_RATE_LIMIT_PERIOD_SECS", "3600");

        let config = load_with(vars).unwrap();

        assert_eq!(config.stage, Stage::Production);
        assert_eq!(config.entitlements.plan_model, PlanModel::Snaps);
        assert_eq!(config.entitlements.prices.text_price, 0.03);
        assert_eq!(config.entitlements.prices.document_price, 0.03);
        assert_eq!(config.verification.ip_limit.rate, 20);
        assert_eq!(config.verification.ip_limit.period, Duration::hours(1));
        assert_eq!(config.verification.email_limit.rate, 5);
    }

    #[test]
    fn missing_or_malformed_values_fail() {
        let mut vars = required_vars();
        vars.remove("WEBHOOK_BEARER");
        let err = load_with(vars).unwrap_err();
        assert!(err.to_string().contains("WEBHOOK_BEARER"));

        let mut vars = required_vars();
        vars.insert("SERVER_PORT_BACKEND", "eighty");
        assert!(load_with(vars).is_err());

        let mut vars = required_vars();
        vars.insert("PLAN_MODEL", "tokens");
        assert!(load_with(vars).is_err());

        let mut vars = required_vars();
        vars.insert("EMAIL_RATE_LIMIT_BURST", "0");
        assert!(load_with(vars).is_err());
    }
}
