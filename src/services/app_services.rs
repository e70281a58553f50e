use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use crates::{
    domain::{
        repositories::{
            entitlements::EntitlementRepository, equation_ocr::EquationOcrProvider,
            llm_gateway::LlmGateway, notifications::NotificationSender,
            rate_limits::RateLimitRepository, trials::TrialRepository,
            verification_codes::VerificationCodeRepository, vision::VisionProvider,
        },
        value_objects::{
            catalog::StorePackageCatalog,
            credits::CreditBalances,
            enums::{ledger_keys::LedgerKey, plan_models::PlanModel},
            pricing::PricingTable,
            trials::TrialSettings,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            entitlements::EntitlementPostgres, rate_limits::RateLimitPostgres,
            trials::TrialPostgres, verification_codes::VerificationCodePostgres,
        },
    },
    providers::{
        firebase::{FirebaseIdentityProvider, ServiceAccountKey},
        google_vision::GoogleVisionClient,
        mathpix::MathpixClient,
        open_router::{OpenRouterClient, OpenRouterSettings},
        smtp_mailer::{SmtpMailer, SmtpSettings},
    },
};
use tracing::info;

use crate::{
    auth::SharedIdentity,
    config::config_model::{DotEnvyConfig, Entitlements},
    usecases::{
        accounts::AccountUseCase,
        entitlements::EntitlementEngine,
        gateway::{RequestGateway, StreamSettings},
        trials::TrialUseCase,
        verification_codes::{VerificationCodeUseCase, VerificationSettings},
    },
};

/// Use cases and shared handles the routers are built from.
pub struct AppServices {
    pub identity: SharedIdentity,
    pub entitlements: Arc<EntitlementEngine>,
    pub trials: Arc<TrialUseCase>,
    pub verification: Arc<VerificationCodeUseCase>,
    pub gateway: Arc<RequestGateway>,
    pub accounts: Arc<AccountUseCase>,
}

pub async fn build(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<AppServices> {
    let identity = firebase_identity(config).await?;

    let catalog = Arc::new(load_catalog(config).await?);
    info!(
        plans = catalog.plan_count(),
        packages = catalog.package_count(),
        "Store catalog has been loaded"
    );

    let pricing = Arc::new(PricingTable::new(
        config.entitlements.plan_model,
        &config.entitlements.prices,
    ));

    let notifier: Arc<dyn NotificationSender + Send + Sync> =
        Arc::new(SmtpMailer::new(SmtpSettings {
            host: config.smtp.host.clone(),
            port: config.smtp.port,
            username: config.smtp.username.clone(),
            password: config.smtp.password.clone(),
            from: config.smtp.from.clone(),
        })?);

    let entitlement_repo: Arc<dyn EntitlementRepository + Send + Sync> =
        Arc::new(EntitlementPostgres::new(Arc::clone(&db_pool)));
    let trial_repo: Arc<dyn TrialRepository + Send + Sync> =
        Arc::new(TrialPostgres::new(Arc::clone(&db_pool)));
    let code_repo: Arc<dyn VerificationCodeRepository + Send + Sync> =
        Arc::new(VerificationCodePostgres::new(Arc::clone(&db_pool)));
    let rate_limit_repo: Arc<dyn RateLimitRepository + Send + Sync> =
        Arc::new(RateLimitPostgres::new(Arc::clone(&db_pool)));

    let vision: Arc<dyn VisionProvider + Send + Sync> = Arc::new(GoogleVisionClient::new(
        config.vision.api_key.clone(),
        config.vision.base_url.clone(),
    ));
    let equation_ocr: Arc<dyn EquationOcrProvider + Send + Sync> = Arc::new(MathpixClient::new(
        config.mathpix.app_id.clone(),
        config.mathpix.app_key.clone(),
        config.mathpix.base_url.clone(),
    ));
    let llm: Arc<dyn LlmGateway + Send + Sync> =
        Arc::new(OpenRouterClient::new(OpenRouterSettings {
            api_key: config.open_router.api_key.clone(),
            base_url: config.open_router.base_url.clone(),
            referer: config.open_router.referer.clone(),
            title: config.open_router.title.clone(),
        })?);

    let entitlements = Arc::new(EntitlementEngine::new(
        entitlement_repo,
        Arc::clone(&identity),
        Arc::clone(&notifier),
        catalog,
        pricing,
    ));

    let trials = Arc::new(TrialUseCase::new(
        trial_repo,
        Arc::clone(&identity),
        Arc::clone(&entitlements),
        trial_settings(&config.entitlements),
    ));

    let verification = Arc::new(VerificationCodeUseCase::new(
        code_repo,
        rate_limit_repo,
        Arc::clone(&identity),
        notifier,
        VerificationSettings {
            code_ttl: Duration::seconds(config.verification.code_ttl_secs),
            email_limit: config.verification.email_limit,
            ip_limit: config.verification.ip_limit,
        },
    ));

    let gateway = Arc::new(RequestGateway::new(
        Arc::clone(&entitlements),
        vision,
        equation_ocr,
        llm,
        StreamSettings {
            idle_timeout: std::time::Duration::from_secs(
                config.open_router.stream_idle_timeout_secs,
            ),
            ..StreamSettings::default()
        },
    ));

    let accounts = Arc::new(AccountUseCase::new(
        Arc::clone(&entitlements),
        Arc::clone(&trials),
        Arc::clone(&identity),
    ));

    Ok(AppServices {
        identity,
        entitlements,
        trials,
        verification,
        gateway,
        accounts,
    })
}

async fn firebase_identity(config: &DotEnvyConfig) -> Result<SharedIdentity> {
    let raw = tokio::fs::read_to_string(&config.firebase.credentials_path)
        .await
        .with_context(|| {
            format!(
                "failed to read firebase credentials at {}",
                config.firebase.credentials_path
            )
        })?;
    let service_account = ServiceAccountKey::from_json(&raw)?;

    let project_id = config
        .firebase
        .project_id
        .clone()
        .or_else(|| service_account.project_id.clone())
        .context("FIREBASE_PROJECT_ID is not set and the service account has no project_id")?;

    info!(%project_id, "Firebase credentials have been loaded");
    let identity: SharedIdentity =
        Arc::new(FirebaseIdentityProvider::new(project_id, service_account));
    Ok(identity)
}

async fn load_catalog(config: &DotEnvyConfig) -> Result<StorePackageCatalog> {
    let paths = &config.catalog;
    let app_store = read_catalog_file(&paths.app_store_plans).await?;
    let play_store = read_catalog_file(&paths.play_store_plans).await?;
    let packages = read_catalog_file(&paths.store_packages).await?;

    StorePackageCatalog::from_json(&app_store, &play_store, &packages)
}

async fn read_catalog_file(path: &str) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read catalog file {path}"))
}

/// The trial grant follows the plan model: snap counters under `snaps`, the
/// float credit otherwise.
pub fn trial_settings(entitlements: &Entitlements) -> TrialSettings {
    let grants = match entitlements.plan_model {
        PlanModel::Snaps => CreditBalances::new()
            .with(LedgerKey::TextSnap, entitlements.trial_text_snaps)
            .with(LedgerKey::EquationSnap, entitlements.trial_equation_snaps),
        PlanModel::Credit => {
            CreditBalances::new().with(LedgerKey::Credit, entitlements.trial_credit_amount)
        }
    };

    TrialSettings {
        period: Duration::days(entitlements.trial_period_days),
        grants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::value_objects::pricing::PriceSettings;

    fn entitlements(plan_model: PlanModel) -> Entitlements {
        Entitlements {
            plan_model,
            prices: PriceSettings::default(),
            trial_period_days: 7,
            trial_credit_amount: 0.5,
            trial_text_snaps: 20.0,
            trial_equation_snaps: 5.0,
        }
    }

    #[test]
    fn credit_trial_grants_float_credit() {
        let settings = trial_settings(&entitlements(PlanModel::Credit));

        assert_eq!(settings.period, Duration::days(7));
        assert_eq!(settings.grants.get(LedgerKey::Credit), 0.5);
        assert_eq!(settings.grants.get(LedgerKey::TextSnap), 0.0);
    }

    #[test]
    fn snaps_trial_grants_counters() {
        let settings = trial_settings(&entitlements(PlanModel::Snaps));

        assert_eq!(settings.grants.get(LedgerKey::TextSnap), 20.0);
        assert_eq!(settings.grants.get(LedgerKey::EquationSnap), 5.0);
        assert_eq!(settings.grants.get(LedgerKey::Credit), 0.0);
    }

    #[test]
    fn shipped_catalog_files_parse() {
        let catalog = StorePackageCatalog::from_json(
            include_str!("../../config/appstore_plans.json"),
            include_str!("../../config/playstore_plans.json"),
            include_str!("../../config/store_packages.json"),
        )
        .unwrap();

        assert_eq!(catalog.plan_count(), 4);
        let bronze = catalog
            .package_for(crates::domain::value_objects::enums::stores::Store::AppStore, "rc_bronze")
            .unwrap();
        assert_eq!(bronze.grants.get(LedgerKey::Credit), 1.0);
    }
}
