use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use backend::services::{app_services, code_purge};
use crates::infra::db::postgres::postgres_connection;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:?}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = Arc::new(config_loader::load()?);
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let services = Arc::new(app_services::build(&dotenvy_env, Arc::new(postgres_pool)).await?);
    info!(
        plan_model = %dotenvy_env.entitlements.plan_model,
        "Services have been built"
    );

    tokio::spawn(code_purge::run(
        Arc::clone(&services.verification),
        code_purge::PURGE_INTERVAL,
    ));

    http_serve::start(dotenvy_env, services).await?;

    Ok(())
}
