use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    services::app_services::AppServices,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub fn app(config: &DotEnvyConfig, services: &AppServices) -> Result<Router> {
    let body_limit: usize = (config.backend_server.body_limit * 1024 * 1024).try_into()?;

    let api = Router::new()
        .route("/healthcheck", get(default_routers::health_check))
        .nest(
            "/credit",
            routers::credits::routes(Arc::clone(&services.entitlements)),
        )
        .nest("/ocr", routers::ocr::routes(Arc::clone(&services.gateway)))
        .nest("/chat", routers::chat::routes(Arc::clone(&services.gateway)))
        .nest(
            "/account",
            routers::account::routes(
                Arc::clone(&services.verification),
                Arc::clone(&services.accounts),
            ),
        )
        .nest("/trial", routers::trial::routes(Arc::clone(&services.trials)))
        .nest(
            "/subscription",
            routers::subscriptions::routes(
                Arc::clone(&services.entitlements),
                config.webhook.bearer.clone(),
            ),
        );

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1", api)
        .layer(Extension(Arc::clone(&services.identity)))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

pub async fn start(config: Arc<DotEnvyConfig>, services: Arc<AppServices>) -> Result<()> {
    let app = app(&config, &services)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        stage = %config.stage,
        "Server is running on port {}",
        config.backend_server.port
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
