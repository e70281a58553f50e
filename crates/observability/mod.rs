mod config;
mod discord;
mod layer;
mod notifier;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use config::ObservabilityConfig;
use discord::DiscordSink;
use layer::AlertLayer;
use notifier::AlertDispatcher;

/// Installs the global subscriber: `RUST_LOG` filtered local-time output plus
/// optional Discord alerts. Must run inside the tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.discord.as_ref() {
        Some(discord) => match DiscordSink::new(discord.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(vec![Arc::new(sink)]);
                Some(
                    AlertLayer::new(dispatcher, config.service_context.clone(), discord.min_level)
                        .with_filter(LevelFilter::from_level(discord.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("discord alerts disabled: {err}"));
                None
            }
        },
        None => None,
    };

    let alerts_enabled = alert_layer.is_some();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %context.service_name,
            environment = %context.environment,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %context.service_name,
        environment = %context.environment,
        component = %context.component,
        discord_alerts = alerts_enabled,
        "observability: initialised"
    );

    Ok(())
}
