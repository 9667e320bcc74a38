mod alerts;
mod config;
mod discord;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use alerts::{AlertLayer, AlertQueue};
use config::ObservabilityConfig;
use discord::DiscordAlertSink;

/// Installs the global subscriber for one binary (`backend`, `worker`).
/// Must run inside a tokio runtime when Discord alerts are enabled.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let mut warnings = config.warnings.clone();
    let alert_layer = match config.discord.as_ref() {
        Some(discord) => match DiscordAlertSink::new(discord.webhook_url.clone()) {
            Ok(sink) => {
                let queue = AlertQueue::spawn(sink);
                Some(
                    AlertLayer::new(queue, config.context.clone())
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
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(alert_layer)
        .try_init()?;

    for warning in &warnings {
        warn!(
            service = %config.context.service,
            stage = %config.context.stage,
            %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.context.service,
        stage = %config.context.stage,
        component = %config.context.component,
        discord_alerts = alerts_enabled,
        "observability: tracing initialized"
    );

    Ok(())
}
