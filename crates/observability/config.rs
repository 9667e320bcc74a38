use std::env;

use tracing::Level;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct AlertContext {
    pub(crate) service: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct DiscordSettings {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) context: AlertContext,
    pub(crate) discord: Option<DiscordSettings>,
    /// Logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let component = component.trim().to_string();
        let context = AlertContext {
            service: non_empty("SERVICE_NAME").unwrap_or_else(|| format!("audiostory-{component}")),
            stage: non_empty("STAGE").unwrap_or_else(|| "local".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let enabled = match non_empty("DISCORD_NOTIFY_ENABLED") {
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "DISCORD_NOTIFY_ENABLED has unrecognized value {raw:?}; treating as enabled"
                ));
                true
            }),
            None => true,
        };

        let discord = match (enabled, non_empty("DISCORD_WEBHOOK_URL")) {
            (true, Some(raw)) => match Url::parse(raw.trim()) {
                Ok(webhook_url) => {
                    let min_level = match non_empty("DISCORD_NOTIFY_LEVEL") {
                        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                            warnings.push(format!(
                                "DISCORD_NOTIFY_LEVEL has unrecognized value {raw:?}; using error"
                            ));
                            Level::ERROR
                        }),
                        None => Level::ERROR,
                    };
                    Some(DiscordSettings {
                        webhook_url,
                        min_level,
                    })
                }
                Err(err) => {
                    // The URL embeds a secret; only the parse error is reported.
                    warnings.push(format!("DISCORD_WEBHOOK_URL is not a valid url ({err})"));
                    None
                }
            },
            _ => None,
        };

        Self {
            context,
            discord,
            warnings,
        }
    }
}

fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
