use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::Level;
use url::Url;

use super::alerts::Alert;

const DESCRIPTION_LIMIT: usize = 4000;
const FIELD_VALUE_LIMIT: usize = 1000;
const MAX_FIELDS: usize = 20;

pub(crate) struct DiscordAlertSink {
    webhook_url: Url,
    client: Client,
}

impl DiscordAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }

    pub(crate) async fn deliver(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&render(alert))
            .send()
            .await
            .map_err(|err| {
                // reqwest errors can echo the webhook url.
                if err.is_timeout() {
                    anyhow!("discord webhook timed out")
                } else {
                    anyhow!("discord webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!("discord webhook answered {}", response.status()));
        }

        Ok(())
    }
}

fn render(alert: &Alert) -> Value {
    let mut fields: Vec<Value> = alert
        .fields
        .iter()
        .take(MAX_FIELDS)
        .map(|(name, value)| {
            json!({
                "name": name,
                "value": clip(value, FIELD_VALUE_LIMIT),
                "inline": value.len() <= 40,
            })
        })
        .collect();

    if !alert.span_path.is_empty() {
        fields.push(json!({
            "name": "spans",
            "value": clip(&alert.span_path.join(" > "), FIELD_VALUE_LIMIT),
            "inline": false,
        }));
    }

    let footer = match &alert.location {
        Some(location) => format!("{} @ {}", alert.target, location),
        None => alert.target.clone(),
    };

    json!({
        "embeds": [{
            "title": format!(
                "[{}] {} {}",
                alert.context.stage, alert.context.service, alert.level
            ),
            "description": clip(&alert.message, DESCRIPTION_LIMIT),
            "color": color(alert.level),
            "timestamp": alert.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "fields": fields,
            "footer": { "text": format!("{} | {}", alert.context.component, footer) },
        }]
    })
}

fn color(level: Level) -> u32 {
    match level {
        Level::ERROR => 0xE0_3E_3E,
        Level::WARN => 0xF0_A0_20,
        _ => 0x5A_8D_EE,
    }
}

fn clip(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}
