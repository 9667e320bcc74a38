use anyhow::{Context, Result};

use super::config_model::{Database, DotEnvyConfig, Sweep, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub(crate) fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let var = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let worker_server = WorkerServer {
        port: var("SERVER_PORT_WORKER")
            .context("SERVER_PORT_WORKER is invalid")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: var("SERVER_BODY_LIMIT")
            .context("SERVER_BODY_LIMIT is invalid")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: var("SERVER_TIMEOUT")
            .context("SERVER_TIMEOUT is invalid")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: var("DATABASE_URL").context("DATABASE_URL is invalid")?,
    };

    let sweep = Sweep {
        pending_ttl_minutes: var("CHECKOUT_PENDING_TTL_MINUTES")
            .unwrap_or_else(|| "30".to_string())
            .parse::<i64>()
            .context("CHECKOUT_PENDING_TTL_MINUTES is invalid")?
            .max(1),
        interval_seconds: var("SWEEP_INTERVAL_SECONDS")
            .unwrap_or_else(|| "300".to_string())
            .parse::<u64>()
            .context("SWEEP_INTERVAL_SECONDS is invalid")?
            .max(1),
        batch_limit: var("SWEEP_BATCH_LIMIT")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0),
        internal_token: var("INTERNAL_SWEEP_TOKEN"),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        sweep,
    })
}
