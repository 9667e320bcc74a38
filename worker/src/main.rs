use anyhow::Result;
use crates::domain::repositories::checkout_sweep::CheckoutSweepRepository;
use crates::infra::db::{
    postgres::postgres_connection::{self, PoolSettings},
    repositories::checkout_sweep::CheckoutSweepPostgres,
};
use std::sync::Arc;
use tracing::{error, info};
use worker::{
    axum_http, config, services,
    usecases::expire_pending_checkouts::ExpirePendingCheckoutsUseCase,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:?}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        PoolSettings {
            max_size: 4,
            ..PoolSettings::default()
        },
    )?;
    info!("Postgres connection has been established");

    let sweep_repository: Arc<dyn CheckoutSweepRepository + Send + Sync> =
        Arc::new(CheckoutSweepPostgres::new(Arc::new(postgres_pool)));
    let sweep_usecase = Arc::new(ExpirePendingCheckoutsUseCase::new(sweep_repository));

    let sweep_loop = tokio::spawn(services::sweep_loop::run_sweep_loop(
        Arc::clone(&sweep_usecase),
        dotenvy_env.sweep.clone(),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let sweep_server =
        tokio::spawn(async move { axum_http::http_serve::start(server_config, sweep_usecase).await });

    tokio::select! {
        result = sweep_loop => result??,
        result = sweep_server => result??,
    };
    Ok(())
}
