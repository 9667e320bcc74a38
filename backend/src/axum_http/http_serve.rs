use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::repositories::payments::PaymentRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::payments::PaymentPostgres,
    },
    payments::{
        zarinpal_client::{ZarinpalApi, ZarinpalClient, ZarinpalConfig},
        zarinpal_gateway::ZarinpalGateway,
    },
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

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let gateway = Arc::new(zarinpal_gateway(&config, Arc::clone(&db_pool))?);

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/checkout",
            routers::checkout::routes(
                Arc::clone(&db_pool),
                Arc::clone(&config),
                Arc::clone(&gateway),
            ),
        )
        .nest(
            "/payment",
            routers::payments::routes(
                Arc::clone(&db_pool),
                Arc::clone(&config),
                Arc::clone(&gateway),
            ),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn zarinpal_gateway(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<ZarinpalGateway> {
    let client = ZarinpalClient::new(ZarinpalConfig {
        merchant_id: config.gateway.merchant_id.clone(),
        api_base: config.gateway.api_base.clone(),
        start_pay_base: config.gateway.start_pay_base.clone(),
        timeout: Duration::from_secs(config.gateway.timeout_seconds),
    })?;

    let api: Arc<dyn ZarinpalApi + Send + Sync> = Arc::new(client);
    let payments: Arc<dyn PaymentRepository + Send + Sync> =
        Arc::new(PaymentPostgres::new(db_pool));

    Ok(ZarinpalGateway::new(
        api,
        payments,
        config.gateway.callback_url.clone(),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = ?err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = ?err, "Failed to install SIGTERM handler");
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
