use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use crates::{
    domain::{
        repositories::{
            coupons::CouponValidator, payment_gateway::PaymentGateway,
            payments::PaymentRepository, plans::PlanRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            checkout::{CheckoutPageQuery, CheckoutRequest},
            priced_offers::PricedOffer,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            coupons::CouponPostgres, payments::PaymentPostgres, plans::PlanPostgres,
            subscriptions::SubscriptionPostgres,
        },
    },
    payments::zarinpal_gateway::ZarinpalGateway,
};
use serde::Serialize;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, CheckoutFailure},
    config::config_model::DotEnvyConfig,
    usecases::{
        checkout::{CheckoutOutcome, CheckoutSettings, CheckoutUseCase},
        in_flight::InFlightCheckouts,
        price_calculator::PriceCalculator,
    },
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    gateway: Arc<ZarinpalGateway>,
) -> Router {
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let payment_repository = PaymentPostgres::new(Arc::clone(&db_pool));
    let coupon_repository = CouponPostgres::new(Arc::clone(&db_pool));

    let price_calculator = PriceCalculator::new(
        Arc::new(coupon_repository),
        Duration::from_secs(config.checkout.coupon_timeout_seconds),
    );
    let checkout_usecase = CheckoutUseCase::new(
        Arc::new(plan_repository),
        Arc::new(subscription_repository),
        Arc::new(payment_repository),
        price_calculator,
        gateway,
        Arc::new(InFlightCheckouts::new()),
        CheckoutSettings {
            success_url: config.result_pages.success_url.clone(),
            gateway_timeout: Duration::from_secs(config.gateway.timeout_seconds),
        },
    );

    router(Arc::new(checkout_usecase))
}

pub fn router<P, S, Pay, C, G>(checkout_usecase: Arc<CheckoutUseCase<P, S, Pay, C, G>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            get(checkout_page::<P, S, Pay, C, G>).post(submit_checkout::<P, S, Pay, C, G>),
        )
        .with_state(checkout_usecase)
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutResponse {
    Preview { offer: PricedOffer },
    Redirect { redirect_url: String },
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(value: CheckoutOutcome) -> Self {
        match value {
            CheckoutOutcome::Preview(offer) => CheckoutResponse::Preview { offer },
            CheckoutOutcome::Completed { redirect_url, .. }
            | CheckoutOutcome::GatewayRedirect { redirect_url, .. } => {
                CheckoutResponse::Redirect { redirect_url }
            }
        }
    }
}

pub async fn checkout_page<P, S, Pay, C, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<P, S, Pay, C, G>>>,
    Query(query): Query<CheckoutPageQuery>,
) -> Response
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match checkout_usecase.checkout_page(query).await {
        Ok(page) => Json(page).into_response(),
        Err(err) => AppError::Internal(err.into()).into_response(),
    }
}

pub async fn submit_checkout<P, S, Pay, C, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<P, S, Pay, C, G>>>,
    auth: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Response
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match checkout_usecase.submit(auth.user_id, &request).await {
        Ok(outcome) => Json(CheckoutResponse::from(outcome)).into_response(),
        Err(error) => CheckoutFailure {
            error,
            input: request,
        }
        .into_response(),
    }
}
