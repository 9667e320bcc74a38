use std::{collections::HashMap, sync::Arc};

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use crates::{
    domain::repositories::{
        coupons::CouponValidator, payment_gateway::PaymentGateway, payments::PaymentRepository,
        subscriptions::SubscriptionRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            coupons::CouponPostgres, payments::PaymentPostgres,
            subscriptions::SubscriptionPostgres,
        },
    },
    payments::zarinpal_gateway::ZarinpalGateway,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    usecases::payment_callback::{PaymentCallbackUseCase, ResultPages, SuccessPage},
};

const DEFAULT_FAILURE_MESSAGE: &str = "the payment was not completed";

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    payment_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct FailureQuery {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FailureBody {
    pub success: bool,
    pub message: String,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    gateway: Arc<ZarinpalGateway>,
) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let payment_repository = PaymentPostgres::new(Arc::clone(&db_pool));
    let coupon_repository = CouponPostgres::new(Arc::clone(&db_pool));

    let callback_usecase = PaymentCallbackUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(payment_repository),
        Arc::new(coupon_repository),
        gateway,
        ResultPages {
            success_url: config.result_pages.success_url.clone(),
            failure_url: config.result_pages.failure_url.clone(),
        },
    );

    router(Arc::new(callback_usecase))
}

pub fn router<S, Pay, C, G>(callback_usecase: Arc<PaymentCallbackUseCase<S, Pay, C, G>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/callback",
            get(callback_get::<S, Pay, C, G>).post(callback_post::<S, Pay, C, G>),
        )
        .route("/success", get(success::<S, Pay, C, G>))
        .route("/failure", get(failure))
        .with_state(callback_usecase)
}

pub async fn callback_get<S, Pay, C, G>(
    State(callback_usecase): State<Arc<PaymentCallbackUseCase<S, Pay, C, G>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let outcome = callback_usecase.reconcile(&params).await;
    Redirect::to(outcome.redirect_url())
}

/// Some gateways post the result as a form; query parameters from our own callback url still apply.
pub async fn callback_post<S, Pay, C, G>(
    State(callback_usecase): State<Arc<PaymentCallbackUseCase<S, Pay, C, G>>>,
    Query(mut params): Query<HashMap<String, String>>,
    Form(form): Form<HashMap<String, String>>,
) -> Redirect
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    for (key, value) in form {
        params.entry(key).or_insert(value);
    }

    let outcome = callback_usecase.reconcile(&params).await;
    Redirect::to(outcome.redirect_url())
}

pub async fn success<S, Pay, C, G>(
    State(callback_usecase): State<Arc<PaymentCallbackUseCase<S, Pay, C, G>>>,
    Query(query): Query<SuccessQuery>,
) -> Result<Response, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let page = callback_usecase
        .success_page(query.payment_id, query.subscription_id)
        .await?;

    match page {
        SuccessPage::DeepLink(url) => {
            info!(payment_id = ?query.payment_id, "payments: returning to app");
            Ok(Redirect::to(&url).into_response())
        }
        SuccessPage::Summary(summary) => Ok(Json(summary).into_response()),
    }
}

pub async fn failure(Query(query): Query<FailureQuery>) -> Json<FailureBody> {
    let message = query
        .message
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());

    Json(FailureBody {
        success: false,
        message,
    })
}
