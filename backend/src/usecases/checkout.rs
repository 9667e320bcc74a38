use std::{sync::Arc, time::Duration};

use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::{
        payments::{PaymentEntity, PendingPaymentDraft},
        plans::PlanEntity,
        subscriptions::InsertSubscriptionEntity,
    },
    repositories::{
        coupons::CouponValidator, payment_gateway::PaymentGateway, payments::PaymentRepository,
        plans::PlanRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{
        checkout::{
            CheckoutCommand, CheckoutPageDto, CheckoutPageQuery, CheckoutRequest, FieldError,
            PlanDto,
        },
        enums::{
            checkout_actions::CheckoutAction, checkout_sources::CheckoutSource,
            subscription_statuses::SubscriptionStatus,
        },
        payment_gateway::GatewayInitiation,
        payment_metadata::PaymentMetadata,
        plan_types::{PlanType, PlanTypeMapper},
        priced_offers::PricedOffer,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    deep_links::{SuccessDeepLink, with_query},
    in_flight::InFlightCheckouts,
    price_calculator::{PriceCalculator, PriceError},
};

pub const FREE_PAYMENT_METHOD: &str = "free";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{0}")]
    CouponRejected(String),
    #[error("a checkout is already in progress for this account")]
    CheckoutInProgress,
    #[error("{message}")]
    GatewayInitiation { message: String, payment_id: Uuid },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::Validation { .. } | CheckoutError::CouponRejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CheckoutError::CheckoutInProgress => StatusCode::CONFLICT,
            CheckoutError::GatewayInitiation { .. } => StatusCode::BAD_GATEWAY,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Validation { .. } => "validation_error",
            CheckoutError::CouponRejected(_) => "coupon_rejected",
            CheckoutError::CheckoutInProgress => "checkout_in_progress",
            CheckoutError::GatewayInitiation { .. } => "gateway_initiation_failed",
            CheckoutError::Internal(_) => "internal_error",
        }
    }

    /// The form field the error belongs to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CheckoutError::Validation { field, .. } => Some(field),
            CheckoutError::CouponRejected(_) => Some("coupon_code"),
            _ => None,
        }
    }

    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CheckoutError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<FieldError> for CheckoutError {
    fn from(value: FieldError) -> Self {
        CheckoutError::Validation {
            field: value.field,
            message: value.message,
        }
    }
}

impl From<PriceError> for CheckoutError {
    fn from(value: PriceError) -> Self {
        match value {
            PriceError::CouponRejected(message) => CheckoutError::CouponRejected(message),
            PriceError::Internal(err) => CheckoutError::Internal(err),
        }
    }
}

pub type CheckoutResult<T> = std::result::Result<T, CheckoutError>;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Web landing page for checkouts that complete without the gateway.
    pub success_url: String,
    pub gateway_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Preview(PricedOffer),
    /// Free checkout; the subscription is already active.
    Completed {
        subscription_id: Uuid,
        redirect_url: String,
    },
    /// Paid checkout; records stay pending until the gateway calls back.
    GatewayRedirect {
        subscription_id: Uuid,
        payment_id: Uuid,
        redirect_url: String,
    },
}

pub struct CheckoutUseCase<P, S, Pay, C, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    payment_repo: Arc<Pay>,
    price_calculator: PriceCalculator<C>,
    gateway: Arc<G>,
    in_flight: Arc<InFlightCheckouts>,
    settings: CheckoutSettings,
}

impl<P, S, Pay, C, G> CheckoutUseCase<P, S, Pay, C, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        payment_repo: Arc<Pay>,
        price_calculator: PriceCalculator<C>,
        gateway: Arc<G>,
        in_flight: Arc<InFlightCheckouts>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            plan_repo,
            subscription_repo,
            payment_repo,
            price_calculator,
            gateway,
            in_flight,
            settings,
        }
    }

    pub async fn checkout_page(&self, query: CheckoutPageQuery) -> CheckoutResult<CheckoutPageDto> {
        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "checkout: failed to list active plans");
            CheckoutError::Internal(err)
        })?;

        let selected_plan = query
            .plan_slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .and_then(|slug| select_plan(&plans, slug))
            .cloned()
            .map(PlanDto::from);

        let source = query
            .source
            .as_deref()
            .and_then(CheckoutSource::from_str)
            .unwrap_or_default();

        Ok(CheckoutPageDto {
            plans: plans.into_iter().map(PlanDto::from).collect(),
            selected_plan,
            source,
            episode_id: query
                .episode_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        })
    }

    /// Validates the submitted form and runs the requested action.
    pub async fn submit(
        &self,
        user_id: Uuid,
        request: &CheckoutRequest,
    ) -> CheckoutResult<CheckoutOutcome> {
        let command = request.validate()?;

        match command.action {
            CheckoutAction::ApplyCoupon => self
                .preview(user_id, &command)
                .await
                .map(CheckoutOutcome::Preview),
            CheckoutAction::Pay => self.commit(user_id, command).await,
        }
    }

    /// Prices the selection. Nothing is persisted.
    pub async fn preview(
        &self,
        user_id: Uuid,
        command: &CheckoutCommand,
    ) -> CheckoutResult<PricedOffer> {
        let plan = self.load_plan(command.plan_id).await?;
        let offer = self
            .price_calculator
            .price(&plan, command.coupon_code.as_deref(), user_id)
            .await?;

        info!(
            %user_id,
            plan_id = %plan.id,
            final_price = offer.final_price,
            "checkout: preview priced"
        );
        Ok(offer)
    }

    pub async fn commit(
        &self,
        user_id: Uuid,
        command: CheckoutCommand,
    ) -> CheckoutResult<CheckoutOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(user_id) else {
            warn!(%user_id, "checkout: rejected concurrent commit");
            return Err(CheckoutError::CheckoutInProgress);
        };

        let plan = self.load_plan(command.plan_id).await?;
        let offer = self
            .price_calculator
            .price(&plan, command.coupon_code.as_deref(), user_id)
            .await?;

        if offer.is_free() {
            self.complete_free(user_id, &plan, &offer, &command).await
        } else {
            self.start_paid(user_id, &plan, offer, command).await
        }
    }

    async fn load_plan(&self, plan_id: Uuid) -> CheckoutResult<PlanEntity> {
        self.plan_repo
            .find_active_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%plan_id, db_error = ?err, "checkout: failed to load plan");
                CheckoutError::Internal(err)
            })?
            .ok_or_else(|| {
                info!(%plan_id, "checkout: plan missing or inactive");
                CheckoutError::validation("plan_id", "the selected plan is not available")
            })
    }

    async fn complete_free(
        &self,
        user_id: Uuid,
        plan: &PlanEntity,
        offer: &PricedOffer,
        command: &CheckoutCommand,
    ) -> CheckoutResult<CheckoutOutcome> {
        let now = Utc::now();
        let subscription = self
            .subscription_repo
            .create(InsertSubscriptionEntity {
                user_id,
                plan_id: plan.id,
                plan_type: PlanTypeMapper::normalize(&plan.slug).as_str().to_string(),
                status: SubscriptionStatus::Active.as_str().to_string(),
                start_date: now,
                end_date: now + chrono::Duration::days(i64::from(plan.duration_days)),
                price: 0,
                currency: plan.currency.clone(),
                payment_method: FREE_PAYMENT_METHOD.to_string(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, plan_id = %plan.id, db_error = ?err, "checkout: failed to create free subscription");
                CheckoutError::Internal(err)
            })?;

        self.price_calculator
            .record_redemption(offer, subscription.id)
            .await;

        let redirect_url = match (command.source, command.return_scheme.as_deref()) {
            (CheckoutSource::App, Some(scheme)) => {
                let transaction_id = format!("FREE-{}", Uuid::new_v4().simple());
                SuccessDeepLink {
                    scheme,
                    subscription_id: subscription.id,
                    amount: 0,
                    transaction_id: &transaction_id,
                    timestamp: now,
                    episode_id: command.episode_id.as_deref(),
                }
                .to_url()
            }
            _ => with_query(
                &self.settings.success_url,
                &[("subscription_id", &subscription.id.to_string())],
            ),
        };

        info!(
            %user_id,
            subscription_id = %subscription.id,
            plan_id = %plan.id,
            source = %command.source,
            "checkout: free subscription activated"
        );

        Ok(CheckoutOutcome::Completed {
            subscription_id: subscription.id,
            redirect_url,
        })
    }

    async fn start_paid(
        &self,
        user_id: Uuid,
        plan: &PlanEntity,
        offer: PricedOffer,
        command: CheckoutCommand,
    ) -> CheckoutResult<CheckoutOutcome> {
        let now = Utc::now();
        let plan_type = PlanTypeMapper::normalize(&plan.slug);

        let subscription = InsertSubscriptionEntity {
            user_id,
            plan_id: plan.id,
            plan_type: plan_type.as_str().to_string(),
            status: SubscriptionStatus::Pending.as_str().to_string(),
            start_date: now,
            end_date: now + chrono::Duration::days(i64::from(plan.duration_days)),
            price: offer.final_price,
            currency: offer.display_currency.clone(),
            payment_method: self.gateway.provider_name().to_string(),
        };
        let draft = PendingPaymentDraft {
            user_id,
            amount: offer.gateway_amount,
            currency: offer.gateway_currency.clone(),
            transaction_id: format!("TXN-{}", Uuid::new_v4().simple()),
            payment_metadata: PaymentMetadata::new(
                command.source,
                command.return_scheme,
                command.episode_id,
                offer,
            )
            .to_value(),
        };

        let (subscription, payment) = self
            .payment_repo
            .create_pending_checkout(subscription, draft)
            .await
            .map_err(|err| {
                error!(%user_id, plan_id = %plan.id, db_error = ?err, "checkout: failed to persist pending checkout");
                CheckoutError::Internal(err)
            })?;

        info!(
            %user_id,
            subscription_id = %subscription.id,
            payment_id = %payment.id,
            transaction_id = %payment.transaction_id,
            amount = payment.amount,
            currency = %payment.currency,
            "checkout: pending checkout created"
        );

        let description = format!("{} subscription ({})", plan.name, plan_type.as_str());
        let initiation = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.initiate(&payment, &description),
        )
        .await;

        let message = match initiation {
            Ok(Ok(GatewayInitiation::Redirect {
                payment_url,
                authority,
            })) => {
                info!(
                    payment_id = %payment.id,
                    has_authority = authority.is_some(),
                    "checkout: redirecting to gateway"
                );
                return Ok(CheckoutOutcome::GatewayRedirect {
                    subscription_id: subscription.id,
                    payment_id: payment.id,
                    redirect_url: payment_url,
                });
            }
            Ok(Ok(GatewayInitiation::Rejected { message })) => message,
            Ok(Err(err)) => {
                error!(payment_id = %payment.id, error = ?err, "checkout: gateway initiation failed");
                "the payment gateway is unavailable, please try again".to_string()
            }
            Err(_) => {
                warn!(
                    payment_id = %payment.id,
                    timeout_ms = self.settings.gateway_timeout.as_millis() as u64,
                    "checkout: gateway initiation timed out"
                );
                "the payment gateway did not respond in time, please try again".to_string()
            }
        };

        self.fail_payment(&payment, &message).await;

        Err(CheckoutError::GatewayInitiation {
            message,
            payment_id: payment.id,
        })
    }

    async fn fail_payment(&self, payment: &PaymentEntity, reason: &str) {
        match self.payment_repo.mark_failed(payment.id, reason).await {
            Ok(true) => info!(payment_id = %payment.id, "checkout: payment marked failed"),
            Ok(false) => warn!(payment_id = %payment.id, "checkout: payment was no longer pending"),
            Err(err) => error!(
                payment_id = %payment.id,
                db_error = ?err,
                "checkout: failed to mark payment failed"
            ),
        }
    }
}

fn select_plan<'a>(plans: &'a [PlanEntity], slug: &str) -> Option<&'a PlanEntity> {
    if let Some(plan) = plans
        .iter()
        .find(|plan| plan.slug.eq_ignore_ascii_case(slug))
    {
        return Some(plan);
    }

    let wanted = PlanType::try_from_slug(slug).ok()?;
    plans
        .iter()
        .find(|plan| PlanType::try_from_slug(&plan.slug).ok() == Some(wanted))
}
