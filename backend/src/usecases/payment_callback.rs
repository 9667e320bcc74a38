use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{
        coupons::CouponValidator, payment_gateway::PaymentGateway, payments::PaymentRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{payment_statuses::PaymentStatus, subscription_statuses::SubscriptionStatus},
        payment_metadata::PaymentMetadata,
        payment_results::{PaymentResultDto, PaymentSummaryDto, SubscriptionSummaryDto},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    deep_links::{SuccessDeepLink, with_query},
    price_calculator::record_coupon_redemption,
};

const VERIFICATION_UNAVAILABLE: &str = "the payment could not be verified, please contact support";
const ACTIVATION_FAILED: &str = "the payment was received but the subscription could not be activated yet";

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("payment_id or subscription_id is required")]
    MissingReference,
    #[error("payment not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CallbackError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CallbackError::MissingReference => StatusCode::BAD_REQUEST,
            CallbackError::NotFound => StatusCode::NOT_FOUND,
            CallbackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultPages {
    pub success_url: String,
    pub failure_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Succeeded { payment_id: Uuid, redirect_url: String },
    Failed { message: String, redirect_url: String },
}

impl ReconcileOutcome {
    pub fn redirect_url(&self) -> &str {
        match self {
            ReconcileOutcome::Succeeded { redirect_url, .. }
            | ReconcileOutcome::Failed { redirect_url, .. } => redirect_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuccessPage {
    DeepLink(String),
    Summary(PaymentResultDto),
}

pub struct PaymentCallbackUseCase<S, Pay, C, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    payment_repo: Arc<Pay>,
    coupon_validator: Arc<C>,
    gateway: Arc<G>,
    pages: ResultPages,
}

impl<S, Pay, C, G> PaymentCallbackUseCase<S, Pay, C, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    C: CouponValidator + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        payment_repo: Arc<Pay>,
        coupon_validator: Arc<C>,
        gateway: Arc<G>,
        pages: ResultPages,
    ) -> Self {
        Self {
            subscription_repo,
            payment_repo,
            coupon_validator,
            gateway,
            pages,
        }
    }

    /// Applies a gateway callback. Safe to call any number of times for the same transaction.
    pub async fn reconcile(&self, params: &HashMap<String, String>) -> ReconcileOutcome {
        let verdict = match self.gateway.process_callback(params).await {
            Ok(verdict) => verdict,
            Err(err) => {
                error!(error = ?err, "payment_callback: gateway could not process callback");
                return self.failed(VERIFICATION_UNAVAILABLE);
            }
        };

        let payment = match (verdict.success, verdict.payment) {
            (true, Some(payment)) => payment,
            (true, None) => {
                warn!("payment_callback: success verdict without a payment");
                return self.failed(VERIFICATION_UNAVAILABLE);
            }
            (false, payment) => {
                info!(
                    payment_id = ?payment.as_ref().map(|payment| payment.id),
                    reason = %verdict.message,
                    "payment_callback: payment not successful"
                );
                return self.failed(&verdict.message);
            }
        };

        match self
            .subscription_repo
            .activate_if_pending(payment.subscription_id)
            .await
        {
            Ok(true) => {
                info!(
                    payment_id = %payment.id,
                    subscription_id = %payment.subscription_id,
                    reference = ?verdict.reference,
                    "payment_callback: subscription activated"
                );

                let metadata = PaymentMetadata::from_value(&payment.payment_metadata);
                if let Some(offer) = metadata.offer.as_ref() {
                    record_coupon_redemption(
                        self.coupon_validator.as_ref(),
                        offer,
                        payment.subscription_id,
                    )
                    .await;
                }
            }
            Ok(false) => info!(
                payment_id = %payment.id,
                subscription_id = %payment.subscription_id,
                "payment_callback: subscription already resolved; nothing to do"
            ),
            Err(err) => {
                error!(
                    payment_id = %payment.id,
                    subscription_id = %payment.subscription_id,
                    db_error = ?err,
                    "payment_callback: failed to activate subscription"
                );
                return self.failed(ACTIVATION_FAILED);
            }
        }

        ReconcileOutcome::Succeeded {
            payment_id: payment.id,
            redirect_url: with_query(
                &self.pages.success_url,
                &[("payment_id", &payment.id.to_string())],
            ),
        }
    }

    /// Result shown after a checkout. App checkouts with a completed payment get their deep link.
    pub async fn success_page(
        &self,
        payment_id: Option<Uuid>,
        subscription_id: Option<Uuid>,
    ) -> Result<SuccessPage, CallbackError> {
        match (payment_id, subscription_id) {
            (Some(payment_id), _) => self.payment_result(payment_id).await,
            (None, Some(subscription_id)) => {
                let subscription = self.load_subscription(subscription_id).await?;
                let Some(subscription) = subscription else {
                    return Err(CallbackError::NotFound);
                };

                Ok(SuccessPage::Summary(PaymentResultDto {
                    success: subscription.status == SubscriptionStatus::Active.as_str(),
                    payment: None,
                    subscription: Some(SubscriptionSummaryDto::from(subscription)),
                }))
            }
            (None, None) => Err(CallbackError::MissingReference),
        }
    }

    async fn payment_result(&self, payment_id: Uuid) -> Result<SuccessPage, CallbackError> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(|err| {
                error!(%payment_id, db_error = ?err, "payment_callback: failed to load payment");
                CallbackError::Internal(err)
            })?
            .ok_or(CallbackError::NotFound)?;

        let completed = PaymentStatus::from_str(&payment.status) == Some(PaymentStatus::Completed);
        let metadata = PaymentMetadata::from_value(&payment.payment_metadata);

        if let (true, Some(scheme)) = (completed, metadata.app_return_scheme()) {
            let link = SuccessDeepLink {
                scheme,
                subscription_id: payment.subscription_id,
                amount: payment.amount,
                transaction_id: &payment.transaction_id,
                timestamp: payment.paid_at.unwrap_or_else(Utc::now),
                episode_id: metadata.episode_id.as_deref(),
            };
            return Ok(SuccessPage::DeepLink(link.to_url()));
        }

        let subscription = self.load_subscription(payment.subscription_id).await?;

        Ok(SuccessPage::Summary(PaymentResultDto {
            success: completed,
            payment: Some(PaymentSummaryDto::from(&payment)),
            subscription: subscription.map(SubscriptionSummaryDto::from),
        }))
    }

    async fn load_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<SubscriptionEntity>, CallbackError> {
        self.subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payment_callback: failed to load subscription");
                CallbackError::Internal(err)
            })
    }

    fn failed(&self, message: &str) -> ReconcileOutcome {
        ReconcileOutcome::Failed {
            message: message.to_string(),
            redirect_url: with_query(&self.pages.failure_url, &[("message", message)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::{
        entities::payments::PaymentEntity,
        repositories::{
            coupons::MockCouponValidator, payment_gateway::MockPaymentGateway,
            payments::MockPaymentRepository, subscriptions::MockSubscriptionRepository,
        },
        value_objects::{
            coupons::CouponSummary,
            enums::{checkout_sources::CheckoutSource, discount_types::DiscountType},
            payment_gateway::CallbackVerdict,
            priced_offers::{AppliedCoupon, PricedOffer},
        },
    };
    use mockall::predicate::eq;
    use serde_json::json;

    fn payment(status: PaymentStatus, metadata: serde_json::Value) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            amount: 900_000,
            currency: "IRR".to_string(),
            status: status.as_str().to_string(),
            transaction_id: "TXN-42".to_string(),
            payment_metadata: metadata,
            gateway_reference: Some("201".to_string()),
            failure_reason: None,
            paid_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription(id: Uuid, status: SubscriptionStatus) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id,
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            plan_type: "1month".to_string(),
            status: status.as_str().to_string(),
            start_date: now,
            end_date: now + chrono::Duration::days(30),
            price: 90_000,
            currency: "IRT".to_string(),
            payment_method: "zarinpal".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    type TestUseCase = PaymentCallbackUseCase<
        MockSubscriptionRepository,
        MockPaymentRepository,
        MockCouponValidator,
        MockPaymentGateway,
    >;

    fn use_case(
        subscriptions: MockSubscriptionRepository,
        payments: MockPaymentRepository,
        gateway: MockPaymentGateway,
    ) -> TestUseCase {
        use_case_with_coupons(subscriptions, payments, MockCouponValidator::new(), gateway)
    }

    fn use_case_with_coupons(
        subscriptions: MockSubscriptionRepository,
        payments: MockPaymentRepository,
        coupons: MockCouponValidator,
        gateway: MockPaymentGateway,
    ) -> TestUseCase {
        PaymentCallbackUseCase::new(
            Arc::new(subscriptions),
            Arc::new(payments),
            Arc::new(coupons),
            Arc::new(gateway),
            ResultPages {
                success_url: "/payment/success".to_string(),
                failure_url: "/payment/failure".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn repeated_success_callback_activates_once() {
        let completed = payment(PaymentStatus::Completed, json!({}));
        let payment_id = completed.id;
        let subscription_id = completed.subscription_id;

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_process_callback()
            .times(2)
            .returning(move |_| Ok(CallbackVerdict::succeeded(completed.clone(), None)));

        let mut subscriptions = MockSubscriptionRepository::new();
        let mut activations = 0;
        subscriptions
            .expect_activate_if_pending()
            .with(eq(subscription_id))
            .times(2)
            .returning(move |_| {
                activations += 1;
                Ok(activations == 1)
            });

        let use_case = use_case(subscriptions, MockPaymentRepository::new(), gateway);
        let params = HashMap::new();

        let first = use_case.reconcile(&params).await;
        let second = use_case.reconcile(&params).await;

        let expected = ReconcileOutcome::Succeeded {
            payment_id,
            redirect_url: format!("/payment/success?payment_id={payment_id}"),
        };
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    fn offer_with_coupon(code: &str) -> PricedOffer {
        PricedOffer {
            plan_id: Uuid::new_v4(),
            plan_slug: "1month".to_string(),
            base_price: 100_000,
            discount_percentage: 10,
            discounted_price: 90_000,
            coupon: Some(AppliedCoupon {
                code: code.to_string(),
                discount_amount: 10_000,
                coupon: CouponSummary {
                    code: code.to_string(),
                    discount_type: DiscountType::Fixed,
                    discount_value: 10_000,
                },
            }),
            final_price: 80_000,
            display_currency: "IRT".to_string(),
            gateway_amount: 800_000,
            gateway_currency: "IRR".to_string(),
            conversion_multiplier: 10,
        }
    }

    #[tokio::test]
    async fn coupon_redemption_is_counted_on_first_activation_only() {
        let metadata =
            PaymentMetadata::new(CheckoutSource::Web, None, None, offer_with_coupon("SPRING"));
        let completed = payment(PaymentStatus::Completed, metadata.to_value());

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_process_callback()
            .times(2)
            .returning(move |_| Ok(CallbackVerdict::succeeded(completed.clone(), None)));

        let mut subscriptions = MockSubscriptionRepository::new();
        let mut activations = 0;
        subscriptions
            .expect_activate_if_pending()
            .times(2)
            .returning(move |_| {
                activations += 1;
                Ok(activations == 1)
            });

        let mut coupons = MockCouponValidator::new();
        coupons
            .expect_record_redemption()
            .withf(|code| code == "SPRING")
            .times(1)
            .returning(|_| Ok(true));

        let use_case =
            use_case_with_coupons(subscriptions, MockPaymentRepository::new(), coupons, gateway);
        let params = HashMap::new();

        assert!(matches!(
            use_case.reconcile(&params).await,
            ReconcileOutcome::Succeeded { .. }
        ));
        assert!(matches!(
            use_case.reconcile(&params).await,
            ReconcileOutcome::Succeeded { .. }
        ));
    }

    #[tokio::test]
    async fn redemption_failure_keeps_the_payment_successful() {
        let metadata =
            PaymentMetadata::new(CheckoutSource::Web, None, None, offer_with_coupon("SPRING"));
        let completed = payment(PaymentStatus::Completed, metadata.to_value());

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_process_callback()
            .returning(move |_| Ok(CallbackVerdict::succeeded(completed.clone(), None)));

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_activate_if_pending()
            .returning(|_| Ok(true));

        let mut coupons = MockCouponValidator::new();
        coupons
            .expect_record_redemption()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let outcome =
            use_case_with_coupons(subscriptions, MockPaymentRepository::new(), coupons, gateway)
                .reconcile(&HashMap::new())
                .await;

        assert!(matches!(outcome, ReconcileOutcome::Succeeded { .. }));
    }

    #[tokio::test]
    async fn failed_verdict_redirects_to_failure_without_mutation() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_process_callback()
            .returning(|_| Ok(CallbackVerdict::failed(None, "payment not found")));

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_activate_if_pending().never();

        let outcome = use_case(subscriptions, MockPaymentRepository::new(), gateway)
            .reconcile(&HashMap::new())
            .await;

        assert_eq!(
            outcome.redirect_url(),
            "/payment/failure?message=payment+not+found"
        );
    }

    #[tokio::test]
    async fn gateway_error_redirects_to_failure() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_process_callback()
            .returning(|_| Err(anyhow::anyhow!("database unavailable")));

        let outcome = use_case(
            MockSubscriptionRepository::new(),
            MockPaymentRepository::new(),
            gateway,
        )
        .reconcile(&HashMap::new())
        .await;

        assert!(matches!(outcome, ReconcileOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn app_payment_success_page_is_a_deep_link() {
        let completed = payment(
            PaymentStatus::Completed,
            json!({ "source": "app", "return_scheme": "audiostory", "episode_id": "ep-3" }),
        );
        let payment_id = completed.id;
        let subscription_id = completed.subscription_id;

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_id()
            .with(eq(payment_id))
            .returning(move |_| Ok(Some(completed.clone())));

        let page = use_case(MockSubscriptionRepository::new(), payments, MockPaymentGateway::new())
            .success_page(Some(payment_id), None)
            .await
            .unwrap();

        let SuccessPage::DeepLink(link) = page else {
            panic!("expected a deep link");
        };
        assert!(link.starts_with(&format!(
            "audiostory://payment/success?success=true&subscription_id={subscription_id}&amount=900000&transaction_id=TXN-42&timestamp="
        )));
        assert!(link.ends_with("&episode_id=ep-3"));
    }

    #[tokio::test]
    async fn web_payment_success_page_is_a_summary() {
        let completed = payment(PaymentStatus::Completed, json!({ "source": "web" }));
        let payment_id = completed.id;
        let subscription_id = completed.subscription_id;

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_id()
            .returning(move |_| Ok(Some(completed.clone())));
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_id()
            .with(eq(subscription_id))
            .returning(move |id| Ok(Some(subscription(id, SubscriptionStatus::Active))));

        let page = use_case(subscriptions, payments, MockPaymentGateway::new())
            .success_page(Some(payment_id), None)
            .await
            .unwrap();

        let SuccessPage::Summary(summary) = page else {
            panic!("expected a summary");
        };
        assert!(summary.success);
        assert_eq!(summary.payment.unwrap().payment_id, payment_id);
        assert_eq!(summary.subscription.unwrap().status, "active");
    }

    #[tokio::test]
    async fn success_page_needs_a_reference() {
        let err = use_case(
            MockSubscriptionRepository::new(),
            MockPaymentRepository::new(),
            MockPaymentGateway::new(),
        )
        .success_page(None, None)
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
