use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::{
    domain::{
        entities::payments::PaymentEntity,
        repositories::{payment_gateway::PaymentGateway, payments::PaymentRepository},
        value_objects::{
            enums::payment_statuses::PaymentStatus,
            payment_gateway::{CallbackVerdict, GatewayInitiation},
            payment_metadata::{AUTHORITY_KEY, PaymentMetadata},
        },
    },
    payments::zarinpal_client::{PaymentRequestBody, ZarinpalApi},
};

pub const PROVIDER_NAME: &str = "zarinpal";

const TRANSACTION_PARAM: &str = "transaction_id";
const AUTHORITY_PARAM: &str = "Authority";
const STATUS_PARAM: &str = "Status";
const STATUS_OK: &str = "OK";

pub struct ZarinpalGateway {
    api: Arc<dyn ZarinpalApi + Send + Sync>,
    payments: Arc<dyn PaymentRepository + Send + Sync>,
    callback_url: String,
}

impl ZarinpalGateway {
    pub fn new(
        api: Arc<dyn ZarinpalApi + Send + Sync>,
        payments: Arc<dyn PaymentRepository + Send + Sync>,
        callback_url: String,
    ) -> Self {
        Self {
            api,
            payments,
            callback_url,
        }
    }

    fn callback_for(&self, transaction_id: &str) -> Result<String> {
        let mut url = Url::parse(&self.callback_url)
            .with_context(|| format!("invalid payment callback url: {}", self.callback_url))?;
        url.query_pairs_mut()
            .append_pair(TRANSACTION_PARAM, transaction_id);
        Ok(url.into())
    }

    async fn verify_pending(
        &self,
        payment: PaymentEntity,
        authority: &str,
    ) -> Result<CallbackVerdict> {
        let reply = match self.api.verify_payment(payment.amount, authority).await {
            Ok(reply) => reply,
            Err(err) => {
                // Left pending; a repeated callback or the sweep resolves it.
                warn!(
                    payment_id = %payment.id,
                    transaction_id = %payment.transaction_id,
                    error = ?err,
                    "zarinpal: verify call failed"
                );
                return Ok(CallbackVerdict::failed(
                    Some(payment),
                    "could not confirm the payment with the gateway",
                ));
            }
        };

        if reply.is_success() {
            let updated = self
                .payments
                .mark_completed(payment.id, reply.ref_id.clone())
                .await?;
            if !updated {
                return self.resolved_elsewhere(payment).await;
            }

            info!(
                payment_id = %payment.id,
                transaction_id = %payment.transaction_id,
                ref_id = ?reply.ref_id,
                code = reply.code,
                "zarinpal: payment verified"
            );
            return Ok(CallbackVerdict::succeeded(payment, reply.ref_id));
        }

        let reason = format!("gateway declined verification ({}): {}", reply.code, reply.message);
        if !self.payments.mark_failed(payment.id, &reason).await? {
            return self.resolved_elsewhere(payment).await;
        }

        Ok(CallbackVerdict::failed(Some(payment), reason))
    }

    /// The conditional update lost a race; report whatever state won.
    async fn resolved_elsewhere(&self, payment: PaymentEntity) -> Result<CallbackVerdict> {
        let current = self
            .payments
            .find_by_id(payment.id)
            .await?
            .unwrap_or(payment);
        Ok(terminal_verdict(current))
    }
}

fn terminal_verdict(payment: PaymentEntity) -> CallbackVerdict {
    match PaymentStatus::from_str(&payment.status) {
        Some(PaymentStatus::Completed) => {
            let reference = payment.gateway_reference.clone();
            CallbackVerdict::succeeded(payment, reference)
        }
        _ => {
            let message = payment
                .failure_reason
                .clone()
                .unwrap_or_else(|| "payment failed".to_string());
            CallbackVerdict::failed(Some(payment), message)
        }
    }
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl PaymentGateway for ZarinpalGateway {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn initiate(
        &self,
        payment: &PaymentEntity,
        description: &str,
    ) -> Result<GatewayInitiation> {
        let body = PaymentRequestBody {
            merchant_id: self.api.merchant_id(),
            amount: payment.amount,
            callback_url: self.callback_for(&payment.transaction_id)?,
            description: description.to_string(),
            metadata: json!({ "order_id": payment.transaction_id }),
        };

        let reply = self.api.request_payment(body).await?;

        let authority = match (reply.is_success(), reply.authority) {
            (true, Some(authority)) => authority,
            (_, _) => {
                warn!(
                    payment_id = %payment.id,
                    code = reply.code,
                    gateway_message = %reply.message,
                    "zarinpal: payment request rejected"
                );
                return Ok(GatewayInitiation::Rejected {
                    message: format!(
                        "payment gateway rejected the request ({}): {}",
                        reply.code, reply.message
                    ),
                });
            }
        };

        if let Err(err) = self
            .payments
            .merge_metadata(payment.id, json!({ AUTHORITY_KEY: authority }))
            .await
        {
            // The callback carries our transaction id, so matching still works without it.
            warn!(
                payment_id = %payment.id,
                error = ?err,
                "zarinpal: failed to store gateway authority"
            );
        }

        Ok(GatewayInitiation::Redirect {
            payment_url: self.api.start_pay_url(&authority),
            authority: Some(authority),
        })
    }

    async fn process_callback(&self, params: &HashMap<String, String>) -> Result<CallbackVerdict> {
        let Some(transaction_id) = param(params, TRANSACTION_PARAM) else {
            return Ok(CallbackVerdict::failed(
                None,
                "callback is missing the transaction reference",
            ));
        };

        let Some(payment) = self.payments.find_by_transaction_id(transaction_id).await? else {
            warn!(%transaction_id, "zarinpal: callback for unknown transaction");
            return Ok(CallbackVerdict::failed(None, "payment not found"));
        };

        match PaymentStatus::from_str(&payment.status) {
            Some(PaymentStatus::Pending) => {}
            _ => return Ok(terminal_verdict(payment)),
        }

        let Some(authority) = param(params, AUTHORITY_PARAM) else {
            return Ok(CallbackVerdict::failed(
                Some(payment),
                "callback is missing the gateway authority",
            ));
        };

        let stored_authority = PaymentMetadata::from_value(&payment.payment_metadata).authority;
        if stored_authority.as_deref().is_some_and(|stored| stored != authority) {
            warn!(
                payment_id = %payment.id,
                %transaction_id,
                "zarinpal: callback authority does not match the payment"
            );
            return Ok(CallbackVerdict::failed(
                Some(payment),
                "callback does not match this payment",
            ));
        }

        if param(params, STATUS_PARAM) != Some(STATUS_OK) {
            let reason = "payment was cancelled or declined at the gateway";
            if !self.payments.mark_failed(payment.id, reason).await? {
                return self.resolved_elsewhere(payment).await;
            }
            return Ok(CallbackVerdict::failed(Some(payment), reason));
        }

        self.verify_pending(payment, authority).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::repositories::payments::MockPaymentRepository,
        payments::zarinpal_client::{GatewayReply, MockZarinpalApi},
    };
    use chrono::Utc;
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn payment(status: PaymentStatus, authority: Option<&str>) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            amount: 900_000,
            currency: "IRR".to_string(),
            status: status.as_str().to_string(),
            transaction_id: "TXN-abc".to_string(),
            payment_metadata: match authority {
                Some(authority) => json!({ "source": "web", "authority": authority }),
                None => json!({ "source": "web" }),
            },
            gateway_reference: None,
            failure_reason: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn reply(code: i64, authority: Option<&str>, ref_id: Option<&str>) -> GatewayReply {
        GatewayReply {
            code,
            message: "msg".to_string(),
            authority: authority.map(str::to_string),
            ref_id: ref_id.map(str::to_string),
        }
    }

    fn callback(status: &str) -> HashMap<String, String> {
        HashMap::from([
            ("transaction_id".to_string(), "TXN-abc".to_string()),
            ("Authority".to_string(), "A0001".to_string()),
            ("Status".to_string(), status.to_string()),
        ])
    }

    fn gateway(api: MockZarinpalApi, repo: MockPaymentRepository) -> ZarinpalGateway {
        ZarinpalGateway::new(
            Arc::new(api),
            Arc::new(repo),
            "https://shop.example/payment/callback".to_string(),
        )
    }

    #[tokio::test]
    async fn initiate_returns_start_pay_url_and_stores_authority() {
        let pending = payment(PaymentStatus::Pending, None);
        let payment_id = pending.id;

        let mut api = MockZarinpalApi::new();
        api.expect_merchant_id()
            .returning(|| "merchant-1".to_string());
        api.expect_request_payment()
            .withf(|body| {
                body.amount == 900_000
                    && body.callback_url
                        == "https://shop.example/payment/callback?transaction_id=TXN-abc"
            })
            .times(1)
            .returning(|_| Ok(reply(100, Some("A0001"), None)));
        api.expect_start_pay_url()
            .withf(|authority| authority == "A0001")
            .returning(|authority| format!("https://pay.example/StartPay/{authority}"));

        let mut repo = MockPaymentRepository::new();
        repo.expect_merge_metadata()
            .with(eq(payment_id), eq(json!({ "authority": "A0001" })))
            .times(1)
            .returning(|_, _| Ok(()));

        let result = gateway(api, repo)
            .initiate(&pending, "Monthly (1month)")
            .await
            .unwrap();

        assert_eq!(
            result,
            GatewayInitiation::Redirect {
                payment_url: "https://pay.example/StartPay/A0001".to_string(),
                authority: Some("A0001".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn initiate_reports_gateway_rejection() {
        let mut api = MockZarinpalApi::new();
        api.expect_merchant_id()
            .returning(|| "merchant-1".to_string());
        api.expect_request_payment()
            .returning(|_| Ok(reply(-9, None, None)));

        let result = gateway(api, MockPaymentRepository::new())
            .initiate(&payment(PaymentStatus::Pending, None), "Monthly")
            .await
            .unwrap();

        assert!(matches!(result, GatewayInitiation::Rejected { .. }));
    }

    #[tokio::test]
    async fn successful_callback_verifies_and_completes() {
        let pending = payment(PaymentStatus::Pending, Some("A0001"));
        let payment_id = pending.id;

        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_transaction_id()
            .withf(|txid| txid == "TXN-abc")
            .returning(move |_| Ok(Some(pending.clone())));
        repo.expect_mark_completed()
            .with(eq(payment_id), eq(Some("201".to_string())))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut api = MockZarinpalApi::new();
        api.expect_verify_payment()
            .withf(|amount, authority| *amount == 900_000 && authority == "A0001")
            .times(1)
            .returning(|_, _| Ok(reply(100, None, Some("201"))));

        let verdict = gateway(api, repo)
            .process_callback(&callback("OK"))
            .await
            .unwrap();

        assert!(verdict.success);
        assert_eq!(verdict.reference.as_deref(), Some("201"));
    }

    #[tokio::test]
    async fn completed_payment_is_not_verified_again() {
        let mut completed = payment(PaymentStatus::Completed, Some("A0001"));
        completed.gateway_reference = Some("201".to_string());

        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_transaction_id()
            .returning(move |_| Ok(Some(completed.clone())));
        repo.expect_mark_completed().never();

        let mut api = MockZarinpalApi::new();
        api.expect_verify_payment().never();

        let verdict = gateway(api, repo)
            .process_callback(&callback("OK"))
            .await
            .unwrap();

        assert!(verdict.success);
        assert_eq!(verdict.reference.as_deref(), Some("201"));
    }

    #[tokio::test]
    async fn cancelled_callback_marks_payment_failed() {
        let pending = payment(PaymentStatus::Pending, Some("A0001"));

        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_transaction_id()
            .returning(move |_| Ok(Some(pending.clone())));
        repo.expect_mark_failed()
            .times(1)
            .returning(|_, _| Ok(true));

        let mut api = MockZarinpalApi::new();
        api.expect_verify_payment().never();

        let verdict = gateway(api, repo)
            .process_callback(&callback("NOK"))
            .await
            .unwrap();

        assert!(!verdict.success);
        assert!(verdict.payment.is_some());
    }

    #[tokio::test]
    async fn mismatched_authority_is_rejected_without_mutation() {
        let pending = payment(PaymentStatus::Pending, Some("A9999"));

        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_transaction_id()
            .returning(move |_| Ok(Some(pending.clone())));
        repo.expect_mark_failed().never();
        repo.expect_mark_completed().never();

        let verdict = gateway(MockZarinpalApi::new(), repo)
            .process_callback(&callback("OK"))
            .await
            .unwrap();

        assert!(!verdict.success);
    }

    #[tokio::test]
    async fn unknown_transaction_is_a_failure() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_transaction_id()
            .returning(|_| Ok(None));

        let verdict = gateway(MockZarinpalApi::new(), repo)
            .process_callback(&callback("OK"))
            .await
            .unwrap();

        assert!(!verdict.success);
        assert!(verdict.payment.is_none());
    }

    #[tokio::test]
    async fn verify_transport_error_leaves_payment_pending() {
        let pending = payment(PaymentStatus::Pending, Some("A0001"));

        let mut repo = MockPaymentRepository::new();
        repo.expect_find_by_transaction_id()
            .returning(move |_| Ok(Some(pending.clone())));
        repo.expect_mark_failed().never();
        repo.expect_mark_completed().never();

        let mut api = MockZarinpalApi::new();
        api.expect_verify_payment()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let verdict = gateway(api, repo)
            .process_callback(&callback("OK"))
            .await
            .unwrap();

        assert!(!verdict.success);
    }
}
