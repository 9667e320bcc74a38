use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// Gateway codes that mean the charge went through. 101 is a repeated verify.
pub const CODE_SUCCESS: i64 = 100;
pub const CODE_ALREADY_VERIFIED: i64 = 101;

#[derive(Debug, Clone)]
pub struct ZarinpalConfig {
    pub merchant_id: String,
    pub api_base: String,
    pub start_pay_base: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentRequestBody {
    pub merchant_id: String,
    pub amount: i64,
    pub callback_url: String,
    pub description: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct VerifyRequestBody<'a> {
    merchant_id: &'a str,
    amount: i64,
    authority: &'a str,
}

/// What the gateway said about one call, after flattening its `data`/`errors` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub code: i64,
    pub message: String,
    pub authority: Option<String>,
    pub ref_id: Option<String>,
}

impl GatewayReply {
    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS || self.code == CODE_ALREADY_VERIFIED
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZarinpalApi {
    async fn request_payment(&self, body: PaymentRequestBody) -> Result<GatewayReply>;

    async fn verify_payment(&self, amount: i64, authority: &str) -> Result<GatewayReply>;

    fn merchant_id(&self) -> String;

    fn start_pay_url(&self, authority: &str) -> String;
}

pub struct ZarinpalClient {
    http: reqwest::Client,
    config: ZarinpalConfig,
}

impl ZarinpalClient {
    pub fn new(config: ZarinpalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build gateway http client")?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/pg/v4/payment/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        context: &str,
    ) -> Result<GatewayReply> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("gateway request failed: {context}"))?;

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        match parse_reply(&text) {
            Some(reply) => Ok(reply),
            None => {
                error!(
                    status = %status,
                    response_body = %text,
                    context = %context,
                    "zarinpal: unreadable gateway response"
                );
                anyhow::bail!("gateway returned an unreadable response: {context} (status {status})");
            }
        }
    }
}

#[async_trait]
impl ZarinpalApi for ZarinpalClient {
    async fn request_payment(&self, body: PaymentRequestBody) -> Result<GatewayReply> {
        self.post_json("request.json", &body, "request payment").await
    }

    async fn verify_payment(&self, amount: i64, authority: &str) -> Result<GatewayReply> {
        let body = VerifyRequestBody {
            merchant_id: &self.config.merchant_id,
            amount,
            authority,
        };
        self.post_json("verify.json", &body, "verify payment").await
    }

    fn merchant_id(&self) -> String {
        self.config.merchant_id.clone()
    }

    fn start_pay_url(&self, authority: &str) -> String {
        format!(
            "{}/{}",
            self.config.start_pay_base.trim_end_matches('/'),
            authority
        )
    }
}

/// Successful replies carry `data: {code, message, ...}` and `errors: []`; failures carry
/// `data: []` and `errors: {code, message}`. Returns `None` when neither side has a code.
pub fn parse_reply(body: &str) -> Option<GatewayReply> {
    let envelope: Value = serde_json::from_str(body).ok()?;

    let source = [envelope.get("data"), envelope.get("errors")]
        .into_iter()
        .flatten()
        .find(|section| section.get("code").and_then(Value::as_i64).is_some())?;

    let code = source.get("code").and_then(Value::as_i64)?;
    let message = source
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let authority = source
        .get("authority")
        .and_then(Value::as_str)
        .map(str::to_string);
    let ref_id = source.get("ref_id").and_then(|value| match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    });

    Some(GatewayReply {
        code,
        message,
        authority,
        ref_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_success() {
        let reply = parse_reply(
            r#"{"data":{"code":100,"message":"Success","authority":"A00000000000000000000000000217885159","fee_type":"Merchant","fee":100},"errors":[]}"#,
        )
        .unwrap();

        assert!(reply.is_success());
        assert_eq!(
            reply.authority.as_deref(),
            Some("A00000000000000000000000000217885159")
        );
    }

    #[test]
    fn parses_verify_with_numeric_ref_id() {
        let reply = parse_reply(
            r#"{"data":{"code":101,"message":"Verified","card_pan":"502229******5995","ref_id":201},"errors":[]}"#,
        )
        .unwrap();

        assert!(reply.is_success());
        assert_eq!(reply.ref_id.as_deref(), Some("201"));
    }

    #[test]
    fn parses_error_envelope() {
        let reply = parse_reply(
            r#"{"data":[],"errors":{"code":-9,"message":"The input params invalid, validation error.","validations":[]}}"#,
        )
        .unwrap();

        assert!(!reply.is_success());
        assert_eq!(reply.code, -9);
        assert_eq!(reply.authority, None);
    }

    #[test]
    fn garbage_is_unreadable() {
        assert_eq!(parse_reply("<html>bad gateway</html>"), None);
        assert_eq!(parse_reply(r#"{"data":[],"errors":[]}"#), None);
    }
}
