use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::plans::PlanEntity,
    value_objects::{
        enums::{checkout_actions::CheckoutAction, checkout_sources::CheckoutSource},
        priced_offers::apply_plan_discount,
    },
};

const MAX_COUPON_CODE_LEN: usize = 50;
const MAX_RETURN_SCHEME_LEN: usize = 64;
const MAX_EPISODE_ID_LEN: usize = 64;

/// Checkout form as submitted. Every field is optional here so that validation can report
/// which one is wrong instead of failing deserialization as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub plan_id: Option<String>,
    pub coupon_code: Option<String>,
    pub action: Option<String>,
    pub source: Option<String>,
    pub return_scheme: Option<String>,
    pub episode_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validated checkout submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCommand {
    pub plan_id: Uuid,
    pub coupon_code: Option<String>,
    pub action: CheckoutAction,
    pub source: CheckoutSource,
    pub return_scheme: Option<String>,
    pub episode_id: Option<String>,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<CheckoutCommand, FieldError> {
        let plan_id = match non_empty(&self.plan_id) {
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|_| FieldError::new("plan_id", "plan_id must be a valid plan identifier"))?,
            None => return Err(FieldError::new("plan_id", "plan_id is required")),
        };

        let coupon_code = match non_empty(&self.coupon_code) {
            Some(code) => {
                let valid = code.len() <= MAX_COUPON_CODE_LEN
                    && code
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
                if !valid {
                    return Err(FieldError::new("coupon_code", "coupon code is malformed"));
                }
                Some(code.to_string())
            }
            None => None,
        };

        let action = match non_empty(&self.action) {
            Some(raw) => CheckoutAction::from_str(raw).ok_or_else(|| {
                FieldError::new("action", "action must be one of: apply_coupon, pay")
            })?,
            None => CheckoutAction::default(),
        };

        let source = match non_empty(&self.source) {
            Some(raw) => CheckoutSource::from_str(raw)
                .ok_or_else(|| FieldError::new("source", "source must be one of: web, app"))?,
            None => CheckoutSource::default(),
        };

        let return_scheme = match non_empty(&self.return_scheme) {
            Some(scheme) if is_valid_scheme(scheme) => Some(scheme.to_string()),
            Some(_) => {
                return Err(FieldError::new(
                    "return_scheme",
                    "return_scheme is not a valid URI scheme",
                ));
            }
            None => None,
        };

        let episode_id = match non_empty(&self.episode_id) {
            Some(id)
                if id.len() <= MAX_EPISODE_ID_LEN
                    && id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                Some(id.to_string())
            }
            Some(_) => return Err(FieldError::new("episode_id", "episode_id is malformed")),
            None => None,
        };

        Ok(CheckoutCommand {
            plan_id,
            coupon_code,
            action,
            source,
            return_scheme,
            episode_id,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_with_letter
        && scheme.len() <= MAX_RETURN_SCHEME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutPageQuery {
    pub plan_slug: Option<String>,
    pub source: Option<String>,
    pub episode_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanDto {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price: i64,
    pub discount_percentage: Option<i32>,
    pub discounted_price: i64,
    pub duration_days: i32,
    pub currency: String,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            discounted_price: apply_plan_discount(value.price, value.discount_percentage),
            slug: value.slug,
            name: value.name,
            price: value.price,
            discount_percentage: value.discount_percentage,
            duration_days: value.duration_days,
            currency: value.currency,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutPageDto {
    pub plans: Vec<PlanDto>,
    pub selected_plan: Option<PlanDto>,
    pub source: CheckoutSource,
    pub episode_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(plan_id: &str) -> CheckoutRequest {
        CheckoutRequest {
            plan_id: Some(plan_id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_pay_from_web() {
        let plan_id = Uuid::new_v4();
        let command = request(&plan_id.to_string()).validate().unwrap();

        assert_eq!(command.plan_id, plan_id);
        assert_eq!(command.action, CheckoutAction::Pay);
        assert_eq!(command.source, CheckoutSource::Web);
        assert_eq!(command.coupon_code, None);
    }

    #[test]
    fn missing_plan_is_a_field_error() {
        let err = CheckoutRequest::default().validate().unwrap_err();
        assert_eq!(err.field, "plan_id");

        let err = request("not-a-uuid").validate().unwrap_err();
        assert_eq!(err.field, "plan_id");
    }

    #[test]
    fn blank_coupon_is_ignored_and_malformed_coupon_rejected() {
        let plan_id = Uuid::new_v4().to_string();

        let mut blank = request(&plan_id);
        blank.coupon_code = Some("   ".to_string());
        assert_eq!(blank.validate().unwrap().coupon_code, None);

        let mut malformed = request(&plan_id);
        malformed.coupon_code = Some("DROP TABLE;".to_string());
        assert_eq!(malformed.validate().unwrap_err().field, "coupon_code");
    }

    #[test]
    fn app_checkout_keeps_scheme_and_episode() {
        let mut req = request(&Uuid::new_v4().to_string());
        req.action = Some("apply_coupon".to_string());
        req.source = Some("app".to_string());
        req.return_scheme = Some("audiostory".to_string());
        req.episode_id = Some("4512".to_string());

        let command = req.validate().unwrap();
        assert_eq!(command.action, CheckoutAction::ApplyCoupon);
        assert_eq!(command.source, CheckoutSource::App);
        assert_eq!(command.return_scheme.as_deref(), Some("audiostory"));
        assert_eq!(command.episode_id.as_deref(), Some("4512"));
    }

    #[test]
    fn rejects_bad_scheme_and_unknown_action() {
        let mut req = request(&Uuid::new_v4().to_string());
        req.return_scheme = Some("1nvalid://".to_string());
        assert_eq!(req.validate().unwrap_err().field, "return_scheme");

        let mut req = request(&Uuid::new_v4().to_string());
        req.action = Some("refund".to_string());
        assert_eq!(req.validate().unwrap_err().field, "action");
    }
}
