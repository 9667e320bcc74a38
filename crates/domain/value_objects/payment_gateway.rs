use crate::domain::entities::payments::PaymentEntity;

/// Outcome of asking the gateway to open a payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayInitiation {
    Redirect {
        payment_url: String,
        authority: Option<String>,
    },
    Rejected {
        message: String,
    },
}

/// Outcome of resolving a gateway callback to one payment.
#[derive(Debug, Clone)]
pub struct CallbackVerdict {
    pub success: bool,
    pub payment: Option<PaymentEntity>,
    pub message: String,
    pub reference: Option<String>,
}

impl CallbackVerdict {
    pub fn succeeded(payment: PaymentEntity, reference: Option<String>) -> Self {
        Self {
            success: true,
            payment: Some(payment),
            message: "payment completed".to_string(),
            reference,
        }
    }

    pub fn failed(payment: Option<PaymentEntity>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payment,
            message: message.into(),
            reference: None,
        }
    }
}
