use std::str::FromStr;

use anyhow::{Context, Result};

use crate::config::{
    config_model::{
        Auth, BackendServer, Checkout, Database, DotEnvyConfig, Gateway, ResultPages,
    },
    stage::Stage,
};

const DEFAULT_ZARINPAL_API_BASE: &str = "https://payment.zarinpal.com";
const DEFAULT_ZARINPAL_START_PAY_BASE: &str = "https://payment.zarinpal.com/pg/StartPay";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub(crate) fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let env = Env(&lookup);

    let backend_server = BackendServer {
        port: env.parsed("SERVER_PORT_BACKEND")?,
        body_limit: env.parsed("SERVER_BODY_LIMIT")?,
        timeout: env.parsed("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: env.required("DATABASE_URL")?,
    };

    let auth = Auth {
        jwt_secret: env.required("AUTH_JWT_SECRET")?,
    };

    let gateway = Gateway {
        merchant_id: env.required("ZARINPAL_MERCHANT_ID")?,
        api_base: env.or("ZARINPAL_API_BASE", DEFAULT_ZARINPAL_API_BASE),
        start_pay_base: env.or("ZARINPAL_START_PAY_BASE", DEFAULT_ZARINPAL_START_PAY_BASE),
        callback_url: env.required("PAYMENT_CALLBACK_URL")?,
        timeout_seconds: env.parsed_or("GATEWAY_TIMEOUT_SECONDS", 10)?,
    };

    let checkout = Checkout {
        coupon_timeout_seconds: env.parsed_or("COUPON_TIMEOUT_SECONDS", 5)?,
    };

    let result_pages = ResultPages {
        success_url: env.or("PAYMENT_SUCCESS_URL", "/payment/success"),
        failure_url: env.or("PAYMENT_FAILURE_URL", "/payment/failure"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        gateway,
        checkout,
        result_pages,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_auth_secret() -> Result<Auth> {
    dotenvy::dotenv().ok();

    Ok(Auth {
        jwt_secret: std::env::var("AUTH_JWT_SECRET").context("AUTH_JWT_SECRET is invalid")?,
    })
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key).with_context(|| format!("{key} is invalid"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.required(key)?
            .parse()
            .with_context(|| format!("{key} is invalid"))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
            None => Ok(default),
        }
    }
}
