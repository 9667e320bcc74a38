#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub gateway: Gateway,
    pub checkout: Checkout,
    pub result_pages: ResultPages,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Gateway {
    pub merchant_id: String,
    pub api_base: String,
    pub start_pay_base: String,
    pub callback_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub coupon_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ResultPages {
    pub success_url: String,
    pub failure_url: String,
}
