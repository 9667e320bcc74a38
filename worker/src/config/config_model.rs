#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub sweep: Sweep,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Sweep {
    /// Pending checkouts older than this are abandoned.
    pub pending_ttl_minutes: i64,
    pub interval_seconds: u64,
    pub batch_limit: Option<i64>,
    /// Bearer token for the internal sweep route. The route answers 503 without it.
    pub internal_token: Option<String>,
}
