#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub instamojo: Instamojo,
    pub checkout: Checkout,
    /// `None` leaves the grading route unmounted.
    pub grader: Option<Grader>,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Instamojo {
    pub api_url: String,
    pub api_key: String,
    pub auth_token: String,
    pub private_salt: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub redirect_url: String,
    pub webhook_url: String,
}

#[derive(Debug, Clone)]
pub struct Grader {
    pub api_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}
