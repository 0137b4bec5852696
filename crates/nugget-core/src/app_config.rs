#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Storefront country code used for search and lookup (e.g. `"US"`).
    pub storefront: String,
    /// Language code sent to both endpoints (e.g. `"en_us"`).
    pub language: String,
    /// Base URL shared by the ranking and lookup endpoints.
    pub api_base_url: String,
    /// Client-side cap on ranked identifiers per keyword; also the number of
    /// merged results scored per analysis.
    pub result_limit: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Mandatory pause between batch items, in milliseconds.
    pub inter_item_delay_ms: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("storefront", &self.storefront)
            .field("language", &self.language)
            .field("api_base_url", &self.api_base_url)
            .field("result_limit", &self.result_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("inter_item_delay_ms", &self.inter_item_delay_ms)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
