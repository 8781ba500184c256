//! Environment-derived settings. Everything is read once at startup; the
//! endpoint URLs are plain fields so tests can point the relay at a local
//! mock upstream.

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE: &str = "https://earthengine.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// `GEE_SERVICE_ACCOUNT`: full service-account JSON, or a raw PEM key.
    pub secret: Option<String>,
    /// `SA_CLIENT_EMAIL`: supplement when the secret is a raw key.
    pub client_email: Option<String>,
    /// `SA_PRIVATE_KEY`: raw key fallback when `GEE_SERVICE_ACCOUNT` is unset.
    pub private_key: Option<String>,
    /// `EE_PROJECT`: supplement when the secret is a raw key.
    pub project_id: Option<String>,
    pub token_url: String,
    pub api_base: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var("GEE_SERVICE_ACCOUNT").ok(),
            client_email: std::env::var("SA_CLIENT_EMAIL").ok(),
            private_key: std::env::var("SA_PRIVATE_KEY").ok(),
            project_id: std::env::var("EE_PROJECT").ok(),
            token_url: std::env::var("TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            api_base: std::env::var("EE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}
