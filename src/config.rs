use std::{env, net::SocketAddr, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub media_bucket_name: String,
    // Store region as string for simplicity here, aws_clients can convert
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    // Base URL clients use to reach us; embedded in stored avatar/meme links
    pub public_base_url: String,
    pub jwt_secret: String,
    pub password_salt: String,
    pub token_ttl_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();

        let bind_address_str =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let media_bucket_name = required_var("MEDIA_BUCKET_NAME")?;

        let aws_region =
            env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "ca-central-1".to_string());

        // Allow overriding endpoint for localstack/testing
        let localstack_endpoint = env::var("AWS_ENDPOINT_URL").ok();

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_address))
            .trim_end_matches('/')
            .to_string();

        // Secrets have no defaults; startup fails without them.
        let jwt_secret = required_var("JWT_SECRET")?;
        let password_salt = required_var("PASSWORD_SALT")?;

        let token_ttl_days = match env::var("TOKEN_TTL_DAYS") {
            Ok(raw) => raw
                .parse::<i64>()
                .map_err(|e| ConfigError::InvalidVar("TOKEN_TTL_DAYS".into(), e.to_string()))?,
            Err(_) => 7,
        };

        Ok(Config {
            bind_address,
            media_bucket_name,
            aws_region,
            localstack_endpoint,
            public_base_url,
            jwt_secret,
            password_salt,
            token_ttl_days,
        })
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}
