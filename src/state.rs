use crate::auth::{PasswordHasher, TokenService};
use crate::config::Config;
use crate::domain::{FileStorage, MemeRepository, UserRepository};
use crate::repositories::{DynamoDbMemeRepository, DynamoDbUserRepository};
use crate::startup::{COUNTERS_TABLE, MEMES_TABLE, USERS_TABLE};
use crate::storage::S3FileStorage;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use chrono::Duration;
use std::sync::Arc;

/// Shared resources for the web server, built once at startup and handed
/// to every handler. Repositories and storage sit behind trait objects so
/// tests can swap in in-memory fakes.
pub struct AppState {
    pub user_repo: Arc<dyn UserRepository>,
    pub meme_repo: Arc<dyn MemeRepository>,
    pub file_storage: Arc<dyn FileStorage>,
    pub password_hasher: PasswordHasher,
    pub token_service: TokenService,
    pub public_base_url: String,
}

impl AppState {
    /// Wires the AWS-backed implementations from application config.
    pub fn new(config: &Config, db_client: DynamoDbClient, s3_client: S3Client) -> Self {
        let user_repo = DynamoDbUserRepository::new(
            db_client.clone(),
            USERS_TABLE.to_string(),
            COUNTERS_TABLE.to_string(),
        );
        let meme_repo = DynamoDbMemeRepository::new(
            db_client,
            MEMES_TABLE.to_string(),
            COUNTERS_TABLE.to_string(),
        );
        let file_storage = S3FileStorage::new(s3_client, config.media_bucket_name.clone());

        Self {
            user_repo: Arc::new(user_repo),
            meme_repo: Arc::new(meme_repo),
            file_storage: Arc::new(file_storage),
            password_hasher: PasswordHasher::new(config.password_salt.clone()),
            token_service: TokenService::new(
                config.jwt_secret.clone(),
                Duration::days(config.token_ttl_days),
            ),
            public_base_url: config.public_base_url.clone(),
        }
    }
}
