use crate::config::Config;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;

// Creates the base AWS SDK configuration based on application config.
// Reads region and optional endpoint URL from `Config`.
// Without an endpoint override, the default credential provider chain
// applies (env vars, profiles, etc.).
pub async fn create_sdk_config(config: &Config) -> SdkConfig {
    let region = Region::new(config.aws_region.clone());
    tracing::info!(sdk_region = %config.aws_region, "Setting SDK region");

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

    if let Some(endpoint_url) = &config.localstack_endpoint {
        tracing::info!("Using localstack endpoint override: {}", endpoint_url);
        // LocalStack accepts any credentials; pin static ones so local
        // runs need no AWS environment.
        config_loader = config_loader
            .endpoint_url(endpoint_url)
            .credentials_provider(Credentials::new("test", "test", None, None, "localstack"));
    } else {
        tracing::info!("Using default AWS endpoints and credential resolution.");
    }

    config_loader.load().await
}

// Creates a DynamoDB client from a shared SdkConfig.
pub fn create_dynamodb_client(sdk_config: &SdkConfig) -> DynamoDbClient {
    DynamoDbClient::new(sdk_config)
}

// Creates an S3 client from a shared SdkConfig.
pub fn create_s3_client(sdk_config: &SdkConfig) -> S3Client {
    let s3_config_builder = aws_sdk_s3::config::Builder::from(sdk_config).force_path_style(true);
    let s3_config = s3_config_builder.build();
    S3Client::from_conf(s3_config)
}
