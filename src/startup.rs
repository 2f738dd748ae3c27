use crate::errors::AppError;
use aws_sdk_dynamodb::{
    Client as DynamoDbClient, error::SdkError as DynamoSdkError,
    types::{AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType},
};
use aws_sdk_s3::{
    Client as S3Client, error::SdkError as S3SdkError,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};

pub const USERS_TABLE: &str = "users";
pub const MEMES_TABLE: &str = "memes";
pub const CHATS_TABLE: &str = "chats";
pub const MESSAGES_TABLE: &str = "messages";
pub const COUNTERS_TABLE: &str = "counters";

/// Creates a single-key DynamoDB table if it doesn't exist.
async fn create_table_if_not_exists(
    client: &DynamoDbClient,
    table_name: &str,
    key_name: &str,
    key_type: ScalarAttributeType,
) -> Result<(), AppError> {
    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(key_name)
                .attribute_type(key_type)
                .build()
                .map_err(|e| {
                    AppError::Init(format!("Failed to build attribute definition: {}", e))
                })?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(key_name)
                .key_type(KeyType::Hash)
                .build()
                .map_err(|e| AppError::Init(format!("Failed to build key schema: {}", e)))?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;
    match result {
        Ok(_) => {
            tracing::info!(
                "Startup: Table '{}' created successfully or setup initiated.",
                table_name
            );
            Ok(())
        }
        Err(e) => {
            if let DynamoSdkError::ServiceError(service_err) = &e {
                if service_err.err().is_resource_in_use_exception() {
                    tracing::info!(
                        "Startup: Table '{}' already exists, no action needed.",
                        table_name
                    );
                    Ok(())
                } else {
                    let context =
                        format!("Startup: Service error creating DynamoDB table '{}'", table_name);
                    tracing::error!("{}: {:?}", context, service_err);
                    Err(AppError::Init(format!("{}: {}", context, e)))
                }
            } else {
                let context = format!("Startup: SDK error creating DynamoDB table '{}'", table_name);
                tracing::error!("{}: {}", context, e);
                Err(AppError::Init(format!("{}: {}", context, e)))
            }
        }
    }
}

/// Ensures the S3 bucket exists, creating it with the correct location constraint if needed.
async fn ensure_s3_bucket_exists(
    client: &S3Client,
    bucket_name: &str,
    region_str: &str,
) -> Result<(), AppError> {
    let bucket_config = if region_str != "us-east-1" {
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region_str))
                .build(),
        )
    } else {
        None
    };

    let mut create_bucket_req_builder = client.create_bucket().bucket(bucket_name);
    if let Some(config) = bucket_config {
        create_bucket_req_builder = create_bucket_req_builder.create_bucket_configuration(config);
    }

    match create_bucket_req_builder.send().await {
        Ok(_) => {
            tracing::info!(
                "Startup: S3 bucket '{}' created or already exists.",
                bucket_name
            );
            Ok(())
        }
        Err(sdk_err) => {
            if let S3SdkError::ServiceError(service_err) = &sdk_err {
                let code = service_err.err().meta().code();
                if code == Some("BucketAlreadyOwnedByYou") || code == Some("BucketAlreadyExists") {
                    tracing::info!("Startup: S3 bucket '{}' already exists.", bucket_name);
                    Ok(())
                } else {
                    let context =
                        format!("Startup: Service error creating S3 bucket '{}'", bucket_name);
                    tracing::error!("{}: {:?}", context, service_err);
                    Err(AppError::Init(format!("{}: {}", context, sdk_err)))
                }
            } else {
                let context = format!("Startup: SDK error creating S3 bucket '{}'", bucket_name);
                tracing::error!("{}: {}", context, sdk_err);
                Err(AppError::Init(format!("{}: {}", context, sdk_err)))
            }
        }
    }
}

/// Initializes required AWS resources (DynamoDB tables, S3 bucket).
pub async fn init_resources(
    db_client: &DynamoDbClient,
    s3_client: &S3Client,
    bucket_name: &str,
    region_str: &str,
) -> Result<(), AppError> {
    tracing::info!("Startup: Initializing AWS resources...");
    create_table_if_not_exists(db_client, USERS_TABLE, "user_id", ScalarAttributeType::N).await?;
    create_table_if_not_exists(db_client, MEMES_TABLE, "meme_id", ScalarAttributeType::N).await?;
    // Messaging tables are provisioned ahead of the feature; no endpoint
    // touches them yet.
    create_table_if_not_exists(db_client, CHATS_TABLE, "chat_id", ScalarAttributeType::N).await?;
    create_table_if_not_exists(
        db_client,
        MESSAGES_TABLE,
        "message_id",
        ScalarAttributeType::N,
    )
    .await?;
    // Id allocation and per-owner meme sequences live here.
    create_table_if_not_exists(
        db_client,
        COUNTERS_TABLE,
        "counter_name",
        ScalarAttributeType::S,
    )
    .await?;
    ensure_s3_bucket_exists(s3_client, bucket_name, region_str).await?;
    tracing::info!("Startup: AWS resource initialization complete.");
    Ok(())
}
