use anyhow::Context;
use memelytics_api::aws_clients::{create_dynamodb_client, create_s3_client, create_sdk_config};
use memelytics_api::startup::init_resources;
use memelytics_api::{AppState, Config, create_router};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "memelytics_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    // --- AWS Client Initialization ---
    tracing::info!("Initializing AWS clients...");
    let sdk_config = create_sdk_config(&config).await;
    let db_client = create_dynamodb_client(&sdk_config);
    let s3_client = create_s3_client(&sdk_config);

    // NOTE: Creating resources here isn't ideal for production.
    // Use IaC (Terraform, CDK, etc.) or manual setup.
    init_resources(
        &db_client,
        &s3_client,
        &config.media_bucket_name,
        &config.aws_region,
    )
    .await
    .context("Failed to initialize AWS resources")?;

    // --- Application State and Router ---
    let bind_address = config.bind_address;
    let state = Arc::new(AppState::new(&config, db_client, s3_client));
    let app = create_router(state);

    // --- Server Startup ---
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
