mod analysis;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod payments;
mod routes;
mod state;
mod store;
mod uploads;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::extractor::FfmpegFrameExtractor;
use crate::analysis::pacing::{FixedDelay, NoDelay, Pacer};
use crate::analysis::scorer::VisionFrameScorer;
use crate::analysis::AnalysisPipeline;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::VisionClient;
use crate::payments::StripeClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{get_or_create_demo_user, AnalysisStore, MemoryAnalysisStore, PgAnalysisStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TennisRank API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn AnalysisStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgAnalysisStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL is not set; analyses are kept in memory only");
            Arc::new(MemoryAnalysisStore::new())
        }
    };

    if config.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET is not set; webhook signatures will not be verified");
    }

    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    let vision = VisionClient::new(config.openai_api_key.clone());
    info!("Vision client initialized (model: {})", llm_client::MODEL);

    let pacer: Arc<dyn Pacer> = match config.frame_scoring_delay_ms {
        0 => Arc::new(NoDelay),
        ms => Arc::new(FixedDelay(Duration::from_millis(ms))),
    };
    let pipeline = AnalysisPipeline::new(
        Arc::new(FfmpegFrameExtractor::new(config.ffmpeg_bin.clone())),
        Arc::new(VisionFrameScorer::new(vision)),
        pacer,
    );

    let demo_user = get_or_create_demo_user(store.as_ref()).await?;

    let state = AppState {
        store,
        s3,
        stripe: StripeClient::new(config.stripe_secret_key.clone()),
        pipeline: Arc::new(pipeline),
        config: config.clone(),
        demo_user_id: demo_user.id,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "tennisrank-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
