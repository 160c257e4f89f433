use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use crate::analysis::AnalysisPipeline;
use crate::config::Config;
use crate::payments::StripeClient;
use crate::store::AnalysisStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres or in-memory, chosen at startup from DATABASE_URL.
    pub store: Arc<dyn AnalysisStore>,
    pub s3: S3Client,
    pub stripe: StripeClient,
    pub pipeline: Arc<AnalysisPipeline>,
    pub config: Config,
    /// Owner of every upload; there is no login.
    pub demo_user_id: Uuid,
}
