//! Record keeping for users and video analyses.
//!
//! Handlers and the analysis job only see `Arc<dyn AnalysisStore>`. Postgres
//! backs it in production; the in-memory adapter is used when no database is
//! configured and in tests.
//!
//! Status changes go through dedicated transitions rather than a generic
//! partial update, so a record can never carry scores without being
//! `completed` or be picked up by two runs at once.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::models::analysis::{AnalysisResult, NewVideoAnalysis, VideoAnalysis};
use crate::models::user::{NewUser, User};

pub use memory::MemoryAnalysisStore;
pub use postgres::PgAnalysisStore;

pub const DEMO_USER_EMAIL: &str = "demo@tennisrank.com";
pub const DEMO_USER_NAME: &str = "demo";

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Inserts a record in `uploading` / `pending` state with no scores.
    async fn create_analysis(&self, analysis: NewVideoAnalysis) -> Result<VideoAnalysis>;

    async fn get_analysis(&self, id: Uuid) -> Result<Option<VideoAnalysis>>;

    /// Newest first.
    async fn list_analyses_for_user(&self, user_id: Uuid) -> Result<Vec<VideoAnalysis>>;

    async fn attach_payment_intent(
        &self,
        id: Uuid,
        payment_intent_id: &str,
    ) -> Result<Option<VideoAnalysis>>;

    async fn find_by_payment_intent(&self, payment_intent_id: &str)
        -> Result<Option<VideoAnalysis>>;

    /// `uploading → processing`, marking the payment as paid.
    /// Returns `None` when the record is missing or not in `uploading`.
    async fn begin_processing(&self, id: Uuid) -> Result<Option<VideoAnalysis>>;

    /// Marks the payment as failed unless it was already paid.
    async fn mark_payment_failed(&self, id: Uuid) -> Result<Option<VideoAnalysis>>;

    /// `processing → completed`. Writes every score, the rank, the qualitative
    /// summary and `completed_at` in a single update.
    async fn complete_analysis(
        &self,
        id: Uuid,
        result: &AnalysisResult,
    ) -> Result<Option<VideoAnalysis>>;

    /// `processing → failed`. No score field is touched.
    async fn fail_analysis(&self, id: Uuid) -> Result<Option<VideoAnalysis>>;
}

/// Fetches the shared demo account, creating it on first start.
pub async fn get_or_create_demo_user(store: &dyn AnalysisStore) -> Result<User> {
    if let Some(user) = store.get_user_by_email(DEMO_USER_EMAIL).await? {
        return Ok(user);
    }

    let user = store
        .create_user(NewUser {
            email: DEMO_USER_EMAIL.to_string(),
            username: DEMO_USER_NAME.to_string(),
        })
        .await?;
    info!("Created demo user {}", user.id);
    Ok(user)
}

pub(crate) fn serialize_details(result: &AnalysisResult) -> Result<String> {
    Ok(serde_json::to_string(&result.detailed_analysis)?)
}
