use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{serialize_details, AnalysisStore};
use crate::models::analysis::{AnalysisResult, NewVideoAnalysis, VideoAnalysis};
use crate::models::user::{NewUser, User};

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        Ok(sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, username) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.username)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_analysis(&self, analysis: NewVideoAnalysis) -> Result<VideoAnalysis> {
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            r#"
            INSERT INTO video_analyses (id, user_id, file_name, file_size)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(analysis.user_id)
        .bind(&analysis.file_name)
        .bind(analysis.file_size)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        Ok(
            sqlx::query_as::<_, VideoAnalysis>("SELECT * FROM video_analyses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_analyses_for_user(&self, user_id: Uuid) -> Result<Vec<VideoAnalysis>> {
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            "SELECT * FROM video_analyses WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn attach_payment_intent(
        &self,
        id: Uuid,
        payment_intent_id: &str,
    ) -> Result<Option<VideoAnalysis>> {
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            "UPDATE video_analyses SET stripe_payment_intent_id = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<VideoAnalysis>> {
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            "SELECT * FROM video_analyses WHERE stripe_payment_intent_id = $1",
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn begin_processing(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        // Conditional on 'uploading' so redelivered webhooks cannot start a second run.
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            r#"
            UPDATE video_analyses
            SET status = 'processing', payment_status = 'paid'
            WHERE id = $1 AND status = 'uploading'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_payment_failed(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            r#"
            UPDATE video_analyses
            SET payment_status = 'failed'
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn complete_analysis(
        &self,
        id: Uuid,
        result: &AnalysisResult,
    ) -> Result<Option<VideoAnalysis>> {
        let details = serialize_details(result)?;
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            r#"
            UPDATE video_analyses
            SET status = 'completed',
                world_ranking = $2,
                overall_score = $3,
                footwork_score = $4,
                technique_score = $5,
                strategy_score = $6,
                fitness_score = $7,
                analysis_results = $8,
                completed_at = $9
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(result.world_ranking)
        .bind(result.overall_score)
        .bind(result.footwork_score)
        .bind(result.technique_score)
        .bind(result.strategy_score)
        .bind(result.fitness_score)
        .bind(details)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fail_analysis(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        Ok(sqlx::query_as::<_, VideoAnalysis>(
            r#"
            UPDATE video_analyses
            SET status = 'failed'
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
