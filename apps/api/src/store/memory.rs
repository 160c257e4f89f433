use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{serialize_details, AnalysisStore};
use crate::models::analysis::{
    AnalysisResult, AnalysisStatus, NewVideoAnalysis, PaymentStatus, VideoAnalysis,
};
use crate::models::user::{NewUser, User};

/// Process-local store. Records live in insertion order, which is also
/// creation order.
#[derive(Default)]
pub struct MemoryAnalysisStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    analyses: Vec<VideoAnalysis>,
}

impl Inner {
    fn analysis_mut(&mut self, id: Uuid) -> Option<&mut VideoAnalysis> {
        self.analyses.iter_mut().find(|a| a.id == id)
    }
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisStore for MemoryAnalysisStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            bail!("user '{}' already exists", user.email);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_analysis(&self, analysis: NewVideoAnalysis) -> Result<VideoAnalysis> {
        let record = VideoAnalysis {
            id: Uuid::new_v4(),
            user_id: analysis.user_id,
            file_name: analysis.file_name,
            file_size: analysis.file_size,
            status: AnalysisStatus::Uploading.to_string(),
            payment_status: PaymentStatus::Pending.to_string(),
            world_ranking: None,
            overall_score: None,
            footwork_score: None,
            technique_score: None,
            strategy_score: None,
            fitness_score: None,
            analysis_results: None,
            stripe_payment_intent_id: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.inner.write().await.analyses.push(record.clone());
        Ok(record)
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        let inner = self.inner.read().await;
        Ok(inner.analyses.iter().find(|a| a.id == id).cloned())
    }

    async fn list_analyses_for_user(&self, user_id: Uuid) -> Result<Vec<VideoAnalysis>> {
        let inner = self.inner.read().await;
        Ok(inner
            .analyses
            .iter()
            .rev()
            .filter(|a| a.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn attach_payment_intent(
        &self,
        id: Uuid,
        payment_intent_id: &str,
    ) -> Result<Option<VideoAnalysis>> {
        let mut inner = self.inner.write().await;
        Ok(inner.analysis_mut(id).map(|record| {
            record.stripe_payment_intent_id = Some(payment_intent_id.to_string());
            record.clone()
        }))
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<VideoAnalysis>> {
        let inner = self.inner.read().await;
        Ok(inner
            .analyses
            .iter()
            .find(|a| a.stripe_payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn begin_processing(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .analysis_mut(id)
            .filter(|record| record.status() == Some(AnalysisStatus::Uploading))
            .map(|record| {
                record.status = AnalysisStatus::Processing.to_string();
                record.payment_status = PaymentStatus::Paid.to_string();
                record.clone()
            }))
    }

    async fn mark_payment_failed(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .analysis_mut(id)
            .filter(|record| record.payment_status != PaymentStatus::Paid.as_str())
            .map(|record| {
                record.payment_status = PaymentStatus::Failed.to_string();
                record.clone()
            }))
    }

    async fn complete_analysis(
        &self,
        id: Uuid,
        result: &AnalysisResult,
    ) -> Result<Option<VideoAnalysis>> {
        let details = serialize_details(result)?;
        let mut inner = self.inner.write().await;
        Ok(inner
            .analysis_mut(id)
            .filter(|record| record.status() == Some(AnalysisStatus::Processing))
            .map(|record| {
                record.status = AnalysisStatus::Completed.to_string();
                record.world_ranking = Some(result.world_ranking);
                record.overall_score = Some(result.overall_score);
                record.footwork_score = Some(result.footwork_score);
                record.technique_score = Some(result.technique_score);
                record.strategy_score = Some(result.strategy_score);
                record.fitness_score = Some(result.fitness_score);
                record.analysis_results = Some(details);
                record.completed_at = Some(Utc::now());
                record.clone()
            }))
    }

    async fn fail_analysis(&self, id: Uuid) -> Result<Option<VideoAnalysis>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .analysis_mut(id)
            .filter(|record| record.status() == Some(AnalysisStatus::Processing))
            .map(|record| {
                record.status = AnalysisStatus::Failed.to_string();
                record.clone()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::DetailedAnalysis;

    fn new_analysis(user_id: Uuid, file_name: &str) -> NewVideoAnalysis {
        NewVideoAnalysis {
            user_id: Some(user_id),
            file_name: file_name.to_string(),
            file_size: 1024,
        }
    }

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            world_ranking: 450,
            overall_score: 9.1,
            footwork_score: 9.0,
            technique_score: 9.3,
            strategy_score: 9.0,
            fitness_score: 9.0,
            detailed_analysis: DetailedAnalysis::default(),
        }
    }

    #[tokio::test]
    async fn test_new_analysis_starts_uploading_without_scores() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(new_analysis(Uuid::new_v4(), "a.mp4"))
            .await
            .unwrap();
        assert_eq!(record.status(), Some(AnalysisStatus::Uploading));
        assert_eq!(record.payment_status, "pending");
        assert!(record.overall_score.is_none());
        assert!(record.world_ranking.is_none());
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_scoped_to_user() {
        let store = MemoryAnalysisStore::new();
        let user = Uuid::new_v4();
        let first = store.create_analysis(new_analysis(user, "1.mp4")).await.unwrap();
        let second = store.create_analysis(new_analysis(user, "2.mp4")).await.unwrap();
        store
            .create_analysis(new_analysis(Uuid::new_v4(), "other.mp4"))
            .await
            .unwrap();

        let listed = store.list_analyses_for_user(user).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_begin_processing_only_once() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(new_analysis(Uuid::new_v4(), "a.mp4"))
            .await
            .unwrap();

        let started = store.begin_processing(record.id).await.unwrap().unwrap();
        assert_eq!(started.status(), Some(AnalysisStatus::Processing));
        assert_eq!(started.payment_status, "paid");

        assert!(store.begin_processing(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_sets_every_result_field() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(new_analysis(Uuid::new_v4(), "a.mp4"))
            .await
            .unwrap();
        store.begin_processing(record.id).await.unwrap();

        let done = store
            .complete_analysis(record.id, &sample_result())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status(), Some(AnalysisStatus::Completed));
        assert_eq!(done.world_ranking, Some(450));
        assert_eq!(done.overall_score, Some(9.1));
        assert!(done.completed_at.is_some());
        assert_eq!(done.detailed_analysis(), Some(DetailedAnalysis::default()));
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(new_analysis(Uuid::new_v4(), "a.mp4"))
            .await
            .unwrap();
        assert!(store
            .complete_analysis(record.id, &sample_result())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_payment_failure_does_not_override_paid() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(new_analysis(Uuid::new_v4(), "a.mp4"))
            .await
            .unwrap();
        store.begin_processing(record.id).await.unwrap();
        assert!(store.mark_payment_failed(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_payment_intent() {
        let store = MemoryAnalysisStore::new();
        let record = store
            .create_analysis(new_analysis(Uuid::new_v4(), "a.mp4"))
            .await
            .unwrap();
        store
            .attach_payment_intent(record.id, "pi_123")
            .await
            .unwrap();
        let found = store.find_by_payment_intent("pi_123").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(store.find_by_payment_intent("pi_999").await.unwrap().is_none());
    }
}
