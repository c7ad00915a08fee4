//! Process-local session store.
//!
//! Sessions never expire and are lost on restart. Updates are plain
//! read-modify-write: two concurrent requests for the same session can
//! overwrite each other's changes.

use crate::errors::AppError;
use crate::models::{BasicInfo, ExtractionResult, RiskAssessment, Session};
use moka::future::Cache;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, Session>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Cache::builder().build(),
        }
    }

    /// Creates a session with a random UUID v4 identifier.
    pub async fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        self.sessions
            .insert(session.id.clone(), session.clone())
            .await;
        tracing::info!("Session {} created", session.id);
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).await
    }

    /// Looks up a session, mapping absent or blank ids to `NotFound`.
    pub async fn require(&self, session_id: Option<&str>) -> Result<Session, AppError> {
        let id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;

        self.get(id)
            .await
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))
    }

    pub async fn exists(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub async fn set_basic_info(&self, session_id: &str, info: BasicInfo) -> Result<(), AppError> {
        self.update(session_id, |s| s.basic_info = Some(info)).await
    }

    /// Records a document upload. Clears the previous extraction so a failed
    /// pipeline run does not leave stale fields behind.
    pub async fn set_document(&self, session_id: &str, path: PathBuf) -> Result<(), AppError> {
        self.update(session_id, |s| {
            s.document_path = Some(path);
            s.extraction = None;
            s.doc_confidence = None;
        })
        .await
    }

    pub async fn set_extraction(
        &self,
        session_id: &str,
        extraction: ExtractionResult,
    ) -> Result<(), AppError> {
        self.update(session_id, |s| {
            s.doc_confidence = Some(extraction.confidence);
            s.extraction = Some(extraction);
        })
        .await
    }

    pub async fn set_selfie(&self, session_id: &str, path: PathBuf) -> Result<(), AppError> {
        self.update(session_id, |s| s.selfie_path = Some(path)).await
    }

    pub async fn set_match_score(&self, session_id: &str, score: f64) -> Result<(), AppError> {
        self.update(session_id, |s| s.match_score = Some(score)).await
    }

    /// Stores a risk result. `inputs` carries the doc confidence and match
    /// score used, when the caller wants them recorded too.
    pub async fn record_risk(
        &self,
        session_id: &str,
        risk: &RiskAssessment,
        inputs: Option<(f64, f64)>,
    ) -> Result<(), AppError> {
        self.update(session_id, |s| {
            s.risk_score = Some(risk.score);
            s.risk_level = Some(risk.level);
            if let Some((doc_confidence, match_score)) = inputs {
                s.doc_confidence = Some(doc_confidence);
                s.match_score = Some(match_score);
            }
        })
        .await
    }

    async fn update<F>(&self, session_id: &str, apply: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self
            .get(session_id)
            .await
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;
        apply(&mut session);
        self.sessions.insert(session_id.to_string(), session).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new();
        let session = store.create().await;

        assert!(Uuid::parse_str(&session.id).is_ok());
        assert!(store.exists(&session.id).await);
        assert_eq!(store.get(&session.id).await.unwrap().id, session.id);
    }

    #[tokio::test]
    async fn test_require_rejects_missing_and_blank_ids() {
        let store = SessionStore::new();

        for id in [None, Some(""), Some("   "), Some("unknown")] {
            let err = store.require(id).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_later_uploads_overwrite() {
        let store = SessionStore::new();
        let id = store.create().await.id;

        store.set_document(&id, PathBuf::from("a.png")).await.unwrap();
        store.set_document(&id, PathBuf::from("b.png")).await.unwrap();

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.document_path, Some(PathBuf::from("b.png")));
    }

    #[tokio::test]
    async fn test_record_risk_with_inputs() {
        let store = SessionStore::new();
        let id = store.create().await.id;
        let risk = RiskAssessment {
            score: 0.54,
            level: RiskLevel::Medium,
            explanation: String::new(),
        };

        store.record_risk(&id, &risk, Some((0.9, 0.8))).await.unwrap();

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.risk_level, Some(RiskLevel::Medium));
        assert_eq!(session.doc_confidence, Some(0.9));
        assert_eq!(session.match_score, Some(0.8));
    }

    #[tokio::test]
    async fn test_update_unknown_session() {
        let store = SessionStore::new();
        let err = store
            .set_selfie("missing", PathBuf::from("s.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
