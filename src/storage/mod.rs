// Durable storage contract for sets, reps and sessions
//
// The real backend (a hosted Postgres behind a REST API) lives outside this
// crate. `InMemoryRepStore` backs offline demos and tests.

mod error;
mod retry;

pub use error::StorageError;
pub use retry::{RetryConfig, Transient};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ActiveSetData, FormGrade, RepRecord, SessionStats};

/// Fields changed on an existing set row; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUpdate {
    pub completed_reps: Option<u32>,
    pub ended_at: Option<DateTime<Utc>>,
    pub form_quality: Option<FormGrade>,
}

/// Durable storage used by the session logger
///
/// Every call may fail; callers treat failures as non-fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepStore: Send + Sync {
    /// Create a set row and return its identifier
    async fn create_set(&self, set: &ActiveSetData) -> Result<String, StorageError>;

    /// Insert a batch of rep records for a set
    async fn insert_reps(&self, set_id: &str, reps: &[RepRecord]) -> Result<(), StorageError>;

    /// Update columns of an existing set
    async fn update_set(&self, set_id: &str, update: SetUpdate) -> Result<(), StorageError>;

    /// Create a workout session row and return its identifier
    async fn create_session(
        &self,
        user_id: &str,
        plan_id: Option<String>,
    ) -> Result<String, StorageError>;

    /// Write final aggregates and optional summary text for a session
    async fn finalize_session(
        &self,
        session_id: &str,
        stats: &SessionStats,
        summary: Option<String>,
    ) -> Result<(), StorageError>;
}

/// Stored set row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSet {
    pub id: String,
    pub data: ActiveSetData,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completed_reps: Option<u32>,
    pub form_quality: Option<FormGrade>,
}

/// Stored session row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: String,
    pub user_id: String,
    pub plan_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub stats: Option<SessionStats>,
    pub ai_summary: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    sets: HashMap<String, StoredSet>,
    reps: HashMap<String, Vec<RepRecord>>,
    sessions: HashMap<String, StoredSession>,
}

/// In-process store with outage simulation
#[derive(Debug, Clone)]
pub struct InMemoryRepStore {
    state: Arc<RwLock<StoreState>>,
    available: Arc<AtomicBool>,
    failures_remaining: Arc<AtomicU32>,
}

impl InMemoryRepStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            available: Arc::new(AtomicBool::new(true)),
            failures_remaining: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Toggle a full outage; every request fails while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail the next `count` requests, then recover
    pub fn fail_next_requests(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".to_string()));
        }

        let consumed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }

        Ok(())
    }

    /// Rep records persisted for a set, in insertion order
    pub async fn reps_for(&self, set_id: &str) -> Vec<RepRecord> {
        self.state
            .read()
            .await
            .reps
            .get(set_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set(&self, set_id: &str) -> Option<StoredSet> {
        self.state.read().await.sets.get(set_id).cloned()
    }

    pub async fn session(&self, session_id: &str) -> Option<StoredSession> {
        self.state.read().await.sessions.get(session_id).cloned()
    }

    pub async fn set_count(&self) -> usize {
        self.state.read().await.sets.len()
    }
}

impl Default for InMemoryRepStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepStore for InMemoryRepStore {
    async fn create_set(&self, set: &ActiveSetData) -> Result<String, StorageError> {
        self.check_available()?;

        let id = Uuid::new_v4().to_string();
        self.state.write().await.sets.insert(
            id.clone(),
            StoredSet {
                id: id.clone(),
                data: set.clone(),
                started_at: Utc::now(),
                ended_at: None,
                completed_reps: None,
                form_quality: None,
            },
        );
        Ok(id)
    }

    async fn insert_reps(&self, set_id: &str, reps: &[RepRecord]) -> Result<(), StorageError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        if !state.sets.contains_key(set_id) {
            return Err(StorageError::NotFound(format!("set {}", set_id)));
        }

        // Rep numbers are unique within a set
        let stored = state.reps.entry(set_id.to_string()).or_default();
        let mut seen: HashSet<u32> = stored.iter().map(|r| r.rep_number).collect();
        if let Some(duplicate) = reps.iter().find(|r| !seen.insert(r.rep_number)) {
            return Err(StorageError::Rejected(format!(
                "rep {} already stored for set {}",
                duplicate.rep_number, set_id
            )));
        }
        stored.extend_from_slice(reps);
        Ok(())
    }

    async fn update_set(&self, set_id: &str, update: SetUpdate) -> Result<(), StorageError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        let set = state
            .sets
            .get_mut(set_id)
            .ok_or_else(|| StorageError::NotFound(format!("set {}", set_id)))?;

        if let Some(completed_reps) = update.completed_reps {
            set.completed_reps = Some(completed_reps);
        }
        if let Some(ended_at) = update.ended_at {
            set.ended_at = Some(ended_at);
        }
        if let Some(form_quality) = update.form_quality {
            set.form_quality = Some(form_quality);
        }
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: &str,
        plan_id: Option<String>,
    ) -> Result<String, StorageError> {
        self.check_available()?;

        let id = Uuid::new_v4().to_string();
        self.state.write().await.sessions.insert(
            id.clone(),
            StoredSession {
                id: id.clone(),
                user_id: user_id.to_string(),
                plan_id,
                started_at: Utc::now(),
                ended_at: None,
                stats: None,
                ai_summary: None,
            },
        );
        Ok(id)
    }

    async fn finalize_session(
        &self,
        session_id: &str,
        stats: &SessionStats,
        summary: Option<String>,
    ) -> Result<(), StorageError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StorageError::NotFound(format!("session {}", session_id)))?;

        session.ended_at = Some(Utc::now());
        session.stats = Some(stats.clone());
        session.ai_summary = summary;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormQuality;
    use std::collections::BTreeMap;

    fn set_data(session_id: &str) -> ActiveSetData {
        ActiveSetData {
            session_id: session_id.to_string(),
            exercise_id: "ex-curl".to_string(),
            exercise_name: "Bicep Curl".to_string(),
            set_number: 1,
            weight: Some(25.0),
            target_reps: Some(10),
        }
    }

    fn rep(n: u32) -> RepRecord {
        RepRecord {
            rep_number: n,
            joint_angles: BTreeMap::new(),
            tempo_seconds: 1.0,
            form_quality: FormQuality::Good,
        }
    }

    #[tokio::test]
    async fn test_set_lifecycle() {
        let store = InMemoryRepStore::new();
        let session_id = store.create_session("user-1", None).await.unwrap();
        let set_id = store.create_set(&set_data(&session_id)).await.unwrap();

        store.insert_reps(&set_id, &[rep(1), rep(2)]).await.unwrap();
        store.insert_reps(&set_id, &[rep(3)]).await.unwrap();
        store
            .update_set(
                &set_id,
                SetUpdate {
                    completed_reps: Some(3),
                    ended_at: Some(Utc::now()),
                    form_quality: None,
                },
            )
            .await
            .unwrap();

        let numbers: Vec<u32> = store.reps_for(&set_id).await.iter().map(|r| r.rep_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let stored = store.set(&set_id).await.unwrap();
        assert_eq!(stored.completed_reps, Some(3));
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_set_is_rejected() {
        let store = InMemoryRepStore::new();
        let err = store.insert_reps("missing", &[rep(1)]).await.unwrap_err();
        assert_eq!(err, StorageError::NotFound("set missing".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_rep_numbers_are_rejected() {
        let store = InMemoryRepStore::new();
        let set_id = store.create_set(&set_data("s")).await.unwrap();
        store.insert_reps(&set_id, &[rep(1), rep(2)]).await.unwrap();

        let err = store.insert_reps(&set_id, &[rep(3), rep(2)]).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert!(!err.is_transient());

        let err = store.insert_reps(&set_id, &[rep(4), rep(4)]).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));

        let numbers: Vec<u32> = store.reps_for(&set_id).await.iter().map(|r| r.rep_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_injected_failures_recover() {
        let store = InMemoryRepStore::new();
        store.fail_next_requests(2);

        assert!(store.create_session("user-1", None).await.is_err());
        assert!(store.create_session("user-1", None).await.is_err());
        assert!(store.create_session("user-1", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_outage() {
        let store = InMemoryRepStore::new();
        store.set_available(false);
        let err = store.create_set(&set_data("s")).await.unwrap_err();
        assert!(err.is_transient());

        store.set_available(true);
        assert!(store.create_set(&set_data("s")).await.is_ok());
    }

    #[tokio::test]
    async fn test_finalize_session() {
        let store = InMemoryRepStore::new();
        let id = store.create_session("user-1", Some("plan-a".to_string())).await.unwrap();
        let stats = SessionStats {
            total_reps: 20,
            total_sets: 2,
            total_volume: 500.0,
            duration_seconds: 600,
        };

        store
            .finalize_session(&id, &stats, Some("Solid session".to_string()))
            .await
            .unwrap();

        let session = store.session(&id).await.unwrap();
        assert_eq!(session.plan_id.as_deref(), Some("plan-a"));
        assert_eq!(session.stats, Some(stats));
        assert_eq!(session.ai_summary.as_deref(), Some("Solid session"));
    }
}
