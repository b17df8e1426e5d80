/// Workout session lifecycle and the live tracking pipeline
///
/// `SessionTracker` owns the session row and its aggregates.
/// `WorkoutPipeline` wires frame processing, rep logging and audio cues for
/// the single active set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

use crate::models::{ActiveSetData, FormGrade, FormQuality, RepPhase, SessionStats, TrackingStatus};
use crate::services::audio_cues::AudioCueDispatcher;
use crate::services::exercise_detector::{detector_for, GENERIC};
use crate::services::pose_frame_processor::{
    FrameOutcome, FrameProcessorConfig, PoseFrameProcessor, PoseSource,
};
use crate::services::session_logger::{SessionLogger, SetOutcome};
use crate::storage::{RepStore, RetryConfig, StorageError};

/// Identifier of a workout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: String,
    /// Never written to durable storage
    pub local: bool,
}

/// Create a session row, falling back to a local identifier
pub async fn create_session(
    store: Option<&Arc<dyn RepStore>>,
    user_id: &str,
    plan_id: Option<String>,
) -> SessionHandle {
    match store {
        Some(store) => match store.create_session(user_id, plan_id).await {
            Ok(id) => {
                tracing::info!(session_id = %id, user_id, "Workout session created");
                return SessionHandle { id, local: false };
            }
            Err(e) => {
                tracing::error!(error = %e, user_id, "Failed to create session, using a local session");
            }
        },
        None => {
            tracing::warn!(user_id, "Durable storage not configured, using a local session");
        }
    }

    SessionHandle {
        id: format!("local-{}", Utc::now().timestamp_millis()),
        local: true,
    }
}

/// Aggregates sets into session totals and finalizes the session
pub struct SessionTracker {
    store: Option<Arc<dyn RepStore>>,
    retry: RetryConfig,
    session: SessionHandle,
    started: Instant,
    stats: SessionStats,
    finalized: bool,
}

impl SessionTracker {
    pub async fn start(
        store: Option<Arc<dyn RepStore>>,
        retry: RetryConfig,
        user_id: &str,
        plan_id: Option<String>,
    ) -> Self {
        let session = create_session(store.as_ref(), user_id, plan_id).await;
        Self {
            store,
            retry,
            session,
            started: Instant::now(),
            stats: SessionStats::default(),
            finalized: false,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    /// Add a finished set to the totals; empty sets are not counted
    pub fn record_set(&mut self, outcome: &SetOutcome) {
        if outcome.completed_reps == 0 {
            tracing::debug!(set_number = outcome.set_number, "Skipping empty set");
            return;
        }

        self.stats.total_sets += 1;
        self.stats.total_reps += outcome.completed_reps;
        self.stats.total_volume += outcome.volume();
    }

    /// Current totals with the elapsed duration
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            duration_seconds: self.started.elapsed().as_secs(),
            ..self.stats.clone()
        }
    }

    /// Write final totals and optional summary text
    ///
    /// Local sessions finalize in memory and always succeed.
    pub async fn finalize_session(
        &mut self,
        summary: Option<String>,
    ) -> Result<SessionStats, StorageError> {
        let stats = self.stats();

        if self.finalized {
            tracing::warn!(session_id = %self.session.id, "Session already finalized");
            return Ok(stats);
        }

        match self.store.as_ref().filter(|_| !self.session.local) {
            Some(store) => {
                let session_id = self.session.id.clone();
                self.retry
                    .execute(|| store.finalize_session(&session_id, &stats, summary.clone()))
                    .await
                    .map_err(|e| {
                        tracing::error!(session_id = %session_id, error = %e, "Failed to finalize session");
                        e
                    })?;
            }
            None => {
                tracing::info!(session_id = %self.session.id, "Local session finalized");
            }
        }

        self.finalized = true;
        tracing::info!(
            session_id = %self.session.id,
            total_reps = stats.total_reps,
            total_sets = stats.total_sets,
            total_volume = stats.total_volume,
            duration_seconds = stats.duration_seconds,
            "Session finalized"
        );
        Ok(stats)
    }
}

/// Read-only view of the tracker for UI and telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub exercise: String,
    pub phase: RepPhase,
    pub tracking_status: TrackingStatus,
    pub rep_count: u32,
    pub elapsed_seconds: u64,
    pub is_syncing: bool,
    pub last_sync_failed: bool,
    pub local_only: bool,
}

/// Frame-driven tracking pipeline for one set at a time
pub struct WorkoutPipeline<S: PoseSource> {
    processor: PoseFrameProcessor<S>,
    logger: SessionLogger,
    cues: AudioCueDispatcher,
    set_active: bool,
    set_started_ms: Option<u64>,
    last_frame_ms: Option<u64>,
    rep_qualities: Vec<FormQuality>,
}

impl<S: PoseSource> WorkoutPipeline<S> {
    pub fn new(
        source: S,
        config: FrameProcessorConfig,
        logger: SessionLogger,
        cues: AudioCueDispatcher,
    ) -> Self {
        Self {
            processor: PoseFrameProcessor::new(source, GENERIC, config),
            logger,
            cues,
            set_active: false,
            set_started_ms: None,
            last_frame_ms: None,
            rep_qualities: Vec::new(),
        }
    }

    pub fn processor(&self) -> &PoseFrameProcessor<S> {
        &self.processor
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    /// Process one camera frame; never blocks on storage
    pub fn on_frame(&mut self, frame: &S::Frame, timestamp_ms: u64) -> FrameOutcome {
        let mut outcome = self.processor.process_frame(frame, timestamp_ms);
        self.last_frame_ms = Some(timestamp_ms);
        if self.set_active {
            self.set_started_ms.get_or_insert(timestamp_ms);
        }

        self.cues.on_tracking_status(outcome.status, timestamp_ms);

        if let Some(rep) = outcome.rep.as_mut() {
            self.rep_qualities.push(rep.form_quality);
            if self.set_active {
                if let Some(set_rep) = self.logger.log_rep(rep.clone()) {
                    rep.rep_number = set_rep;
                }
            }
            self.cues.on_rep_completed(rep.rep_number);
        }

        outcome
    }

    /// Start a set: pick the exercise profile, reset the rep cycle, register the set
    pub async fn start_set(&mut self, data: ActiveSetData) -> Option<String> {
        self.processor.set_profile(detector_for(&data.exercise_name));
        self.reset_rep_count();
        self.rep_qualities.clear();
        self.set_active = true;
        self.set_started_ms = None;

        self.logger.start_set(data).await
    }

    /// Grade, flush and finalize the active set
    pub async fn end_set(&mut self) -> Option<SetOutcome> {
        if let Some(grade) = FormGrade::from_rep_qualities(&self.rep_qualities) {
            self.logger.update_form_quality(grade).await;
        }

        let outcome = self.logger.end_set().await;
        self.set_active = false;

        if let Some(outcome) = &outcome {
            self.cues.on_set_completed(outcome.completed_reps);
            tracing::info!(
                exercise = %outcome.exercise_name,
                set_number = outcome.set_number,
                completed_reps = outcome.completed_reps,
                unsynced_reps = outcome.unsynced_reps,
                "Set ended"
            );
        }

        self.reset_rep_count();
        self.rep_qualities.clear();
        outcome
    }

    /// Restart the rep cycle immediately
    ///
    /// Reps already logged stay in the set and later reps continue its numbering.
    pub fn reset_rep_count(&mut self) {
        self.processor.reset_rep_count();
    }

    /// Reps in the active set, or the detector's count between sets
    pub fn rep_count(&self) -> u32 {
        if self.set_active {
            self.logger.rep_count()
        } else {
            self.processor.rep_count()
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let elapsed_ms = match (self.set_started_ms, self.last_frame_ms) {
            (Some(start), Some(last)) => last.saturating_sub(start),
            _ => 0,
        };

        TrackerSnapshot {
            exercise: self.processor.profile().name.to_string(),
            phase: self.processor.phase(),
            tracking_status: self.processor.tracking_status(),
            rep_count: self.rep_count(),
            elapsed_seconds: elapsed_ms / 1000,
            is_syncing: self.logger.is_syncing(),
            last_sync_failed: self.logger.last_sync_failed(),
            local_only: self.logger.is_local_only(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio_cues::{AudioCue, ChannelCueSink};
    use crate::services::pose_frame_processor::ScriptedPoseSource;
    use crate::services::session_logger::SessionLoggerConfig;
    use crate::services::synthetic_pose::{pose_at_angle, rep_trajectory};
    use crate::services::exercise_detector::SQUAT;
    use crate::storage::{InMemoryRepStore, MockRepStore};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::unbounded_channel;

    fn outcome(reps: u32, weight: Option<f64>) -> SetOutcome {
        SetOutcome {
            set_id: None,
            exercise_name: "Squat".to_string(),
            set_number: 1,
            weight,
            completed_reps: reps,
            synced_reps: 0,
            unsynced_reps: reps as usize,
            finalized: false,
            local_only: true,
        }
    }

    #[tokio::test]
    async fn test_create_session_without_store_is_local() {
        let handle = create_session(None, "user-1", None).await;
        assert!(handle.local);
        assert!(handle.id.starts_with("local-"));
    }

    #[tokio::test]
    async fn test_create_session_failure_falls_back() {
        let mut store = MockRepStore::new();
        store
            .expect_create_session()
            .times(1)
            .returning(|_, _| Err(StorageError::Unavailable("timeout".to_string())));
        let store: Arc<dyn RepStore> = Arc::new(store);

        let handle = create_session(Some(&store), "user-1", Some("plan".to_string())).await;
        assert!(handle.local);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_totals_and_finalize() {
        let store = InMemoryRepStore::new();
        let shared: Arc<dyn RepStore> = Arc::new(store.clone());
        let mut tracker =
            SessionTracker::start(Some(shared), RetryConfig::default(), "user-1", None).await;
        assert!(!tracker.session().local);

        tracker.record_set(&outcome(10, Some(60.0)));
        tracker.record_set(&outcome(8, Some(70.0)));
        tracker.record_set(&outcome(0, Some(70.0)));
        tracker.record_set(&outcome(12, None));
        tokio::time::advance(std::time::Duration::from_secs(90)).await;

        let stats = tracker
            .finalize_session(Some("Strong legs day".to_string()))
            .await
            .unwrap();
        assert_eq!(
            stats,
            SessionStats {
                total_reps: 30,
                total_sets: 3,
                total_volume: 1160.0,
                duration_seconds: 90,
            }
        );

        let stored = store.session(tracker.session_id()).await.unwrap();
        assert_eq!(stored.stats, Some(stats));
        assert_eq!(stored.ai_summary.as_deref(), Some("Strong legs day"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_retries_then_reports_failure() {
        let mut store = MockRepStore::new();
        store
            .expect_create_session()
            .returning(|_, _| Ok("session-9".to_string()));
        store
            .expect_finalize_session()
            .times(3)
            .returning(|_, _, _| Err(StorageError::Unavailable("down".to_string())));

        let mut tracker =
            SessionTracker::start(Some(Arc::new(store)), RetryConfig::default(), "user-1", None)
                .await;
        let result = tracker.finalize_session(None).await;
        assert_eq!(result, Err(StorageError::Unavailable("down".to_string())));
    }

    #[tokio::test]
    async fn test_local_session_finalizes_locally() {
        let mut tracker = SessionTracker::start(None, RetryConfig::none(), "user-1", None).await;
        tracker.record_set(&outcome(5, Some(20.0)));

        let stats = tracker.finalize_session(None).await.unwrap();
        assert_eq!(stats.total_volume, 100.0);
        assert!(tracker.finalize_session(None).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_counts_logs_and_cues() {
        let trajectory = rep_trajectory(&SQUAT, 3, 30);
        let frames = trajectory.len();
        let poses = trajectory
            .iter()
            .enumerate()
            .map(|(i, a)| Some(pose_at_angle(&SQUAT, *a, i as u64 * 33)));

        let store = InMemoryRepStore::new();
        let logger = SessionLogger::new(Some(Arc::new(store.clone())), SessionLoggerConfig::default());
        let (tx, mut rx) = unbounded_channel();
        let cues = AudioCueDispatcher::new(Arc::new(ChannelCueSink::new(tx)));
        let mut pipeline = WorkoutPipeline::new(
            ScriptedPoseSource::new(poses),
            FrameProcessorConfig::default(),
            logger,
            cues,
        );

        let set_id = pipeline
            .start_set(ActiveSetData {
                session_id: "session-1".to_string(),
                exercise_id: "ex-squat".to_string(),
                exercise_name: "Goblet Squat".to_string(),
                set_number: 1,
                weight: Some(24.0),
                target_reps: Some(3),
            })
            .await
            .unwrap();
        assert_eq!(pipeline.snapshot().exercise, "Squat");

        for i in 0..frames {
            pipeline.on_frame(&(), i as u64 * 33);
        }

        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.rep_count, 3);
        assert_eq!(snapshot.tracking_status, TrackingStatus::Tracking);
        assert_eq!(snapshot.elapsed_seconds, (frames as u64 - 1) * 33 / 1000);

        let outcome = pipeline.end_set().await.unwrap();
        assert_eq!(outcome.completed_reps, 3);
        assert_eq!(outcome.unsynced_reps, 0);
        assert_eq!(store.reps_for(&set_id).await.len(), 3);
        assert_eq!(
            store.set(&set_id).await.unwrap().form_quality,
            Some(FormGrade::Excellent)
        );
        assert_eq!(pipeline.snapshot().rep_count, 0);

        let mut cues = Vec::new();
        while let Ok(cue) = rx.try_recv() {
            cues.push(cue);
        }
        assert_eq!(
            cues,
            vec![
                AudioCue::RepComplete { rep_number: 1 },
                AudioCue::RepComplete { rep_number: 2 },
                AudioCue::RepComplete { rep_number: 3 },
                AudioCue::SetComplete { reps: 3 },
            ]
        );
    }
}
