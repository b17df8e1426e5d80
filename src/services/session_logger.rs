/// Session Logger
///
/// Buffers completed reps for the active set and syncs them to durable
/// storage in batches, off the frame-processing path:
/// - `log_rep` is synchronous and only schedules a background sync
/// - a failed batch is put back in front of any newer reps, so nothing is
///   lost and per-set ordering is preserved
/// - `end_set` waits for in-flight syncs, flushes with retry, then finalizes
///
/// Without a store (offline mode) or without a set identifier (storage was
/// unreachable at set start) the set is tracked locally and reported as such.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{ActiveSetData, FormGrade, RepRecord};
use crate::storage::{RepStore, RetryConfig, SetUpdate, StorageError};

/// Logger timing configuration
#[derive(Debug, Clone)]
pub struct SessionLoggerConfig {
    /// Minimum spacing between background syncs
    pub sync_interval: Duration,
    /// Backoff used for set-boundary writes
    pub retry: RetryConfig,
}

impl Default for SessionLoggerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_millis(5000),
            retry: RetryConfig::default(),
        }
    }
}

/// Set currently being tracked
#[derive(Debug, Clone)]
pub struct ActiveSet {
    pub data: ActiveSetData,
    /// Storage identifier; `None` while local-only
    pub set_id: Option<String>,
    pub rep_count: u32,
    buffer: Vec<RepRecord>,
    synced_reps: usize,
    generation: u64,
}

/// Summary of a finished set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOutcome {
    pub set_id: Option<String>,
    pub exercise_name: String,
    pub set_number: u32,
    pub weight: Option<f64>,
    pub completed_reps: u32,
    /// Records durably stored
    pub synced_reps: usize,
    /// Records that could not be stored and were dropped with the set
    pub unsynced_reps: usize,
    /// The set row was updated with its final rep count
    pub finalized: bool,
    /// The set never had a storage identifier
    pub local_only: bool,
}

impl SetOutcome {
    /// Training volume of the set (weight x reps)
    pub fn volume(&self) -> f64 {
        self.weight.unwrap_or(0.0) * self.completed_reps as f64
    }
}

#[derive(Debug, Default)]
struct LoggerState {
    active: Option<ActiveSet>,
    last_sync_at: Option<Instant>,
    generation: u64,
}

/// Rep buffer and storage sync for the active set
#[derive(Clone)]
pub struct SessionLogger {
    store: Option<Arc<dyn RepStore>>,
    config: SessionLoggerConfig,
    state: Arc<Mutex<LoggerState>>,
    sync_gate: Arc<tokio::sync::Mutex<()>>,
    is_syncing: Arc<AtomicBool>,
    last_sync_failed: Arc<AtomicBool>,
}

impl SessionLogger {
    /// Create a logger; `None` runs in offline mode
    pub fn new(store: Option<Arc<dyn RepStore>>, config: SessionLoggerConfig) -> Self {
        if store.is_none() {
            tracing::warn!("Durable storage not configured, reps will be tracked locally only");
        }

        Self {
            store,
            config,
            state: Arc::new(Mutex::new(LoggerState::default())),
            sync_gate: Arc::new(tokio::sync::Mutex::new(())),
            is_syncing: Arc::new(AtomicBool::new(false)),
            last_sync_failed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a logger without durable storage
    pub fn offline() -> Self {
        Self::new(None, SessionLoggerConfig::default())
    }

    fn lock_state(&self) -> MutexGuard<'_, LoggerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin tracking a set and register it with storage
    ///
    /// Returns the storage identifier, or `None` when the set runs local-only.
    /// A set that is still active is ended first.
    pub async fn start_set(&self, data: ActiveSetData) -> Option<String> {
        let has_active = self.lock_state().active.is_some();
        if has_active {
            tracing::warn!("Starting a new set while another is active, ending it first");
            self.end_set().await;
        }

        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.active = Some(ActiveSet {
                data: data.clone(),
                set_id: None,
                rep_count: 0,
                buffer: Vec::new(),
                synced_reps: 0,
                generation: state.generation,
            });
            state.generation
        };

        let store = self.store.as_ref()?;

        match store.create_set(&data).await {
            Ok(set_id) => {
                let mut state = self.lock_state();
                match state.active.as_mut() {
                    Some(active) if active.generation == generation => {
                        active.set_id = Some(set_id.clone());
                        tracing::info!(
                            set_id = %set_id,
                            exercise = %data.exercise_name,
                            set_number = data.set_number,
                            "Set created"
                        );
                        Some(set_id)
                    }
                    _ => {
                        tracing::warn!(set_id = %set_id, "Set ended before storage confirmed it");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    exercise = %data.exercise_name,
                    "Failed to create set, continuing in local-only mode"
                );
                self.last_sync_failed.store(true, Ordering::SeqCst);
                None
            }
        }
    }

    /// Record a completed rep; schedules a background sync when one is due
    ///
    /// The record is renumbered to its position in the set, so numbering
    /// survives a mid-set reset of the detector. Returns that number, which
    /// is also the set's rep count, or `None` when no set is active.
    pub fn log_rep(&self, mut rep: RepRecord) -> Option<u32> {
        let (rep_count, sync_due) = {
            let mut state = self.lock_state();
            let last_sync_at = state.last_sync_at;
            let Some(active) = state.active.as_mut() else {
                tracing::warn!(rep_number = rep.rep_number, "Rep logged without an active set");
                return None;
            };

            active.rep_count += 1;
            if rep.rep_number != active.rep_count {
                tracing::debug!(
                    detected = rep.rep_number,
                    set_rep = active.rep_count,
                    "Renumbering rep within set"
                );
                rep.rep_number = active.rep_count;
            }
            active.buffer.push(rep);

            let sync_due = self.store.is_some()
                && active.set_id.is_some()
                && last_sync_at.map_or(true, |t| t.elapsed() >= self.config.sync_interval);
            let rep_count = active.rep_count;

            if sync_due {
                state.last_sync_at = Some(Instant::now());
            }
            (rep_count, sync_due)
        };

        if sync_due {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let logger = self.clone();
                    handle.spawn(async move {
                        let _ = logger.sync_rep_data().await;
                    });
                }
                Err(_) => {
                    tracing::debug!("No async runtime, deferring rep sync to set end");
                }
            }
        }

        Some(rep_count)
    }

    /// Push buffered reps to storage as one batch
    ///
    /// Returns the number of records stored. On failure the batch is put back
    /// in front of the buffer, unless its set has since ended.
    pub async fn sync_rep_data(&self) -> Result<usize, StorageError> {
        let Some(store) = self.store.clone() else {
            return Ok(0);
        };

        let _gate = self.sync_gate.lock().await;

        let (set_id, generation, batch) = {
            let mut state = self.lock_state();
            state.last_sync_at = Some(Instant::now());
            let Some(active) = state.active.as_mut() else {
                return Ok(0);
            };
            let Some(set_id) = active.set_id.clone() else {
                return Ok(0);
            };
            if active.buffer.is_empty() {
                return Ok(0);
            }
            (set_id, active.generation, std::mem::take(&mut active.buffer))
        };

        self.is_syncing.store(true, Ordering::SeqCst);
        let result = store.insert_reps(&set_id, &batch).await;
        self.is_syncing.store(false, Ordering::SeqCst);

        let mut state = self.lock_state();
        let active = state
            .active
            .as_mut()
            .filter(|active| active.generation == generation);

        match result {
            Ok(()) => {
                if let Some(active) = active {
                    active.synced_reps += batch.len();
                }
                self.last_sync_failed.store(false, Ordering::SeqCst);
                tracing::debug!(set_id = %set_id, count = batch.len(), "Synced reps");
                Ok(batch.len())
            }
            Err(e) => {
                tracing::error!(set_id = %set_id, error = %e, "Failed to sync reps");
                match active {
                    Some(active) => {
                        let newer = std::mem::replace(&mut active.buffer, batch);
                        active.buffer.extend(newer);
                    }
                    None => {
                        tracing::warn!(
                            set_id = %set_id,
                            count = batch.len(),
                            "Set was reset during sync, failed batch not restored"
                        );
                    }
                }
                self.last_sync_failed.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Flush remaining reps, finalize the set in storage and clear it
    pub async fn end_set(&self) -> Option<SetOutcome> {
        // Wait for any in-flight sync so its failed batch is back in the buffer
        let _gate = self.sync_gate.lock().await;

        let mut active = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.active.take()
        }?;

        let mut finalized = false;

        if let Some(store) = self.store.as_ref() {
            if active.set_id.is_none() {
                match self.config.retry.execute(|| store.create_set(&active.data)).await {
                    Ok(set_id) => {
                        tracing::info!(set_id = %set_id, "Set registered at set end");
                        active.set_id = Some(set_id);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Set could not be registered with storage");
                    }
                }
            }

            if let Some(set_id) = active.set_id.clone() {
                if !active.buffer.is_empty() {
                    self.is_syncing.store(true, Ordering::SeqCst);
                    let result = self
                        .config
                        .retry
                        .execute(|| store.insert_reps(&set_id, &active.buffer))
                        .await;
                    self.is_syncing.store(false, Ordering::SeqCst);

                    match result {
                        Ok(()) => {
                            active.synced_reps += active.buffer.len();
                            active.buffer.clear();
                            self.last_sync_failed.store(false, Ordering::SeqCst);
                        }
                        Err(e) => {
                            tracing::error!(set_id = %set_id, error = %e, "Final rep sync failed");
                            self.last_sync_failed.store(true, Ordering::SeqCst);
                        }
                    }
                }

                let update = SetUpdate {
                    completed_reps: Some(active.rep_count),
                    ended_at: Some(Utc::now()),
                    form_quality: None,
                };
                match self
                    .config
                    .retry
                    .execute(|| store.update_set(&set_id, update.clone()))
                    .await
                {
                    Ok(()) => {
                        finalized = true;
                        tracing::info!(
                            set_id = %set_id,
                            completed_reps = active.rep_count,
                            "Set finalized"
                        );
                    }
                    Err(e) => {
                        tracing::error!(set_id = %set_id, error = %e, "Failed to finalize set");
                    }
                }
            }
        }

        if !active.buffer.is_empty() {
            tracing::warn!(
                count = active.buffer.len(),
                exercise = %active.data.exercise_name,
                set_number = active.data.set_number,
                "Set ended with reps that were never stored"
            );
        }

        Some(SetOutcome {
            local_only: active.set_id.is_none(),
            set_id: active.set_id,
            exercise_name: active.data.exercise_name,
            set_number: active.data.set_number,
            weight: active.data.weight,
            completed_reps: active.rep_count,
            synced_reps: active.synced_reps,
            unsynced_reps: active.buffer.len(),
            finalized,
        })
    }

    /// Drop the active set without flushing
    ///
    /// An in-flight sync for the dropped set will not restore its batch.
    pub fn abandon_set(&self) -> Option<ActiveSetData> {
        let mut state = self.lock_state();
        state.generation += 1;
        let active = state.active.take()?;
        tracing::info!(
            exercise = %active.data.exercise_name,
            dropped = active.buffer.len(),
            "Set abandoned"
        );
        Some(active.data)
    }

    /// Record an overall form grade on the active set (best effort)
    pub async fn update_form_quality(&self, grade: FormGrade) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        let Some(set_id) = self.set_id() else {
            return false;
        };

        let update = SetUpdate {
            form_quality: Some(grade),
            ..Default::default()
        };
        match store.update_set(&set_id, update).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(set_id = %set_id, error = %e, "Failed to update form quality");
                false
            }
        }
    }

    pub fn current_set(&self) -> Option<ActiveSetData> {
        self.lock_state().active.as_ref().map(|a| a.data.clone())
    }

    pub fn set_id(&self) -> Option<String> {
        self.lock_state().active.as_ref().and_then(|a| a.set_id.clone())
    }

    pub fn rep_count(&self) -> u32 {
        self.lock_state().active.as_ref().map_or(0, |a| a.rep_count)
    }

    /// Reps waiting to be stored, oldest first
    pub fn buffered_reps(&self) -> Vec<RepRecord> {
        self.lock_state()
            .active
            .as_ref()
            .map(|a| a.buffer.clone())
            .unwrap_or_default()
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::SeqCst)
    }

    pub fn last_sync_failed(&self) -> bool {
        self.last_sync_failed.load(Ordering::SeqCst)
    }

    /// Whether reps are currently only kept in memory
    pub fn is_local_only(&self) -> bool {
        self.store.is_none() || (self.current_set().is_some() && self.set_id().is_none())
    }
}
