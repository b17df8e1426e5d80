/// Audio Cue Dispatcher
///
/// Turns rep/set events and tracking-status changes into feedback cues.
/// Occlusion warnings fire only on a fresh transition into `Occluded` and
/// are rate limited by a cooldown; rep and set cues are passed straight
/// through since they are already debounced upstream.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::models::TrackingStatus;

pub const DEFAULT_OCCLUSION_COOLDOWN_MS: u64 = 5000;

/// Feedback event for the audio/haptic layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AudioCue {
    RepComplete { rep_number: u32 },
    SetComplete { reps: u32 },
    OcclusionWarning,
    TrackingRestored,
}

impl std::fmt::Display for AudioCue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCue::RepComplete { rep_number } => write!(f, "rep {}", rep_number),
            AudioCue::SetComplete { reps } => write!(f, "set complete ({} reps)", reps),
            AudioCue::OcclusionWarning => write!(f, "move into frame"),
            AudioCue::TrackingRestored => write!(f, "tracking restored"),
        }
    }
}

/// Output for cues; fire-and-forget
pub trait CueSink: Send + Sync {
    fn emit(&self, cue: AudioCue);
}

/// Writes cues to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCueSink;

impl CueSink for TracingCueSink {
    fn emit(&self, cue: AudioCue) {
        tracing::info!(cue = %cue, "Audio cue");
    }
}

/// Forwards cues to a playback task over a channel
#[derive(Debug, Clone)]
pub struct ChannelCueSink {
    tx: UnboundedSender<AudioCue>,
}

impl ChannelCueSink {
    pub fn new(tx: UnboundedSender<AudioCue>) -> Self {
        Self { tx }
    }
}

impl CueSink for ChannelCueSink {
    fn emit(&self, cue: AudioCue) {
        if self.tx.send(cue).is_err() {
            tracing::debug!("Cue receiver dropped");
        }
    }
}

pub struct AudioCueDispatcher {
    sink: Arc<dyn CueSink>,
    occlusion_cooldown_ms: u64,
    last_status: Option<TrackingStatus>,
    last_occlusion_notify_ms: Option<u64>,
}

impl AudioCueDispatcher {
    pub fn new(sink: Arc<dyn CueSink>) -> Self {
        Self::with_cooldown(sink, DEFAULT_OCCLUSION_COOLDOWN_MS)
    }

    pub fn with_cooldown(sink: Arc<dyn CueSink>, occlusion_cooldown_ms: u64) -> Self {
        Self {
            sink,
            occlusion_cooldown_ms,
            last_status: None,
            last_occlusion_notify_ms: None,
        }
    }

    pub fn last_status(&self) -> Option<TrackingStatus> {
        self.last_status
    }

    /// Compare the new tracking status with the previous one and emit a cue
    /// on a qualifying transition
    pub fn on_tracking_status(
        &mut self,
        status: TrackingStatus,
        timestamp_ms: u64,
    ) -> Option<AudioCue> {
        let previous = self.last_status.replace(status);
        if previous == Some(status) {
            return None;
        }

        let cue = match status {
            TrackingStatus::Occluded => {
                let cooled_down = self.last_occlusion_notify_ms.map_or(true, |last| {
                    timestamp_ms.saturating_sub(last) >= self.occlusion_cooldown_ms
                });
                if !cooled_down {
                    tracing::debug!(timestamp_ms, "Occlusion warning suppressed by cooldown");
                    return None;
                }
                self.last_occlusion_notify_ms = Some(timestamp_ms);
                AudioCue::OcclusionWarning
            }
            TrackingStatus::Tracking
                if matches!(
                    previous,
                    Some(TrackingStatus::Occluded) | Some(TrackingStatus::NoPerson)
                ) =>
            {
                AudioCue::TrackingRestored
            }
            _ => return None,
        };

        self.sink.emit(cue.clone());
        Some(cue)
    }

    pub fn on_rep_completed(&self, rep_number: u32) {
        self.sink.emit(AudioCue::RepComplete { rep_number });
    }

    pub fn on_set_completed(&self, reps: u32) {
        self.sink.emit(AudioCue::SetComplete { reps });
    }

    /// Forget status history and cooldown
    pub fn reset(&mut self) {
        self.last_status = None;
        self.last_occlusion_notify_ms = None;
    }
}
