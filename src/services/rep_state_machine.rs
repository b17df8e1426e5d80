/// Rep Phase State Machine
///
/// Consumes one primary joint angle per frame and walks the repetition cycle
/// `idle/top -> eccentric -> bottom -> concentric -> top`, emitting a
/// [`RepCompleted`] when the concentric phase reaches the top threshold.
///
/// Completions closer together than `debounce_ms` still move the phase to
/// `top` but are not counted.

use crate::models::RepPhase;
use serde::{Deserialize, Serialize};

/// Angle memory after construction and reset
const INITIAL_PREVIOUS_ANGLE: f64 = 180.0;

/// Thresholds and debounce window for rep detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepDetectionConfig {
    /// Angle at or above which the concentric phase completes (degrees)
    pub angle_threshold_up: f64,
    /// Angle at or below which the eccentric phase bottoms out (degrees)
    pub angle_threshold_down: f64,
    /// Minimum spacing between counted reps (milliseconds)
    pub debounce_ms: u64,
}

impl Default for RepDetectionConfig {
    fn default() -> Self {
        Self {
            angle_threshold_up: 160.0,
            angle_threshold_down: 45.0,
            debounce_ms: 300,
        }
    }
}

/// A counted repetition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepCompleted {
    /// 1-based rep number within the current set
    pub rep_number: u32,
    /// Timestamp of the frame that completed the rep
    pub timestamp_ms: u64,
    /// Angle that crossed the top threshold
    pub angle: f64,
}

/// Result of feeding one angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseEvent {
    /// Angle was not a finite number; nothing changed
    Invalid,
    /// Phase unchanged
    NoChange,
    /// Phase moved without completing a rep
    Transition { from: RepPhase, to: RepPhase },
    /// Phase moved to `top` and the rep was counted
    RepCompleted(RepCompleted),
    /// Phase moved to `top` inside the debounce window; not counted
    RepDebounced,
}

type RepHandler = Box<dyn FnMut(&RepCompleted) + Send>;

/// Repetition phase tracker
pub struct RepPhaseStateMachine {
    config: RepDetectionConfig,
    phase: RepPhase,
    previous_angle: f64,
    rep_count: u32,
    last_completion_ms: Option<u64>,
    handlers: Vec<RepHandler>,
}

impl RepPhaseStateMachine {
    /// Create a state machine with default thresholds
    pub fn new() -> Self {
        Self::with_config(RepDetectionConfig::default())
    }

    pub fn with_config(config: RepDetectionConfig) -> Self {
        Self {
            config,
            phase: RepPhase::Idle,
            previous_angle: INITIAL_PREVIOUS_ANGLE,
            rep_count: 0,
            last_completion_ms: None,
            handlers: Vec::new(),
        }
    }

    pub fn config(&self) -> &RepDetectionConfig {
        &self.config
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn previous_angle(&self) -> f64 {
        self.previous_angle
    }

    /// Register a callback invoked for every counted rep
    pub fn on_rep_completed<F>(&mut self, handler: F)
    where
        F: FnMut(&RepCompleted) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Feed the primary angle of one frame
    pub fn feed(&mut self, angle: f64, timestamp_ms: u64) -> PhaseEvent {
        if !angle.is_finite() {
            tracing::debug!(angle, timestamp_ms, "Ignoring non-finite angle");
            return PhaseEvent::Invalid;
        }

        let previous_angle = self.previous_angle;
        self.previous_angle = angle;

        let up = self.config.angle_threshold_up;
        let down = self.config.angle_threshold_down;

        let next = match self.phase {
            RepPhase::Idle | RepPhase::Top if angle < up && angle < previous_angle => {
                RepPhase::Eccentric
            }
            RepPhase::Eccentric if angle <= down => RepPhase::Bottom,
            RepPhase::Bottom if angle > down && angle > previous_angle => RepPhase::Concentric,
            RepPhase::Concentric if angle >= up => RepPhase::Top,
            current => current,
        };

        if next == self.phase {
            return PhaseEvent::NoChange;
        }

        let from = std::mem::replace(&mut self.phase, next);
        tracing::trace!(%from, to = %next, angle, "Rep phase transition");

        if next != RepPhase::Top {
            return PhaseEvent::Transition { from, to: next };
        }

        if let Some(last) = self.last_completion_ms {
            if timestamp_ms.saturating_sub(last) < self.config.debounce_ms {
                tracing::debug!(
                    timestamp_ms,
                    last_completion_ms = last,
                    "Rep completion inside debounce window, not counted"
                );
                return PhaseEvent::RepDebounced;
            }
        }

        self.rep_count += 1;
        self.last_completion_ms = Some(timestamp_ms);

        let completed = RepCompleted {
            rep_number: self.rep_count,
            timestamp_ms,
            angle,
        };
        for handler in self.handlers.iter_mut() {
            handler(&completed);
        }

        PhaseEvent::RepCompleted(completed)
    }

    /// Return to `idle` with a zero count and cleared angle and debounce memory
    pub fn reset_rep_count(&mut self) {
        self.phase = RepPhase::Idle;
        self.previous_angle = INITIAL_PREVIOUS_ANGLE;
        self.last_completion_ms = None;
        self.rep_count = 0;
    }
}

impl Default for RepPhaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
