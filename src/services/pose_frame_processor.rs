/// Pose Frame Processor
///
/// Per-frame pipeline: pose detection -> tracking status -> joint angles ->
/// primary angle -> rep state machine. Completed reps are packaged into
/// [`RepRecord`]s carrying the angle series of the rep window, its tempo and
/// a symmetry grade.
///
/// Only `Tracking` and `Partial` frames reach the state machine, so transient
/// occlusion never moves its previous-angle baseline.

use std::collections::{BTreeMap, VecDeque};

use crate::models::{
    FormQuality, Joint, JointAngleSet, Pose, RepPhase, RepRecord, TrackingStatus,
};
use crate::services::exercise_detector::ExerciseProfile;
use crate::services::joint_angles::{all_joint_angles, symmetry, DEFAULT_SYMMETRY_TOLERANCE};
use crate::services::rep_state_machine::{PhaseEvent, RepCompleted, RepPhaseStateMachine};

/// Longest angle series kept per joint for one rep (about 30s at 30fps)
const MAX_WINDOW_SAMPLES: usize = 900;

/// External pose-estimation capability
pub trait PoseSource: Send {
    /// Raw input handed over by the camera callback
    type Frame;

    /// Detect the pose in a frame; `None` means no person
    fn detect_pose(&mut self, frame: &Self::Frame) -> Option<Pose>;
}

/// Plays back a prepared sequence of detections, one per frame
#[derive(Debug, Clone, Default)]
pub struct ScriptedPoseSource {
    poses: VecDeque<Option<Pose>>,
}

impl ScriptedPoseSource {
    pub fn new(poses: impl IntoIterator<Item = Option<Pose>>) -> Self {
        Self {
            poses: poses.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.poses.len()
    }
}

impl PoseSource for ScriptedPoseSource {
    type Frame = ();

    fn detect_pose(&mut self, _frame: &()) -> Option<Pose> {
        self.poses.pop_front().flatten()
    }
}

/// Frame processing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameProcessorConfig {
    /// Minimum landmark visibility to be considered present
    pub visibility_threshold: f64,
    /// Left/right difference graded `good` (degrees)
    pub symmetry_tolerance: f64,
    pub debounce_ms: u64,
    /// Override the exercise profile's top threshold
    pub angle_threshold_up: Option<f64>,
    /// Override the exercise profile's bottom threshold
    pub angle_threshold_down: Option<f64>,
}

impl Default for FrameProcessorConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            symmetry_tolerance: DEFAULT_SYMMETRY_TOLERANCE,
            debounce_ms: 300,
            angle_threshold_up: None,
            angle_threshold_down: None,
        }
    }
}

/// Result of processing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub timestamp_ms: u64,
    pub status: TrackingStatus,
    pub primary_angle: Option<f64>,
    /// State machine result; `None` when the frame was not fed
    pub event: Option<PhaseEvent>,
    pub phase: RepPhase,
    /// Record of a rep counted on this frame
    pub rep: Option<RepRecord>,
}

/// Angle samples collected since the current rep started
#[derive(Debug, Default)]
struct RepWindow {
    started_ms: Option<u64>,
    angles: BTreeMap<Joint, VecDeque<f64>>,
    paired: Vec<(f64, f64)>,
}

impl RepWindow {
    fn restart(&mut self, timestamp_ms: u64) {
        self.clear();
        self.started_ms = Some(timestamp_ms);
    }

    fn clear(&mut self) {
        self.started_ms = None;
        self.angles.clear();
        self.paired.clear();
    }

    fn push(&mut self, angles: &JointAngleSet, pair: Option<(Joint, Joint)>) {
        for (joint, value) in angles {
            let series = self.angles.entry(*joint).or_default();
            if series.len() == MAX_WINDOW_SAMPLES {
                series.pop_front();
            }
            series.push_back(*value);
        }

        if let Some((left, right)) = pair {
            if let (Some(l), Some(r)) = (angles.get(&left), angles.get(&right)) {
                if self.paired.len() < MAX_WINDOW_SAMPLES {
                    self.paired.push((*l, *r));
                }
            }
        }
    }

    /// Symmetry of the mean left and right angles; `Good` without bilateral data
    fn form_quality(&self, tolerance: f64) -> FormQuality {
        if self.paired.is_empty() {
            return FormQuality::Good;
        }
        let n = self.paired.len() as f64;
        let left = self.paired.iter().map(|(l, _)| l).sum::<f64>() / n;
        let right = self.paired.iter().map(|(_, r)| r).sum::<f64>() / n;
        symmetry(left, right, tolerance)
    }

    fn to_record(&self, completed: &RepCompleted, tolerance: f64) -> RepRecord {
        let tempo_ms = self
            .started_ms
            .map_or(0, |start| completed.timestamp_ms.saturating_sub(start));

        RepRecord {
            rep_number: completed.rep_number,
            joint_angles: self
                .angles
                .iter()
                .map(|(joint, series)| (*joint, series.iter().copied().collect()))
                .collect(),
            tempo_seconds: tempo_ms as f64 / 1000.0,
            form_quality: self.form_quality(tolerance),
        }
    }
}

pub struct PoseFrameProcessor<S: PoseSource> {
    source: S,
    profile: ExerciseProfile,
    config: FrameProcessorConfig,
    machine: RepPhaseStateMachine,
    status: TrackingStatus,
    window: RepWindow,
}

impl<S: PoseSource> PoseFrameProcessor<S> {
    pub fn new(source: S, profile: ExerciseProfile, config: FrameProcessorConfig) -> Self {
        Self {
            source,
            profile,
            config,
            machine: Self::build_machine(&profile, &config),
            status: TrackingStatus::NoPerson,
            window: RepWindow::default(),
        }
    }

    fn build_machine(profile: &ExerciseProfile, config: &FrameProcessorConfig) -> RepPhaseStateMachine {
        let mut detection = profile.detection_config(config.debounce_ms);
        if let Some(up) = config.angle_threshold_up {
            detection.angle_threshold_up = up;
        }
        if let Some(down) = config.angle_threshold_down {
            detection.angle_threshold_down = down;
        }
        RepPhaseStateMachine::with_config(detection)
    }

    pub fn profile(&self) -> &ExerciseProfile {
        &self.profile
    }

    pub fn state_machine(&self) -> &RepPhaseStateMachine {
        &self.machine
    }

    pub fn phase(&self) -> RepPhase {
        self.machine.phase()
    }

    pub fn rep_count(&self) -> u32 {
        self.machine.rep_count()
    }

    pub fn tracking_status(&self) -> TrackingStatus {
        self.status
    }

    /// Switch exercise; resets the rep cycle
    pub fn set_profile(&mut self, profile: ExerciseProfile) {
        if profile != self.profile {
            tracing::info!(exercise = profile.name, "Switching exercise profile");
        }
        self.profile = profile;
        self.machine = Self::build_machine(&self.profile, &self.config);
        self.window.clear();
    }

    pub fn reset_rep_count(&mut self) {
        self.machine.reset_rep_count();
        self.window.clear();
    }

    /// Run pose detection on a camera frame and process the result
    pub fn process_frame(&mut self, frame: &S::Frame, timestamp_ms: u64) -> FrameOutcome {
        let pose = self.source.detect_pose(frame);
        self.process_pose(pose.as_ref(), timestamp_ms)
    }

    /// Classify how much of the exercise's key landmarks is visible
    pub fn classify(&self, pose: Option<&Pose>) -> TrackingStatus {
        let Some(pose) = pose else {
            return TrackingStatus::NoPerson;
        };

        let keys = self.profile.metric.key_landmarks();
        let visible = pose.count_visible(keys, self.config.visibility_threshold);

        if visible == keys.len() {
            TrackingStatus::Tracking
        } else if visible * 2 >= keys.len() {
            TrackingStatus::Partial
        } else {
            TrackingStatus::Occluded
        }
    }

    /// Process an already detected pose
    pub fn process_pose(&mut self, pose: Option<&Pose>, timestamp_ms: u64) -> FrameOutcome {
        let status = self.classify(pose);
        if status != self.status {
            tracing::debug!(from = %self.status, to = %status, timestamp_ms, "Tracking status changed");
            self.status = status;
        }

        let mut outcome = FrameOutcome {
            timestamp_ms,
            status,
            primary_angle: None,
            event: None,
            phase: self.machine.phase(),
            rep: None,
        };

        let Some(pose) = pose.filter(|_| status.is_trusted()) else {
            return outcome;
        };
        let Some(primary) = self
            .profile
            .primary_angle(pose, self.config.visibility_threshold)
        else {
            return outcome;
        };

        let event = self.machine.feed(primary, timestamp_ms);
        let angles = all_joint_angles(pose, self.config.visibility_threshold);
        let pair = self.profile.metric.joint_pair();

        match event {
            PhaseEvent::Transition {
                to: RepPhase::Eccentric,
                ..
            } => {
                self.window.restart(timestamp_ms);
                self.window.push(&angles, pair);
            }
            PhaseEvent::RepCompleted(completed) => {
                self.window.push(&angles, pair);
                let record = self
                    .window
                    .to_record(&completed, self.config.symmetry_tolerance);
                tracing::info!(
                    rep_number = record.rep_number,
                    tempo_seconds = record.tempo_seconds,
                    form_quality = ?record.form_quality,
                    "Rep completed"
                );
                outcome.rep = Some(record);
                self.window.clear();
            }
            PhaseEvent::RepDebounced => self.window.clear(),
            _ => {
                if self.window.started_ms.is_some() {
                    self.window.push(&angles, pair);
                }
            }
        }

        outcome.primary_angle = Some(primary);
        outcome.event = Some(event);
        outcome.phase = self.machine.phase();
        outcome
    }
}
