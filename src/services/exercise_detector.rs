/// Exercise detectors
///
/// Maps exercise names to the primary metric that drives rep detection,
/// the landmarks that must be visible for tracking, and per-exercise
/// thresholds. Unknown exercises fall back to the generic elbow profile.

use crate::models::{Joint, Pose, PoseLandmark};
use crate::services::joint_angles::joint_angle;
use crate::services::rep_state_machine::RepDetectionConfig;

/// Angle above which every built-in profile considers the movement at the top
const DEFAULT_UP_THRESHOLD: f64 = 140.0;

/// Scalar signal a profile feeds into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryMetric {
    /// Average of left and right elbow angles
    ElbowAngle,
    /// Average of left and right knee angles
    KneeAngle,
    /// Wrist distance relative to shoulder width, scaled to 0-180
    WristSpread,
}

impl PrimaryMetric {
    /// Joint pair whose symmetry grades form quality, if any
    pub fn joint_pair(&self) -> Option<(Joint, Joint)> {
        match self {
            Self::ElbowAngle => Some((Joint::LeftElbow, Joint::RightElbow)),
            Self::KneeAngle => Some((Joint::LeftKnee, Joint::RightKnee)),
            Self::WristSpread => None,
        }
    }

    /// Landmarks that must be visible for the metric to be trusted
    pub fn key_landmarks(&self) -> &'static [PoseLandmark] {
        match self {
            Self::ElbowAngle => &[
                PoseLandmark::LeftShoulder,
                PoseLandmark::RightShoulder,
                PoseLandmark::LeftElbow,
                PoseLandmark::RightElbow,
                PoseLandmark::LeftWrist,
                PoseLandmark::RightWrist,
            ],
            Self::KneeAngle => &[
                PoseLandmark::LeftHip,
                PoseLandmark::RightHip,
                PoseLandmark::LeftKnee,
                PoseLandmark::RightKnee,
                PoseLandmark::LeftAnkle,
                PoseLandmark::RightAnkle,
            ],
            Self::WristSpread => &[
                PoseLandmark::LeftShoulder,
                PoseLandmark::RightShoulder,
                PoseLandmark::LeftWrist,
                PoseLandmark::RightWrist,
            ],
        }
    }
}

/// Detection parameters for one exercise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseProfile {
    pub name: &'static str,
    pub metric: PrimaryMetric,
    pub angle_threshold_up: f64,
    pub angle_threshold_down: f64,
}

impl ExerciseProfile {
    const fn new(name: &'static str, metric: PrimaryMetric, angle_threshold_down: f64) -> Self {
        Self {
            name,
            metric,
            angle_threshold_up: DEFAULT_UP_THRESHOLD,
            angle_threshold_down,
        }
    }

    /// State machine configuration using this profile's thresholds
    pub fn detection_config(&self, debounce_ms: u64) -> RepDetectionConfig {
        RepDetectionConfig {
            angle_threshold_up: self.angle_threshold_up,
            angle_threshold_down: self.angle_threshold_down,
            debounce_ms,
        }
    }

    /// Compute the primary metric from the visible landmarks of a pose
    ///
    /// Both sides are averaged when visible; a single visible side is used
    /// alone. Returns `None` when neither side is usable.
    pub fn primary_angle(&self, pose: &Pose, visibility_threshold: f64) -> Option<f64> {
        match self.metric.joint_pair() {
            Some((left, right)) => {
                let left = joint_angle(pose, left, visibility_threshold);
                let right = joint_angle(pose, right, visibility_threshold);
                match (left, right) {
                    (Some(l), Some(r)) => Some((l + r) / 2.0),
                    (Some(side), None) | (None, Some(side)) => Some(side),
                    (None, None) => None,
                }
            }
            None => wrist_spread(pose, visibility_threshold),
        }
    }
}

pub const BICEP_CURL: ExerciseProfile = ExerciseProfile::new("Bicep Curl", PrimaryMetric::ElbowAngle, 70.0);
pub const SQUAT: ExerciseProfile = ExerciseProfile::new("Squat", PrimaryMetric::KneeAngle, 90.0);
pub const PUSHUP: ExerciseProfile = ExerciseProfile::new("Pushup", PrimaryMetric::ElbowAngle, 90.0);
pub const SHOULDER_PRESS: ExerciseProfile =
    ExerciseProfile::new("Shoulder Press", PrimaryMetric::ElbowAngle, 100.0);
pub const LAT_PULLDOWN: ExerciseProfile =
    ExerciseProfile::new("Lat Pulldown", PrimaryMetric::ElbowAngle, 90.0);
pub const PEC_DECK: ExerciseProfile = ExerciseProfile::new("Pec Deck", PrimaryMetric::WristSpread, 45.0);
pub const GENERIC: ExerciseProfile = ExerciseProfile::new("Generic", PrimaryMetric::ElbowAngle, 80.0);

const REGISTRY: &[(&str, ExerciseProfile)] = &[
    ("bicep curl", BICEP_CURL),
    ("bicep curls", BICEP_CURL),
    ("hammer curl", BICEP_CURL),
    ("hammer curls", BICEP_CURL),
    ("dumbbell curl", BICEP_CURL),
    ("barbell curl", BICEP_CURL),
    ("curl", BICEP_CURL),
    ("curls", BICEP_CURL),
    ("squat", SQUAT),
    ("squats", SQUAT),
    ("goblet squat", SQUAT),
    ("front squat", SQUAT),
    ("back squat", SQUAT),
    ("pushup", PUSHUP),
    ("pushups", PUSHUP),
    ("push up", PUSHUP),
    ("push ups", PUSHUP),
    ("push-up", PUSHUP),
    ("push-ups", PUSHUP),
    ("shoulder press", SHOULDER_PRESS),
    ("overhead press", SHOULDER_PRESS),
    ("military press", SHOULDER_PRESS),
    ("dumbbell press", SHOULDER_PRESS),
    ("lat pulldown", LAT_PULLDOWN),
    ("pulldown", LAT_PULLDOWN),
    ("pull down", LAT_PULLDOWN),
    ("pec deck", PEC_DECK),
    ("peck deck", PEC_DECK),
    ("chest fly", PEC_DECK),
    ("chest flye", PEC_DECK),
    ("dumbbell fly", PEC_DECK),
    ("cable fly", PEC_DECK),
    ("fly", PEC_DECK),
];

/// Look up the profile for an exercise name, falling back to [`GENERIC`]
pub fn detector_for(exercise_name: &str) -> ExerciseProfile {
    let normalized = exercise_name.trim().to_lowercase();
    REGISTRY
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, profile)| *profile)
        .unwrap_or(GENERIC)
}

/// All registered exercise names
pub fn registered_exercises() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

fn wrist_spread(pose: &Pose, threshold: f64) -> Option<f64> {
    let left_wrist = pose.visible(PoseLandmark::LeftWrist, threshold)?;
    let right_wrist = pose.visible(PoseLandmark::RightWrist, threshold)?;
    let left_shoulder = pose.visible(PoseLandmark::LeftShoulder, threshold)?;
    let right_shoulder = pose.visible(PoseLandmark::RightShoulder, threshold)?;

    let shoulder_width = (right_shoulder.x - left_shoulder.x).abs().max(0.01);
    let wrist_distance = (right_wrist.x - left_wrist.x).abs();

    // 0 = hands together, 90 = hands at shoulder width
    Some((wrist_distance / shoulder_width * 90.0).min(180.0))
}
