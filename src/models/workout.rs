use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Joints with a tracked angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Joint {
    LeftElbow,
    RightElbow,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
}

impl Joint {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
        }
    }
}

/// Joint angles for a single frame, in degrees. A missing key means unknown.
pub type JointAngleSet = BTreeMap<Joint, f64>;

/// Stage of a repetition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepPhase {
    #[default]
    Idle,
    Eccentric,
    Bottom,
    Concentric,
    Top,
}

impl fmt::Display for RepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Eccentric => "eccentric",
            Self::Bottom => "bottom",
            Self::Concentric => "concentric",
            Self::Top => "top",
        };
        f.write_str(s)
    }
}

/// How well the tracked person is visible in the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Tracking,
    Partial,
    Occluded,
    #[default]
    NoPerson,
}

impl TrackingStatus {
    /// Whether frames with this status may drive the rep state machine
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Tracking | Self::Partial)
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tracking => "tracking",
            Self::Partial => "partial",
            Self::Occluded => "occluded",
            Self::NoPerson => "no_person",
        };
        f.write_str(s)
    }
}

/// Left/right symmetry classification of a single rep
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormQuality {
    Good,
    Fair,
    Poor,
}

/// Overall grade recorded against a whole set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl From<FormQuality> for FormGrade {
    fn from(quality: FormQuality) -> Self {
        match quality {
            FormQuality::Good => Self::Good,
            FormQuality::Fair => Self::Fair,
            FormQuality::Poor => Self::Poor,
        }
    }
}

impl FormGrade {
    /// Grade a whole set from its per-rep symmetry results
    pub fn from_rep_qualities(qualities: &[FormQuality]) -> Option<Self> {
        if qualities.is_empty() {
            return None;
        }

        let total = qualities.len() as f64;
        let good = qualities.iter().filter(|q| **q == FormQuality::Good).count() as f64;
        let poor = qualities.iter().filter(|q| **q == FormQuality::Poor).count() as f64;

        Some(if good == total {
            Self::Excellent
        } else if poor / total > 0.25 {
            Self::Poor
        } else if good / total >= 0.75 {
            Self::Good
        } else {
            Self::Fair
        })
    }
}

/// One completed repetition, queued for sync until durable storage owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepRecord {
    pub rep_number: u32,
    /// Per-joint angle series sampled over the rep
    pub joint_angles: BTreeMap<Joint, Vec<f64>>,
    pub tempo_seconds: f64,
    pub form_quality: FormQuality,
}

/// Parameters of a set about to be tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSetData {
    pub session_id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub set_number: u32,
    pub weight: Option<f64>,
    pub target_reps: Option<u32>,
}

/// Aggregated totals written when a session is finalized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_reps: u32,
    pub total_sets: u32,
    pub total_volume: f64,
    pub duration_seconds: u64,
}
