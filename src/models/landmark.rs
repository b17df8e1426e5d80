/// Landmark and pose models
///
/// This module provides the per-frame body landmark representation produced by
/// the pose-estimation capability, using the 33-point BlazePose topology.

use serde::{Deserialize, Serialize};

/// Number of landmarks in a full pose
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Single tracked body point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// X coordinate (normalized 0-1, screen space)
    pub x: f64,
    /// Y coordinate (normalized 0-1, screen space)
    pub y: f64,
    /// Depth relative to the hips (unused by 2D angle math)
    #[serde(default)]
    pub z: f64,
    /// Detection confidence (0-1)
    pub visibility: f64,
}

impl Landmark {
    /// Create a new landmark
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    /// Create a fully visible 2D landmark
    pub fn at(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0, 1.0)
    }

    /// Check if landmark is visible above the given confidence threshold
    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility > threshold
    }

    /// Calculate Euclidean distance to another landmark in the image plane
    pub fn distance_to(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// BlazePose landmark indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    /// Index into [`Pose::landmarks`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get landmark name
    pub fn name(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }
}

/// Landmarks for one processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Landmarks in BlazePose index order; may be truncated by the detector
    pub landmarks: Vec<Landmark>,
    /// Capture timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl Pose {
    /// Create a new pose
    pub fn new(landmarks: Vec<Landmark>, timestamp_ms: u64) -> Self {
        Self {
            landmarks,
            timestamp_ms,
        }
    }

    /// Get landmark by BlazePose index
    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        self.landmarks.get(landmark.index())
    }

    /// Get landmark only if it is visible above `threshold`
    pub fn visible(&self, landmark: PoseLandmark, threshold: f64) -> Option<&Landmark> {
        self.get(landmark).filter(|lm| lm.is_visible(threshold))
    }

    /// Count how many of `landmarks` are present and visible
    pub fn count_visible(&self, landmarks: &[PoseLandmark], threshold: f64) -> usize {
        landmarks
            .iter()
            .filter(|lm| self.visible(**lm, threshold).is_some())
            .count()
    }
}
