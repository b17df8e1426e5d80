/// Synthetic poses for offline simulation
///
/// Builds a standing skeleton whose primary metric for a given exercise
/// profile equals a requested angle, and rep trajectories that sweep that
/// angle through the profile's thresholds.

use crate::models::{Landmark, Pose, PoseLandmark, POSE_LANDMARK_COUNT};
use crate::services::exercise_detector::{ExerciseProfile, PrimaryMetric};
use crate::services::pose_frame_processor::PoseSource;

const VISIBLE: f64 = 0.9;
const FOREARM: f64 = 0.15;
const SHIN: f64 = 0.17;

fn standing_skeleton() -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0, VISIBLE); POSE_LANDMARK_COUNT];
    let mut place = |lm: PoseLandmark, x: f64, y: f64| {
        landmarks[lm.index()] = Landmark::new(x, y, 0.0, VISIBLE);
    };

    place(PoseLandmark::Nose, 0.5, 0.15);
    place(PoseLandmark::LeftShoulder, 0.4, 0.3);
    place(PoseLandmark::RightShoulder, 0.6, 0.3);
    place(PoseLandmark::LeftElbow, 0.4, 0.45);
    place(PoseLandmark::RightElbow, 0.6, 0.45);
    place(PoseLandmark::LeftWrist, 0.4, 0.6);
    place(PoseLandmark::RightWrist, 0.6, 0.6);
    place(PoseLandmark::LeftHip, 0.45, 0.6);
    place(PoseLandmark::RightHip, 0.55, 0.6);
    place(PoseLandmark::LeftKnee, 0.45, 0.78);
    place(PoseLandmark::RightKnee, 0.55, 0.78);
    place(PoseLandmark::LeftAnkle, 0.45, 0.95);
    place(PoseLandmark::RightAnkle, 0.55, 0.95);

    landmarks
}

/// Point at `length` from `vertex`, rotated `degrees` away from straight up
fn bend(vertex: &Landmark, degrees: f64, length: f64, outward: f64) -> Landmark {
    let theta = degrees.to_radians();
    Landmark::new(
        vertex.x + outward * length * theta.sin(),
        vertex.y - length * theta.cos(),
        0.0,
        VISIBLE,
    )
}

/// Pose whose primary metric for `profile` equals `primary_angle` on both sides
pub fn pose_at_angle(profile: &ExerciseProfile, primary_angle: f64, timestamp_ms: u64) -> Pose {
    let mut landmarks = standing_skeleton();
    let angle = primary_angle.clamp(0.0, 180.0);

    let sides = match profile.metric {
        PrimaryMetric::ElbowAngle => [
            (PoseLandmark::LeftElbow, PoseLandmark::LeftWrist, FOREARM, -1.0),
            (PoseLandmark::RightElbow, PoseLandmark::RightWrist, FOREARM, 1.0),
        ],
        PrimaryMetric::KneeAngle => [
            (PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle, SHIN, -1.0),
            (PoseLandmark::RightKnee, PoseLandmark::RightAnkle, SHIN, 1.0),
        ],
        PrimaryMetric::WristSpread => {
            // Shoulders are 0.2 apart, 90 degrees = shoulder width
            let half = angle / 90.0 * 0.2 / 2.0;
            landmarks[PoseLandmark::LeftWrist.index()] = Landmark::new(0.5 - half, 0.4, 0.0, VISIBLE);
            landmarks[PoseLandmark::RightWrist.index()] = Landmark::new(0.5 + half, 0.4, 0.0, VISIBLE);
            return Pose::new(landmarks, timestamp_ms);
        }
    };

    for (vertex, end, length, outward) in sides {
        let joint = landmarks[vertex.index()];
        landmarks[end.index()] = bend(&joint, angle, length, outward);
    }

    Pose::new(landmarks, timestamp_ms)
}

/// Mark landmarks as not visible
pub fn hide_landmarks(pose: &mut Pose, hidden: &[PoseLandmark]) {
    for lm in hidden {
        if let Some(landmark) = pose.landmarks.get_mut(lm.index()) {
            landmark.visibility = 0.0;
        }
    }
}

/// Primary-angle series for `reps` full repetitions
///
/// Starts with a short hold at the top, then sweeps down past the bottom
/// threshold and back up past the top threshold once per rep.
pub fn rep_trajectory(profile: &ExerciseProfile, reps: u32, frames_per_rep: usize) -> Vec<f64> {
    let top = (profile.angle_threshold_up + 15.0).min(178.0);
    let bottom = (profile.angle_threshold_down - 15.0).max(2.0);
    let half = (frames_per_rep / 2).max(2);

    let mut angles = vec![top; 3];
    for _ in 0..reps {
        for i in 1..=half {
            angles.push(top + (bottom - top) * i as f64 / half as f64);
        }
        for i in 1..=half {
            angles.push(bottom + (top - bottom) * i as f64 / half as f64);
        }
    }
    angles
}

/// Frame for [`SyntheticPoseSource`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFrame {
    pub profile: ExerciseProfile,
    pub angle: f64,
    pub timestamp_ms: u64,
    /// Hide the profile's key landmarks
    pub occluded: bool,
    /// Nobody in front of the camera
    pub empty: bool,
}

impl SyntheticFrame {
    pub fn new(profile: ExerciseProfile, angle: f64, timestamp_ms: u64) -> Self {
        Self {
            profile,
            angle,
            timestamp_ms,
            occluded: false,
            empty: false,
        }
    }
}

/// Pose source that renders synthetic frames into skeletons
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticPoseSource;

impl PoseSource for SyntheticPoseSource {
    type Frame = SyntheticFrame;

    fn detect_pose(&mut self, frame: &SyntheticFrame) -> Option<Pose> {
        if frame.empty {
            return None;
        }

        let mut pose = pose_at_angle(&frame.profile, frame.angle, frame.timestamp_ms);
        if frame.occluded {
            hide_landmarks(&mut pose, frame.profile.metric.key_landmarks());
        }
        Some(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::exercise_detector::{BICEP_CURL, PEC_DECK, SQUAT};
    use crate::services::rep_state_machine::RepPhaseStateMachine;

    #[test]
    fn test_pose_matches_requested_angle() {
        for profile in [BICEP_CURL, SQUAT, PEC_DECK] {
            for target in [30.0, 90.0, 150.0] {
                let pose = pose_at_angle(&profile, target, 0);
                let measured = profile.primary_angle(&pose, 0.5).unwrap();
                assert!(
                    (measured - target).abs() < 1e-4,
                    "{}: expected {}, got {}",
                    profile.name,
                    target,
                    measured
                );
            }
        }
    }

    #[test]
    fn test_hide_landmarks() {
        let mut pose = pose_at_angle(&SQUAT, 120.0, 0);
        hide_landmarks(&mut pose, &[PoseLandmark::LeftKnee]);
        assert!(pose.visible(PoseLandmark::LeftKnee, 0.5).is_none());
        assert!(pose.visible(PoseLandmark::RightKnee, 0.5).is_some());
    }

    #[test]
    fn test_synthetic_source() {
        let mut source = SyntheticPoseSource;
        let mut frame = SyntheticFrame::new(BICEP_CURL, 90.0, 1000);

        let pose = source.detect_pose(&frame).unwrap();
        assert_eq!(pose.timestamp_ms, 1000);
        assert!((BICEP_CURL.primary_angle(&pose, 0.5).unwrap() - 90.0).abs() < 1e-4);

        frame.occluded = true;
        let pose = source.detect_pose(&frame).unwrap();
        assert_eq!(BICEP_CURL.primary_angle(&pose, 0.5), None);

        frame.empty = true;
        assert!(source.detect_pose(&frame).is_none());
    }

    #[test]
    fn test_trajectory_counts_requested_reps() {
        for profile in [BICEP_CURL, SQUAT, PEC_DECK] {
            let mut machine = RepPhaseStateMachine::with_config(profile.detection_config(300));
            for (i, angle) in rep_trajectory(&profile, 4, 30).into_iter().enumerate() {
                machine.feed(angle, i as u64 * 33);
            }
            assert_eq!(machine.rep_count(), 4, "{}", profile.name);
        }
    }
}
