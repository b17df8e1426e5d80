/// Joint Angle Calculator
///
/// Pure geometry over pose landmarks:
/// - Angle at a joint vertex from three landmarks
/// - Angles for the fixed set of tracked joints (elbows, shoulders, hips, knees)
/// - Left/right symmetry classification

use crate::models::{FormQuality, Joint, JointAngleSet, Landmark, Pose, PoseLandmark};

/// Angle returned for degenerate landmark triplets (fully extended)
pub const DEGENERATE_ANGLE_DEGREES: f64 = 180.0;

/// Default tolerance for [`symmetry`], in degrees
pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 15.0;

/// Landmark triplets `(joint, a, vertex, c)` used by [`all_joint_angles`]
pub const JOINT_TRIPLETS: [(Joint, PoseLandmark, PoseLandmark, PoseLandmark); 8] = [
    (Joint::LeftElbow, PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow, PoseLandmark::LeftWrist),
    (Joint::RightElbow, PoseLandmark::RightShoulder, PoseLandmark::RightElbow, PoseLandmark::RightWrist),
    (Joint::LeftShoulder, PoseLandmark::LeftHip, PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow),
    (Joint::RightShoulder, PoseLandmark::RightHip, PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
    (Joint::LeftHip, PoseLandmark::LeftShoulder, PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
    (Joint::RightHip, PoseLandmark::RightShoulder, PoseLandmark::RightHip, PoseLandmark::RightKnee),
    (Joint::LeftKnee, PoseLandmark::LeftHip, PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
    (Joint::RightKnee, PoseLandmark::RightHip, PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
];

/// Calculate the angle at `b` between rays `b->a` and `b->c`
///
/// # Returns
/// Angle in degrees within [0, 180]. Zero-length rays yield
/// [`DEGENERATE_ANGLE_DEGREES`] instead of NaN.
pub fn angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    // Vectors from joint to adjacent points
    let ba_x = a.x - b.x;
    let ba_y = a.y - b.y;
    let bc_x = c.x - b.x;
    let bc_y = c.y - b.y;

    let dot_product = ba_x * bc_x + ba_y * bc_y;
    let mag_ba = (ba_x * ba_x + ba_y * ba_y).sqrt();
    let mag_bc = (bc_x * bc_x + bc_y * bc_y).sqrt();

    if mag_ba == 0.0 || mag_bc == 0.0 {
        return DEGENERATE_ANGLE_DEGREES;
    }

    let cos_angle = dot_product / (mag_ba * mag_bc);
    cos_angle.clamp(-1.0, 1.0).acos().to_degrees().clamp(0.0, 180.0)
}

/// Calculate the angle for one tracked joint
///
/// `None` unless all three landmarks exist and are visible above `visibility_threshold`.
pub fn joint_angle(pose: &Pose, joint: Joint, visibility_threshold: f64) -> Option<f64> {
    let (_, a, b, c) = JOINT_TRIPLETS.iter().find(|(j, ..)| *j == joint)?;
    Some(angle(
        pose.visible(*a, visibility_threshold)?,
        pose.visible(*b, visibility_threshold)?,
        pose.visible(*c, visibility_threshold)?,
    ))
}

/// Calculate all tracked joint angles for a pose
///
/// Joints with a missing or low-visibility landmark are omitted.
pub fn all_joint_angles(pose: &Pose, visibility_threshold: f64) -> JointAngleSet {
    JOINT_TRIPLETS
        .iter()
        .filter_map(|(joint, ..)| Some((*joint, joint_angle(pose, *joint, visibility_threshold)?)))
        .collect()
}

/// Classify left/right symmetry by absolute angle difference
pub fn symmetry(left_angle: f64, right_angle: f64, tolerance_degrees: f64) -> FormQuality {
    let diff = (left_angle - right_angle).abs();
    if diff <= tolerance_degrees {
        FormQuality::Good
    } else if diff <= tolerance_degrees * 2.0 {
        FormQuality::Fair
    } else {
        FormQuality::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::POSE_LANDMARK_COUNT;
    use proptest::prelude::*;

    fn standing_pose() -> Pose {
        let mut landmarks = vec![Landmark::at(0.5, 0.5); POSE_LANDMARK_COUNT];
        let mut set = |lm: PoseLandmark, x: f64, y: f64| landmarks[lm.index()] = Landmark::at(x, y);
        set(PoseLandmark::LeftShoulder, 0.40, 0.30);
        set(PoseLandmark::RightShoulder, 0.60, 0.30);
        // Left arm bent at 90, right arm straight down
        set(PoseLandmark::LeftElbow, 0.40, 0.45);
        set(PoseLandmark::LeftWrist, 0.55, 0.45);
        set(PoseLandmark::RightElbow, 0.60, 0.45);
        set(PoseLandmark::RightWrist, 0.60, 0.60);
        set(PoseLandmark::LeftHip, 0.42, 0.60);
        set(PoseLandmark::RightHip, 0.58, 0.60);
        set(PoseLandmark::LeftKnee, 0.42, 0.75);
        set(PoseLandmark::RightKnee, 0.58, 0.75);
        set(PoseLandmark::LeftAnkle, 0.42, 0.90);
        set(PoseLandmark::RightAnkle, 0.58, 0.90);
        Pose::new(landmarks, 0)
    }

    #[test]
    fn test_right_angle() {
        let a = Landmark::at(0.0, 0.0);
        let b = Landmark::at(0.0, 1.0);
        let c = Landmark::at(1.0, 1.0);
        assert!((angle(&a, &b, &c) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_straight_line_is_180() {
        let a = Landmark::at(0.0, 0.0);
        let b = Landmark::at(0.5, 0.5);
        let c = Landmark::at(1.0, 1.0);
        assert!((angle(&a, &b, &c) - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_returns_180() {
        let a = Landmark::at(0.3, 0.3);
        let c = Landmark::at(0.9, 0.1);
        assert_eq!(angle(&a, &a, &c), 180.0);
        assert_eq!(angle(&a, &c, &c), 180.0);
    }

    #[test]
    fn test_all_joint_angles() {
        let angles = all_joint_angles(&standing_pose(), 0.5);

        assert_eq!(angles.len(), JOINT_TRIPLETS.len());
        assert!((angles[&Joint::LeftElbow] - 90.0).abs() < 1e-4);
        assert!((angles[&Joint::RightElbow] - 180.0).abs() < 1e-4);
        assert!((angles[&Joint::LeftKnee] - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_landmarks_are_omitted() {
        let mut pose = standing_pose();
        pose.landmarks.truncate(17);

        let angles = all_joint_angles(&pose, 0.5);
        assert!(angles.contains_key(&Joint::LeftElbow));
        assert!(!angles.contains_key(&Joint::LeftKnee));
        assert!(!angles.contains_key(&Joint::LeftShoulder));
        assert_eq!(joint_angle(&pose, Joint::RightHip, 0.5), None);
    }

    #[test]
    fn test_low_visibility_landmarks_are_omitted() {
        let mut pose = standing_pose();
        pose.landmarks[PoseLandmark::LeftWrist.index()].visibility = 0.3;

        assert_eq!(joint_angle(&pose, Joint::LeftElbow, 0.5), None);
        assert!(joint_angle(&pose, Joint::LeftElbow, 0.2).is_some());

        let angles = all_joint_angles(&pose, 0.5);
        assert!(!angles.contains_key(&Joint::LeftElbow));
        assert!(angles.contains_key(&Joint::RightElbow));
        assert_eq!(angles.len(), JOINT_TRIPLETS.len() - 1);
    }

    #[test]
    fn test_symmetry_classification() {
        assert_eq!(symmetry(100.0, 110.0, 15.0), FormQuality::Good);
        assert_eq!(symmetry(100.0, 125.0, 15.0), FormQuality::Fair);
        assert_eq!(symmetry(100.0, 140.0, 15.0), FormQuality::Poor);
        assert_eq!(symmetry(100.0, 115.0, 15.0), FormQuality::Good);
        assert_eq!(symmetry(130.0, 100.0, 15.0), FormQuality::Fair);
    }

    fn coord() -> impl Strategy<Value = f64> {
        0.0f64..1.0
    }

    proptest! {
        #[test]
        fn prop_angle_in_range_and_symmetric(
            ax in coord(), ay in coord(),
            bx in coord(), by in coord(),
            cx in coord(), cy in coord(),
        ) {
            let a = Landmark::at(ax, ay);
            let b = Landmark::at(bx, by);
            let c = Landmark::at(cx, cy);

            let abc = angle(&a, &b, &c);
            let cba = angle(&c, &b, &a);

            prop_assert!(!abc.is_nan());
            prop_assert!((0.0..=180.0).contains(&abc));
            prop_assert!((abc - cba).abs() < 1e-9);
        }

        #[test]
        fn prop_symmetry_is_order_independent(l in 0.0f64..180.0, r in 0.0f64..180.0) {
            prop_assert_eq!(symmetry(l, r, 15.0), symmetry(r, l, 15.0));
        }
    }
}
