// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Joint angle computation.

use crate::keypoint::Keypoint;

/// Compute the angle ABC in degrees, with `b` as the vertex.
///
/// The cosine is clamped to `[-1, 1]` before `acos` so colinear points do not
/// produce `NaN` from floating-point overshoot. Work is done in `f64`.
///
/// # Arguments
///
/// * `a` - First endpoint (e.g. hip).
/// * `b` - Vertex (e.g. knee).
/// * `c` - Second endpoint (e.g. ankle).
///
/// # Returns
///
/// * `Some(angle)` in `[0, 180]`.
/// * `None` if any coordinate is not finite or either vector has zero length.
#[must_use]
pub fn calculate_angle(a: Keypoint, b: Keypoint, c: Keypoint) -> Option<f64> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return None;
    }

    let ba = (f64::from(a.x) - f64::from(b.x), f64::from(a.y) - f64::from(b.y));
    let bc = (f64::from(c.x) - f64::from(b.x), f64::from(c.y) - f64::from(b.y));

    let norm_ba = ba.0.hypot(ba.1);
    let norm_bc = bc.0.hypot(bc.1);
    if norm_ba == 0.0 || norm_bc == 0.0 {
        return None;
    }

    let dot = ba.0.mul_add(bc.0, ba.1 * bc.1);
    let cosine = (dot / (norm_ba * norm_bc)).clamp(-1.0, 1.0);
    let angle = cosine.acos().to_degrees();

    angle.is_finite().then_some(angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint::new(x, y)
    }

    #[test]
    fn test_right_angle() {
        let angle = calculate_angle(kp(0.0, 1.0), kp(0.0, 0.0), kp(1.0, 0.0)).unwrap();
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_colinear_straight_leg() {
        let angle = calculate_angle(kp(0.0, 10.0), kp(0.0, 5.0), kp(0.0, 0.0)).unwrap();
        assert!((angle - 180.0).abs() < 1e-3);

        // Off-axis colinear points accumulate rounding; clamping keeps them defined.
        let angle = calculate_angle(kp(3.0, 7.0), kp(2.0, 5.0), kp(1.0, 3.0)).unwrap();
        assert!((angle - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_folded_back() {
        let angle = calculate_angle(kp(5.0, 0.0), kp(0.0, 0.0), kp(10.0, 0.0)).unwrap();
        assert!(angle.abs() < 1e-3);
    }

    #[test]
    fn test_forty_five_degrees() {
        let angle = calculate_angle(kp(1.0, 0.0), kp(0.0, 0.0), kp(1.0, 1.0)).unwrap();
        assert!((angle - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_coincident_points_undefined() {
        assert!(calculate_angle(kp(1.0, 1.0), kp(1.0, 1.0), kp(2.0, 3.0)).is_none());
        assert!(calculate_angle(kp(2.0, 3.0), kp(1.0, 1.0), kp(1.0, 1.0)).is_none());
        assert!(calculate_angle(kp(0.0, 0.0), kp(0.0, 0.0), kp(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_nan_input_undefined() {
        assert!(calculate_angle(kp(f32::NAN, 0.0), kp(0.0, 0.0), kp(1.0, 0.0)).is_none());
        assert!(calculate_angle(kp(0.0, 1.0), kp(0.0, f32::NAN), kp(1.0, 0.0)).is_none());
        assert!(calculate_angle(kp(0.0, 1.0), kp(0.0, 0.0), Keypoint::undetected()).is_none());
    }

    #[test]
    fn test_angle_range() {
        let points = [
            (kp(12.0, -3.0), kp(0.5, 0.25), kp(-7.0, 9.0)),
            (kp(640.0, 10.0), kp(320.0, 240.0), kp(300.0, 470.0)),
            (kp(1e-3, 0.0), kp(0.0, 0.0), kp(0.0, 1e-3)),
        ];
        for (a, b, c) in points {
            let angle = calculate_angle(a, b, c).unwrap();
            assert!((0.0..=180.0).contains(&angle), "angle {angle} out of range");
        }
    }
}
