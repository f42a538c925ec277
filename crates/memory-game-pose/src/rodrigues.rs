//! Axis-angle ⇄ rotation matrix.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Rotation vector (axis × angle, radians) to a 3×3 rotation matrix.
pub fn rodrigues(rvec: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*rvec).into_inner()
}

/// Inverse of [`rodrigues`]. `r` is re-orthonormalised first.
pub fn rotation_vector(r: &Matrix3<f64>) -> Vector3<f64> {
    Rotation3::from_matrix(r).scaled_axis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_is_identity() {
        assert!((rodrigues(&Vector3::zeros()) - Matrix3::identity()).norm() < 1e-15);
    }

    #[test]
    fn quarter_turn_about_z() {
        let r = rodrigues(&Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let x = r * Vector3::x();
        assert!((x - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn round_trip() {
        let v = Vector3::new(0.3, -0.2, 1.1);
        let back = rotation_vector(&rodrigues(&v));
        assert!((back - v).norm() < 1e-9);
    }
}
