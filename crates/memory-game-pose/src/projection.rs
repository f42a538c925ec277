use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

const MIN_W: f64 = 1e-12;

/// Integer screen position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// `3 × 4` matrix mapping homogeneous object points to homogeneous screen
/// points: `K · [R | t]`.
///
/// Lens distortion is not part of this mapping; overlays are placed with the
/// pinhole model only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMatrix {
    pub m: Matrix3x4<f64>,
}

impl ProjectionMatrix {
    pub fn new(m: Matrix3x4<f64>) -> Self {
        Self { m }
    }

    /// `intrinsics · [rotation | translation]`.
    pub fn from_pose(
        intrinsics: &Matrix3<f64>,
        rotation: &Matrix3<f64>,
        translation: &Vector3<f64>,
    ) -> Self {
        let mut extrinsic = Matrix3x4::<f64>::zeros();
        extrinsic.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        extrinsic.set_column(3, translation);
        Self::new(intrinsics * extrinsic)
    }

    /// Homogeneous product `P · (x, y, z, 1)`.
    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Vector3<f64> {
        self.m * Vector4::new(p.x, p.y, p.z, 1.0)
    }

    /// Projection with perspective division. `None` when the point lies on
    /// the camera plane.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        let v = self.apply(p);
        if !v[2].is_finite() || v[2].abs() < MIN_W {
            return None;
        }
        let q = Point2::new(v[0] / v[2], v[1] / v[2]);
        (q.x.is_finite() && q.y.is_finite()).then_some(q)
    }

    /// Projection to integer pixels, truncating toward zero.
    pub fn to_screen(&self, p: &Point3<f64>) -> Option<ScreenPoint> {
        let q = self.project(p)?;
        let (x, y) = (q.x.trunc(), q.y.trunc());
        let range = i32::MIN as f64..=i32::MAX as f64;
        if !range.contains(&x) || !range.contains(&y) {
            return None;
        }
        Some(ScreenPoint::new(x as i32, y as i32))
    }
}
