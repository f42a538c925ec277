//! Plane-to-plane homographies fitted to four point pairs.

use crate::Quad;
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};

/// Twice the triangle area below which three conditioned points count as
/// collinear. Conditioned points sit at mean distance `√2` from the origin.
const COLLINEAR_EPS: f64 = 1e-9;

/// Projective map `p' ~ H · p` between two image planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Fit `H` with `dst[i] ~ H · src[i]` for the four pairs.
    ///
    /// `None` when three points of either side are collinear, or when the
    /// linear system has no finite solution.
    pub fn from_point_pairs(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Self> {
        let cs = Conditioning::fit(src)?;
        let cd = Conditioning::fit(dst)?;
        let s = src.map(|p| cs.apply(p));
        let d = dst.map(|p| cd.apply(p));
        if has_collinear_triple(&s) || has_collinear_triple(&d) {
            return None;
        }

        // h33 = 1; two rows per pair.
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (k, (p, q)) in s.iter().zip(&d).enumerate() {
            let (u, v) = (2 * k, 2 * k + 1);
            a[(u, 0)] = p.x;
            a[(u, 1)] = p.y;
            a[(u, 2)] = 1.0;
            a[(u, 6)] = -q.x * p.x;
            a[(u, 7)] = -q.x * p.y;
            b[u] = q.x;

            a[(v, 3)] = p.x;
            a[(v, 4)] = p.y;
            a[(v, 5)] = 1.0;
            a[(v, 6)] = -q.y * p.x;
            a[(v, 7)] = -q.y * p.y;
            b[v] = q.y;
        }
        let x = a.lu().solve(&b)?;
        let conditioned = Matrix3::new(
            x[0], x[1], x[2], //
            x[3], x[4], x[5], //
            x[6], x[7], 1.0,
        );

        let h = cd.undo() * conditioned * cs.matrix();
        let w = h[(2, 2)];
        if !w.is_finite() || w.abs() < 1e-12 {
            return None;
        }
        let h = h / w;
        h.iter().all(|v| v.is_finite()).then(|| Self::new(h))
    }

    /// Map from a `side × side` patch (corners TL, TR, BR, BL) onto `quad`,
    /// corner `i` to corner `i`.
    pub fn patch_to_quad(side: f64, quad: &Quad) -> Option<Self> {
        let patch = [
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ];
        Self::from_point_pairs(&patch, &quad.corners_f64())
    }

    /// Apply with perspective division.
    #[inline]
    pub fn map(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity moving four points' centroid to the origin and their mean
/// distance from it to `√2`.
#[derive(Clone, Copy, Debug)]
struct Conditioning {
    centroid: Vector2<f64>,
    scale: f64,
}

impl Conditioning {
    fn fit(pts: &[Point2<f64>; 4]) -> Option<Self> {
        let centroid = pts.iter().map(|p| p.coords).sum::<Vector2<f64>>() / 4.0;
        let spread = pts.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / 4.0;
        if !spread.is_finite() || spread < 1e-12 {
            return None;
        }
        Some(Self {
            centroid,
            scale: std::f64::consts::SQRT_2 / spread,
        })
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from((p.coords - self.centroid) * self.scale)
    }

    fn matrix(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(
            s, 0.0, -s * self.centroid.x, //
            0.0, s, -s * self.centroid.y, //
            0.0, 0.0, 1.0,
        )
    }

    /// Inverse of [`Self::matrix`].
    fn undo(&self) -> Matrix3<f64> {
        let r = 1.0 / self.scale;
        Matrix3::new(
            r, 0.0, self.centroid.x, //
            0.0, r, self.centroid.y, //
            0.0, 0.0, 1.0,
        )
    }
}

fn has_collinear_triple(p: &[Point2<f64>; 4]) -> bool {
    (0..4).any(|skip| {
        let [a, b, c]: [Point2<f64>; 3] = match skip {
            0 => [p[1], p[2], p[3]],
            1 => [p[0], p[2], p[3]],
            2 => [p[0], p[1], p[3]],
            _ => [p[0], p[1], p[2]],
        };
        (b - a).perp(&(c - a)).abs() < COLLINEAR_EPS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert!((a - b).norm() < tol, "{a:?} vs {b:?}");
    }

    #[test]
    fn inverse_maps_points_back() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");
        for p in [Point2::new(0.0, 0.0), Point2::new(50.0, -20.0), Point2::new(320.0, 200.0)] {
            assert_near(inv.map(h.map(p)), p, 1e-6);
        }
    }

    #[test]
    fn fitted_map_reproduces_a_known_one() {
        let truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let fitted = Homography::from_point_pairs(&src, &src.map(|p| truth.map(p))).expect("fit");
        for p in [Point2::new(60.0, 40.0), Point2::new(150.0, 120.0)] {
            assert_near(fitted.map(p), truth.map(p), 1e-6);
        }
    }

    #[test]
    fn patch_corners_land_on_quad_corners() {
        let quad = Quad::from_array([[60.0, 50.0], [330.0, 70.0], [350.0, 340.0], [40.0, 320.0]]);
        let h = Homography::patch_to_quad(300.0, &quad).expect("fit");
        assert_near(h.map(Point2::new(300.0, 0.0)), Point2::new(330.0, 70.0), 1e-6);
        assert_near(h.map(Point2::new(0.0, 300.0)), Point2::new(40.0, 320.0), 1e-6);
    }

    #[test]
    fn collinear_points_have_no_homography() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(3.0, 3.0),
        ];
        assert!(Homography::from_point_pairs(&src, &line).is_none());
        assert!(Homography::from_point_pairs(&line, &src).is_none());
    }
}
