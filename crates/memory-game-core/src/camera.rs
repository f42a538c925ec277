//! Pinhole camera intrinsics and Brown-Conrady distortion.
//!
//! Distortion coefficients use the OpenCV ordering `k1, k2, p1, p2, k3`, so
//! a calibration stored by OpenCV maps onto [`Distortion`] field by field.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Returns `true` when all values are finite and focal lengths non-zero.
    pub fn is_valid(self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    /// The 3×3 camera matrix `K`.
    pub fn matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Read `fx, fy, cx, cy` from a camera matrix. Skew is ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    /// Convert pixel coordinates to normalized pinhole coordinates.
    pub fn pixel_to_normalized(self, pixel: Point2<f64>) -> Option<Point2<f64>> {
        if !self.is_valid() {
            return None;
        }
        let x = (pixel.x - self.cx) / self.fx;
        let y = (pixel.y - self.cy) / self.fy;
        (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
    }

    /// Convert normalized pinhole coordinates to pixel coordinates.
    pub fn normalized_to_pixel(self, normalized: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }
}

/// Brown-Conrady radial-tangential distortion coefficients.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    /// Build from an OpenCV coefficient vector. Missing trailing entries are zero;
    /// entries beyond `k3` (rational/thin-prism terms) are not supported.
    pub fn from_coefficients(coeffs: &[f64]) -> Option<Self> {
        if coeffs.len() > 5 {
            return None;
        }
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Some(Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
        })
    }

    pub fn coefficients(self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(self) -> bool {
        self.coefficients().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort_normalized(self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(x * radial + x_tan, y * radial + y_tan)
    }
}

/// Fixed-point settings for iterative undistortion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UndistortConfig {
    pub max_iters: usize,
    pub eps: f64,
}

impl Default for UndistortConfig {
    fn default() -> Self {
        Self {
            max_iters: 15,
            eps: 1e-12,
        }
    }
}

/// Complete camera model (intrinsics + distortion).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraModel {
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: Distortion,
}

impl Default for CameraModel {
    /// A distortion-free 800×600 webcam guess, used until a calibration is loaded.
    fn default() -> Self {
        Self {
            intrinsics: CameraIntrinsics {
                fx: 800.0,
                fy: 800.0,
                cx: 400.0,
                cy: 300.0,
            },
            distortion: Distortion::default(),
        }
    }
}

impl CameraModel {
    pub fn pinhole(intrinsics: CameraIntrinsics) -> Self {
        Self {
            intrinsics,
            distortion: Distortion::default(),
        }
    }

    /// Project a point given in the camera frame to (distorted) pixels.
    pub fn project_point(self, p_cam: Point3<f64>) -> Option<Point2<f64>> {
        if p_cam.z.abs() < 1e-12 {
            return None;
        }
        let n = Point2::new(p_cam.x / p_cam.z, p_cam.y / p_cam.z);
        let pix = self
            .intrinsics
            .normalized_to_pixel(self.distortion.distort_normalized(n));
        (pix.x.is_finite() && pix.y.is_finite()).then_some(pix)
    }

    /// Distorted pixel → undistorted normalized coordinates.
    pub fn undistort_normalized(self, distorted: Point2<f64>) -> Option<Point2<f64>> {
        self.undistort_normalized_with(distorted, UndistortConfig::default())
    }

    pub fn undistort_normalized_with(
        self,
        distorted: Point2<f64>,
        cfg: UndistortConfig,
    ) -> Option<Point2<f64>> {
        let xd = self.intrinsics.pixel_to_normalized(distorted)?;
        if self.distortion.is_zero() {
            return Some(xd);
        }
        let d = self.distortion;
        let mut x = xd.x;
        let mut y = xd.y;

        for _ in 0..cfg.max_iters.max(1) {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let radial = 1.0 + d.k1 * r2 + d.k2 * r4 + d.k3 * r6;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }

            let dx_tan = 2.0 * d.p1 * x * y + d.p2 * (r2 + 2.0 * x * x);
            let dy_tan = d.p1 * (r2 + 2.0 * y * y) + 2.0 * d.p2 * x * y;
            let x_next = (xd.x - dx_tan) / radial;
            let y_next = (xd.y - dy_tan) / radial;

            if !x_next.is_finite() || !y_next.is_finite() {
                return None;
            }

            let step = ((x_next - x).powi(2) + (y_next - y).powi(2)).sqrt();
            x = x_next;
            y = y_next;

            if step <= cfg.eps.max(0.0) {
                break;
            }
        }

        Some(Point2::new(x, y))
    }

    /// Distorted pixel → undistorted pixel.
    pub fn undistort_pixel(self, distorted: Point2<f64>) -> Option<Point2<f64>> {
        let n = self.undistort_normalized(distorted)?;
        Some(self.intrinsics.normalized_to_pixel(n))
    }

    /// Undistorted pixel → distorted pixel.
    pub fn distort_pixel(self, undistorted: Point2<f64>) -> Option<Point2<f64>> {
        let n = self.intrinsics.pixel_to_normalized(undistorted)?;
        let pix = self
            .intrinsics
            .normalized_to_pixel(self.distortion.distort_normalized(n));
        (pix.x.is_finite() && pix.y.is_finite()).then_some(pix)
    }
}
