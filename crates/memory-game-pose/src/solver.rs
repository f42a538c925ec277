//! Perspective pose from four planar correspondences.

use crate::rodrigues::{rodrigues, rotation_vector};
use log::debug;
use memory_game_core::{CameraModel, Homography, Quad};
use nalgebra::{Matrix3, Point2, Point3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Camera-from-object pose as rotation vector + translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseSolution {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
    /// RMS reprojection error over the input correspondences (pixels).
    pub rms_px: f64,
}

impl PoseSolution {
    pub fn rotation(&self) -> Matrix3<f64> {
        rodrigues(&self.rvec)
    }
}

/// Perspective-n-point solver seam.
///
/// `object` and `image` are index-aligned. Implementations return `None`
/// when no pose can be found.
pub trait PoseSolver {
    fn solve(
        &self,
        object: &[Point3<f64>; 4],
        image: &[Point2<f64>; 4],
        camera: &CameraModel,
    ) -> Option<PoseSolution>;
}

/// Tuning for [`PlanarPoseSolver`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSolverParams {
    /// Gauss-Newton refinement iterations after the closed-form estimate.
    pub max_iterations: usize,
    /// Reject solutions whose RMS reprojection error exceeds this (pixels).
    pub max_reprojection_error_px: f64,
}

impl Default for PoseSolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            max_reprojection_error_px: 2.0,
        }
    }
}

/// Pose of a planar (`z = 0`) target from exactly four correspondences.
///
/// The closed-form start comes from decomposing the object-plane to
/// normalized-image homography into `[r1 r2 t]`; it is then refined by
/// damped Gauss-Newton on the pixel reprojection error, distortion included.
#[derive(Clone, Debug, Default)]
pub struct PlanarPoseSolver {
    pub params: PoseSolverParams,
}

impl PlanarPoseSolver {
    pub fn new(params: PoseSolverParams) -> Self {
        Self { params }
    }
}

impl PoseSolver for PlanarPoseSolver {
    fn solve(
        &self,
        object: &[Point3<f64>; 4],
        image: &[Point2<f64>; 4],
        camera: &CameraModel,
    ) -> Option<PoseSolution> {
        if object.iter().any(|p| p.z.abs() > 1e-12) {
            debug!("planar solver needs z = 0 object points");
            return None;
        }

        let quad = Quad::new(image.map(|p| Point2::new(p.x as f32, p.y as f32)));
        if quad.is_degenerate() {
            debug!("degenerate image quad");
            return None;
        }

        let mut normalized = [Point2::origin(); 4];
        for (n, px) in normalized.iter_mut().zip(image) {
            *n = camera.undistort_normalized(*px)?;
        }
        let plane = object.map(|p| Point2::new(p.x, p.y));

        let (r0, t0) = initial_pose(&plane, &normalized)?;
        let mut params = pack(&rotation_vector(&r0), &t0);
        let mut cost = reprojection_cost(&params, object, image, camera)?;
        let mut damping = 1e-6;

        for _ in 0..self.params.max_iterations {
            let Some((jtj, jtr)) = normal_equations(&params, object, image, camera) else {
                break;
            };
            let lhs = jtj + SMatrix::<f64, 6, 6>::identity() * damping;
            let Some(delta) = lhs.lu().solve(&(-jtr)) else {
                break;
            };
            let candidate = params + delta;
            match reprojection_cost(&candidate, object, image, camera) {
                Some(c) if c <= cost => {
                    params = candidate;
                    cost = c;
                    damping = (damping * 0.1).max(1e-12);
                    if delta.norm() < 1e-12 {
                        break;
                    }
                }
                _ => {
                    damping *= 10.0;
                    if damping > 1e6 {
                        break;
                    }
                }
            }
        }

        let (rvec, tvec) = unpack(&params);
        let rms_px = (cost / image.len() as f64).sqrt();
        if !rms_px.is_finite() || rms_px > self.params.max_reprojection_error_px {
            debug!("pose rejected: rms reprojection {rms_px:.3}px");
            return None;
        }
        if tvec.z <= 0.0 {
            return None;
        }

        Some(PoseSolution { rvec, tvec, rms_px })
    }
}

/// Closed-form pose from the plane-to-normalized-image homography.
fn initial_pose(
    plane: &[Point2<f64>; 4],
    normalized: &[Point2<f64>; 4],
) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    let h = Homography::from_point_pairs(plane, normalized)?.h;
    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let norm = 0.5 * (h1.norm() + h2.norm());
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    // Keep the target in front of the camera.
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t = h3 * lambda;

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let r = u * v_t;

    Some((r, t))
}

fn pack(rvec: &Vector3<f64>, tvec: &Vector3<f64>) -> SVector<f64, 6> {
    SVector::<f64, 6>::new(rvec.x, rvec.y, rvec.z, tvec.x, tvec.y, tvec.z)
}

fn unpack(params: &SVector<f64, 6>) -> (Vector3<f64>, Vector3<f64>) {
    (
        Vector3::new(params[0], params[1], params[2]),
        Vector3::new(params[3], params[4], params[5]),
    )
}

fn residuals(
    params: &SVector<f64, 6>,
    object: &[Point3<f64>; 4],
    image: &[Point2<f64>; 4],
    camera: &CameraModel,
) -> Option<SVector<f64, 8>> {
    let (rvec, tvec) = unpack(params);
    let r = rodrigues(&rvec);
    let mut out = SVector::<f64, 8>::zeros();
    for (i, (obj, px)) in object.iter().zip(image).enumerate() {
        let p_cam = Point3::from(r * obj.coords + tvec);
        if p_cam.z <= 0.0 {
            return None;
        }
        let proj = camera.project_point(p_cam)?;
        out[2 * i] = proj.x - px.x;
        out[2 * i + 1] = proj.y - px.y;
    }
    Some(out)
}

fn reprojection_cost(
    params: &SVector<f64, 6>,
    object: &[Point3<f64>; 4],
    image: &[Point2<f64>; 4],
    camera: &CameraModel,
) -> Option<f64> {
    residuals(params, object, image, camera).map(|r| r.norm_squared())
}

/// `JᵀJ` and `Jᵀr` with a forward-difference Jacobian.
fn normal_equations(
    params: &SVector<f64, 6>,
    object: &[Point3<f64>; 4],
    image: &[Point2<f64>; 4],
    camera: &CameraModel,
) -> Option<(SMatrix<f64, 6, 6>, SVector<f64, 6>)> {
    const STEP: f64 = 1e-7;
    let r0 = residuals(params, object, image, camera)?;
    let mut jac = SMatrix::<f64, 8, 6>::zeros();
    for k in 0..6 {
        let mut shifted = *params;
        let h = STEP * params[k].abs().max(1.0);
        shifted[k] += h;
        let rk = residuals(&shifted, object, image, camera)?;
        jac.set_column(k, &((rk - r0) / h));
    }
    let jt = jac.transpose();
    Some((jt * jac, jt * r0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_game_core::{CameraIntrinsics, Distortion};

    fn unit_square() -> [Point3<f64>; 4] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    fn camera(distortion: Distortion) -> CameraModel {
        CameraModel {
            intrinsics: CameraIntrinsics {
                fx: 780.0,
                fy: 790.0,
                cx: 400.0,
                cy: 300.0,
            },
            distortion,
        }
    }

    fn observe(
        cam: &CameraModel,
        rvec: Vector3<f64>,
        tvec: Vector3<f64>,
        object: &[Point3<f64>; 4],
    ) -> [Point2<f64>; 4] {
        let r = rodrigues(&rvec);
        object.map(|p| {
            cam.project_point(Point3::from(r * p.coords + tvec))
                .expect("in front")
        })
    }

    #[test]
    fn recovers_synthetic_pose() {
        let cam = camera(Distortion::default());
        let rvec = Vector3::new(0.25, -0.35, 0.4);
        let tvec = Vector3::new(-0.4, 0.2, 6.0);
        let object = unit_square();
        let image = observe(&cam, rvec, tvec, &object);

        let sol = PlanarPoseSolver::default()
            .solve(&object, &image, &cam)
            .expect("pose");
        assert!((sol.rvec - rvec).norm() < 1e-6, "rvec {:?}", sol.rvec);
        assert!((sol.tvec - tvec).norm() < 1e-6, "tvec {:?}", sol.tvec);
        assert!(sol.rms_px < 1e-6);
    }

    #[test]
    fn refinement_accounts_for_distortion() {
        let cam = camera(Distortion {
            k1: -0.2,
            k2: 0.05,
            p1: 0.001,
            p2: -0.001,
            k3: 0.0,
        });
        let rvec = Vector3::new(-0.2, 0.1, 1.2);
        let tvec = Vector3::new(0.8, -0.5, 5.0);
        let object = unit_square();
        let image = observe(&cam, rvec, tvec, &object);

        let sol = PlanarPoseSolver::default()
            .solve(&object, &image, &cam)
            .expect("pose");
        assert!((sol.tvec - tvec).norm() < 1e-5, "tvec {:?}", sol.tvec);
        assert!(sol.rms_px < 1e-4);
    }

    #[test]
    fn collinear_image_points_fail() {
        let cam = camera(Distortion::default());
        let image = [
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
            Point2::new(40.0, 40.0),
        ];
        assert!(PlanarPoseSolver::default()
            .solve(&unit_square(), &image, &cam)
            .is_none());
    }

    #[test]
    fn non_planar_object_is_rejected() {
        let cam = camera(Distortion::default());
        let mut object = unit_square();
        object[2].z = 0.5;
        let image = observe(&cam, Vector3::zeros(), Vector3::new(0.0, 0.0, 5.0), &unit_square());
        assert!(PlanarPoseSolver::default()
            .solve(&object, &image, &cam)
            .is_none());
    }
}
