use crate::correspondence::world_correspondence;
use crate::projection::ProjectionMatrix;
use crate::solver::{PlanarPoseSolver, PoseSolver};
use log::debug;
use memory_game_core::{CameraModel, Quad};
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by [`PoseResolver::resolve`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoseError {
    #[error("rotation index {0} is outside 0..=3")]
    InvalidRotationIndex(u8),
    #[error("corner set is degenerate")]
    DegenerateCorners,
    #[error("camera intrinsics are not usable")]
    InvalidIntrinsics,
    #[error("pose not found")]
    Unresolved,
}

impl PoseError {
    /// True for upstream contract violations, false when the solver simply
    /// did not converge on well-formed input.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(self, PoseError::Unresolved)
    }
}

/// Camera-from-marker pose and the projection built from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Rotation as axis-angle, as returned by the solver.
    pub rvec: Vector3<f64>,
    pub projection: ProjectionMatrix,
    /// RMS reprojection error of the four corners (pixels).
    pub reprojection_rms_px: f64,
}

/// Turns a matched marker's rotation index and pixel corners into a pose.
#[derive(Clone, Debug)]
pub struct PoseResolver<S = PlanarPoseSolver> {
    camera: CameraModel,
    solver: S,
}

impl PoseResolver<PlanarPoseSolver> {
    /// Resolver using the built-in planar solver with default parameters.
    pub fn with_camera(camera: CameraModel) -> Self {
        Self::new(camera, PlanarPoseSolver::default())
    }
}

impl<S: PoseSolver> PoseResolver<S> {
    pub fn new(camera: CameraModel, solver: S) -> Self {
        Self { camera, solver }
    }

    #[inline]
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    #[inline]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Solve the pose for corners given in contour-traversal order.
    ///
    /// The correspondence set is picked by `rotation_index`, so the same
    /// corner order yields a consistent marker frame whatever the physical
    /// orientation of the card.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, corners), fields(rotation = rotation_index))
    )]
    pub fn resolve(
        &self,
        rotation_index: u8,
        corners: &[Point2<f64>; 4],
    ) -> Result<ResolvedPose, PoseError> {
        let object =
            world_correspondence(rotation_index).ok_or(PoseError::InvalidRotationIndex(rotation_index))?;
        if !self.camera.intrinsics.is_valid() {
            return Err(PoseError::InvalidIntrinsics);
        }
        let quad = Quad::new(corners.map(|p| Point2::new(p.x as f32, p.y as f32)));
        if quad.is_degenerate() {
            return Err(PoseError::DegenerateCorners);
        }

        let Some(solution) = self.solver.solve(object, corners, &self.camera) else {
            debug!("pose not found for rotation {rotation_index}");
            return Err(PoseError::Unresolved);
        };

        let rotation = solution.rotation();
        let projection =
            ProjectionMatrix::from_pose(&self.camera.intrinsics.matrix(), &rotation, &solution.tvec);

        Ok(ResolvedPose {
            rotation,
            translation: solution.tvec,
            rvec: solution.rvec,
            projection,
            reprojection_rms_px: solution.rms_px,
        })
    }

    /// [`resolve`](Self::resolve) for a candidate quad.
    pub fn resolve_quad(&self, rotation_index: u8, quad: &Quad) -> Result<ResolvedPose, PoseError> {
        self.resolve(rotation_index, &quad.corners_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::PoseSolution;
    use crate::WORLD_CORRESPONDENCES;
    use memory_game_core::CameraIntrinsics;
    use nalgebra::Point3;

    struct NeverConverges;

    impl PoseSolver for NeverConverges {
        fn solve(
            &self,
            _object: &[Point3<f64>; 4],
            _image: &[Point2<f64>; 4],
            _camera: &CameraModel,
        ) -> Option<PoseSolution> {
            None
        }
    }

    fn camera() -> CameraModel {
        CameraModel::pinhole(CameraIntrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 400.0,
            cy: 300.0,
        })
    }

    fn square_corners() -> [Point2<f64>; 4] {
        [
            Point2::new(350.0, 250.0),
            Point2::new(450.0, 250.0),
            Point2::new(450.0, 350.0),
            Point2::new(350.0, 350.0),
        ]
    }

    #[test]
    fn fronto_parallel_square_reprojects_exactly() {
        let resolver = PoseResolver::with_camera(camera());
        let corners = square_corners();
        for k in 0..4u8 {
            let pose = resolver.resolve(k, &corners).expect("pose");
            for (obj, px) in WORLD_CORRESPONDENCES[k as usize].iter().zip(&corners) {
                let q = pose.projection.project(obj).unwrap();
                assert!((q - px).norm() < 1e-6, "k={k}: {q:?} vs {px:?}");
            }
            assert!(pose.translation.z > 0.0);
        }
    }

    #[test]
    fn rotation_index_changes_marker_frame_not_corners() {
        let resolver = PoseResolver::with_camera(camera());
        let corners = square_corners();
        let p0 = resolver.resolve(0, &corners).unwrap();
        let p1 = resolver.resolve(1, &corners).unwrap();
        // object origin sits at quad corner 0 for k = 0 and at corner 3 for k = 1
        let o = Point3::origin();
        assert!((p0.projection.project(&o).unwrap() - corners[0]).norm() < 1e-6);
        assert!((p1.projection.project(&o).unwrap() - corners[3]).norm() < 1e-6);
    }

    #[test]
    fn errors_are_classified() {
        let resolver = PoseResolver::with_camera(camera());
        let err = resolver.resolve(4, &square_corners()).unwrap_err();
        assert_eq!(err, PoseError::InvalidRotationIndex(4));
        assert!(err.is_malformed_input());

        let flat = [Point2::new(1.0, 1.0); 4];
        assert_eq!(
            resolver.resolve(0, &flat).unwrap_err(),
            PoseError::DegenerateCorners
        );

        let failing = PoseResolver::new(camera(), NeverConverges);
        let err = failing.resolve(0, &square_corners()).unwrap_err();
        assert_eq!(err, PoseError::Unresolved);
        assert!(!err.is_malformed_input());

        let broken = PoseResolver::with_camera(CameraModel::pinhole(CameraIntrinsics {
            fx: 0.0,
            fy: 0.0,
            cx: 0.0,
            cy: 0.0,
        }));
        assert_eq!(
            broken.resolve(0, &square_corners()).unwrap_err(),
            PoseError::InvalidIntrinsics
        );
    }
}
