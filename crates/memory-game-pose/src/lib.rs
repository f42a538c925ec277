//! Marker pose and projection.
//!
//! Given the rotation index reported by the marker matcher, the pixel corners
//! of the candidate quad and a calibrated camera, this crate picks the
//! matching object-space correspondence set, solves the camera-from-marker
//! pose, and assembles the `3 × 4` projection matrix `K · [R | t]` used to
//! place overlays.
//!
//! ## Rounding
//!
//! Screen coordinates are produced by perspective division followed by
//! truncation toward zero (see [`ProjectionMatrix::to_screen`]).

mod correspondence;
mod projection;
mod resolver;
mod rodrigues;
mod solver;

pub use correspondence::{world_correspondence, WORLD_CORRESPONDENCES};
pub use projection::{ProjectionMatrix, ScreenPoint};
pub use resolver::{PoseError, PoseResolver, ResolvedPose};
pub use rodrigues::{rodrigues, rotation_vector};
pub use solver::{PlanarPoseSolver, PoseSolution, PoseSolver, PoseSolverParams};
