//! Core types and utilities for fiducial marker tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! capture frames or extract contours; it operates on grayscale buffers and
//! on quadrilaterals found elsewhere (see `memory_game::detect::find_quads`).

mod camera;
mod homography;
mod image;
mod logger;
mod quad;
mod rectify;

pub use camera::{CameraIntrinsics, CameraModel, Distortion, UndistortConfig};
pub use homography::Homography;
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, ImageError};
pub use quad::{filter_quads, Quad, QuadFilterParams};
pub use rectify::rectify_quad;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
