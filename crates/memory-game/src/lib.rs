//! High-level facade for the `memory-game-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core, marker and pose crates,
//! - [`PresenceTracker`], which turns per-frame detections into
//!   added/removed events,
//! - [`FrameProcessor`], the rectify → sample → match → pose → presence
//!   pipeline over candidate quads,
//! - overlay geometry and JSON configuration,
//! - (feature `image`) contour tracing of candidate quads and helpers that
//!   run the pipeline on `image::GrayImage`.
//!
//! ## Quickstart
//!
//! ```no_run
//! use memory_game::{detect, FrameConfig, FrameProcessor};
//! use memory_game::core::CameraModel;
//! use memory_game::markers::MarkerCatalog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = detect::load_gray("frame.png")?;
//!
//! let mut processor =
//!     FrameProcessor::new(MarkerCatalog::builtin(), CameraModel::default(), FrameConfig::default());
//! let report = detect::detect_markers(&mut processor, &img);
//! for event in report.presence.events() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `memory_game::core`: images, homographies, quads, camera model, logger.
//! - `memory_game::markers`: marker grids, catalog, matcher, grid sampling.
//! - `memory_game::pose`: correspondences, pose solver, projection matrices.
//! - `memory_game::detect` (feature `image`): `find_quads`, `detect_markers`
//!   and other helpers over `image::GrayImage`.

pub use memory_game_core as core;
pub use memory_game_markers as markers;
pub use memory_game_pose as pose;

mod config;
mod frame;
mod overlay;
mod presence;

pub use config::{load_opencv_calibration, ConfigError, MemoryGameConfig};
pub use frame::{
    CandidateOutcome, CandidateReport, FrameConfig, FrameProcessor, FrameReport, MarkerObservation,
};
pub use overlay::{cube_points, Overlay};
pub use presence::{DetectionSet, PresenceEvent, PresenceTracker, PresenceUpdate};

#[cfg(feature = "image")]
pub mod detect;
