//! Marker catalog and identification for the memory game.
//!
//! This crate focuses on:
//! - square two-valued marker grids and their 90° rotations,
//! - a catalog of registered templates with all four rotations precomputed,
//! - exact matching of an observed grid against the catalog,
//! - reducing a rectified marker patch to a grid (Otsu + centre sampling).
//!
//! It does **not** find quadrilaterals in a frame. Candidates arrive as
//! rectified patches or already-sampled grids.

mod catalog;
mod grid;
mod matcher;
mod sample;

pub use catalog::{CatalogError, MarkerCatalog, MarkerTemplate, MarkerType, ShadowedTemplate};
pub use grid::{GridError, MarkerGrid, CELL_DARK, CELL_LIGHT};
pub use matcher::{match_marker, DetectedMarker, MarkerMatcher, MatchError};
pub use sample::{sample_marker_grid, GridSampleConfig, PatchHistogram, SampleError};
