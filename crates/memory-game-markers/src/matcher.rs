//! Catalog matching for observed marker grids.

use crate::{MarkerCatalog, MarkerGrid, MarkerTemplate, MarkerType};
use serde::Serialize;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A catalog match for one observed grid.
#[derive(Clone, Debug, Serialize)]
pub struct DetectedMarker {
    pub id: u32,
    pub marker_type: MarkerType,
    /// Rotation `0..=3` such that `observed == template.rotations()[rotation_index]`.
    pub rotation_index: u8,
    #[serde(skip)]
    template: Arc<MarkerTemplate>,
}

impl DetectedMarker {
    /// Template this detection was matched against.
    pub fn template(&self) -> &Arc<MarkerTemplate> {
        &self.template
    }

    /// The four rotation grids of the matched template.
    pub fn rotations(&self) -> &[MarkerGrid; 4] {
        self.template.rotations()
    }
}

impl PartialEq for DetectedMarker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.marker_type == other.marker_type
            && self.rotation_index == other.rotation_index
            && Arc::ptr_eq(&self.template, &other.template)
    }
}

/// The observed grid violates the matcher's input contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("grid is {got}x{got}, catalog expects {expected}x{expected}")]
    GridSize { expected: usize, got: usize },
}

/// Exact matcher over a borrowed catalog.
///
/// Templates are scanned in registration order, then rotations `0..=3`; the
/// first exact hit wins. A later template whose rotation duplicates an
/// earlier one is therefore never reported (see
/// [`MarkerCatalog::duplicate_patterns`]).
#[derive(Clone, Copy, Debug)]
pub struct MarkerMatcher<'a> {
    catalog: &'a MarkerCatalog,
}

impl<'a> MarkerMatcher<'a> {
    pub fn new(catalog: &'a MarkerCatalog) -> Self {
        Self { catalog }
    }

    #[inline]
    pub fn catalog(&self) -> &'a MarkerCatalog {
        self.catalog
    }

    /// `Ok(None)` when no template matches in any rotation.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, grid), fields(size = grid.size()))
    )]
    pub fn match_grid(&self, grid: &MarkerGrid) -> Result<Option<DetectedMarker>, MatchError> {
        let expected = self.catalog.grid_size();
        if grid.size() != expected {
            return Err(MatchError::GridSize {
                expected,
                got: grid.size(),
            });
        }

        for template in self.catalog.templates() {
            if let Some(rot) = template.rotations().iter().position(|r| r == grid) {
                return Ok(Some(DetectedMarker {
                    id: template.id(),
                    marker_type: template.marker_type(),
                    rotation_index: rot as u8,
                    template: Arc::clone(template),
                }));
            }
        }

        Ok(None)
    }
}

/// Convenience wrapper around [`MarkerMatcher::match_grid`].
pub fn match_marker(
    catalog: &MarkerCatalog,
    grid: &MarkerGrid,
) -> Result<Option<DetectedMarker>, MatchError> {
    MarkerMatcher::new(catalog).match_grid(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CELL_DARK, CELL_LIGHT};

    #[test]
    fn every_builtin_rotation_matches_itself() {
        let catalog = MarkerCatalog::builtin();
        let matcher = MarkerMatcher::new(&catalog);
        for t in catalog.templates() {
            for (k, grid) in t.rotations().iter().enumerate() {
                let m = matcher.match_grid(grid).unwrap().expect("match");
                assert_eq!(m.id, t.id());
                assert_eq!(m.marker_type, t.marker_type());
                assert_eq!(m.rotation_index as usize, k);
                assert!(Arc::ptr_eq(m.template(), t));
            }
        }
    }

    #[test]
    fn rotated_base_reports_rotation_one() {
        let mut catalog = MarkerCatalog::builtin();
        let base = MarkerGrid::from_rows(&[
            [0u8, 0, 0, 0, 0, 0],
            [0, 255, 255, 255, 255, 0],
            [0, 255, 0, 0, 0, 0],
            [0, 255, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0],
        ])
        .unwrap();
        catalog
            .register(5, MarkerType::TypeB, base.clone())
            .unwrap();

        let m = match_marker(&catalog, &base.rotate_ccw())
            .unwrap()
            .expect("match");
        assert_eq!(m.id, 5);
        assert_eq!(m.rotation_index, 1);
        assert_eq!(m.rotations()[1], base.rotate_ccw());
    }

    #[test]
    fn unknown_grid_is_no_match() {
        let catalog = MarkerCatalog::builtin();
        let blank = MarkerGrid::from_cells(6, vec![CELL_DARK; 36]).unwrap();
        assert_eq!(match_marker(&catalog, &blank).unwrap(), None);

        // one flipped cell is enough to miss: matching is exact
        let mut cells = catalog.templates()[0].base().cells().to_vec();
        cells[7] = if cells[7] == CELL_DARK { CELL_LIGHT } else { CELL_DARK };
        let noisy = MarkerGrid::from_cells(6, cells).unwrap();
        assert_eq!(match_marker(&catalog, &noisy).unwrap(), None);
    }

    #[test]
    fn wrong_dimension_is_malformed_not_no_match() {
        let catalog = MarkerCatalog::builtin();
        let small = MarkerGrid::from_cells(5, vec![CELL_DARK; 25]).unwrap();
        assert_eq!(
            match_marker(&catalog, &small).unwrap_err(),
            MatchError::GridSize {
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn first_registered_template_wins_ties() {
        let base = MarkerGrid::from_rows(&[[0u8, 255], [0, 0]]).unwrap();
        let mut catalog = MarkerCatalog::new(2).unwrap();
        catalog.register(7, MarkerType::TypeA, base.clone()).unwrap();
        catalog
            .register(8, MarkerType::TypeB, base.rotate_ccw())
            .unwrap();

        let m = match_marker(&catalog, &base.rotate_ccw())
            .unwrap()
            .expect("match");
        assert_eq!(m.id, 7);
        assert_eq!(m.rotation_index, 1);
    }

    #[test]
    fn shadowed_template_loses_in_every_rotation() {
        let base = MarkerGrid::from_rows(&[[0u8, 255, 0], [0, 0, 255], [0, 0, 0]]).unwrap();
        let mut catalog = MarkerCatalog::new(3).unwrap();
        catalog.register(7, MarkerType::TypeA, base.clone()).unwrap();
        catalog
            .register(8, MarkerType::TypeB, base.rotate_ccw().rotate_ccw())
            .unwrap();

        let shadowed = Arc::clone(&catalog.templates()[1]);
        for grid in shadowed.rotations() {
            let m = match_marker(&catalog, grid).unwrap().expect("match");
            assert_eq!(m.id, 7);
        }
    }
}
