//! Registered marker templates with precomputed rotations.

use crate::grid::{GridError, MarkerGrid};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Marker family. The game pairs markers of the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    TypeA,
    TypeB,
}

/// One registered marker with its four rotations.
///
/// `rotations[0]` is the grid as registered, `rotations[k]` is
/// `rotations[k - 1]` turned 90° counter-clockwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarkerTemplate {
    id: u32,
    marker_type: MarkerType,
    rotations: [MarkerGrid; 4],
}

impl MarkerTemplate {
    pub fn new(id: u32, marker_type: MarkerType, base: MarkerGrid) -> Self {
        Self {
            id,
            marker_type,
            rotations: base.rotations(),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn marker_type(&self) -> MarkerType {
        self.marker_type
    }

    #[inline]
    pub fn rotations(&self) -> &[MarkerGrid; 4] {
        &self.rotations
    }

    /// The grid as registered (rotation 0).
    #[inline]
    pub fn base(&self) -> &MarkerGrid {
        &self.rotations[0]
    }

    #[inline]
    pub fn grid_size(&self) -> usize {
        self.rotations[0].size()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog grid size must be > 0")]
    InvalidGridSize,
    #[error("marker {id}: grid is {got}x{got}, catalog expects {expected}x{expected}")]
    GridSize { id: u32, expected: usize, got: usize },
    #[error("marker {id}: {source}")]
    Grid {
        id: u32,
        #[source]
        source: GridError,
    },
}

/// A later template that can never be matched because one of its rotations
/// equals a rotation of an earlier template.
///
/// Turning both colliding grids by the same amount keeps them equal, so once
/// one rotation collides all four do, and the earlier template is scanned
/// first for each of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ShadowedTemplate {
    /// Registration index of the template that wins the tie.
    pub winner: usize,
    /// Registration index of the shadowed template.
    pub shadowed: usize,
    /// Rotation of the shadowed template that collides.
    pub rotation: u8,
}

/// Ordered collection of marker templates sharing one grid size.
///
/// Templates are kept in registration order, which is also the order the
/// matcher scans them in. Neither ids nor patterns are required to be unique.
#[derive(Clone, Debug)]
pub struct MarkerCatalog {
    grid_size: usize,
    templates: Vec<Arc<MarkerTemplate>>,
}

impl MarkerCatalog {
    pub fn new(grid_size: usize) -> Result<Self, CatalogError> {
        if grid_size == 0 {
            return Err(CatalogError::InvalidGridSize);
        }
        Ok(Self {
            grid_size,
            templates: Vec::new(),
        })
    }

    /// Register a template and synthesize its rotations.
    pub fn register(
        &mut self,
        id: u32,
        marker_type: MarkerType,
        base: MarkerGrid,
    ) -> Result<(), CatalogError> {
        if base.size() != self.grid_size {
            return Err(CatalogError::GridSize {
                id,
                expected: self.grid_size,
                got: base.size(),
            });
        }

        let template = MarkerTemplate::new(id, marker_type, base);
        let index = self.templates.len();
        if let Some(shadow) = self.find_shadowing(&template, index) {
            warn!(
                "marker {} (rotation {}) duplicates a rotation of marker {}; it will never match",
                id,
                shadow.rotation,
                self.templates[shadow.winner].id()
            );
        }
        self.templates.push(Arc::new(template));
        Ok(())
    }

    /// Register a template given as rows of cell values.
    pub fn register_rows<R: AsRef<[u8]>>(
        &mut self,
        id: u32,
        marker_type: MarkerType,
        rows: &[R],
    ) -> Result<(), CatalogError> {
        let base = MarkerGrid::from_rows(rows).map_err(|source| CatalogError::Grid { id, source })?;
        self.register(id, marker_type, base)
    }

    #[inline]
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in registration order.
    pub fn templates(&self) -> &[Arc<MarkerTemplate>] {
        &self.templates
    }

    /// First registered template with the given id.
    pub fn get(&self, id: u32) -> Option<&Arc<MarkerTemplate>> {
        self.templates.iter().find(|t| t.id() == id)
    }

    /// Every template that is masked by an earlier one under first-match.
    pub fn duplicate_patterns(&self) -> Vec<ShadowedTemplate> {
        self.templates
            .iter()
            .enumerate()
            .filter_map(|(index, t)| self.find_shadowing(t, index))
            .collect()
    }

    fn find_shadowing(&self, template: &MarkerTemplate, index: usize) -> Option<ShadowedTemplate> {
        for (winner, earlier) in self.templates[..index].iter().enumerate() {
            for (rotation, grid) in template.rotations().iter().enumerate() {
                if earlier.rotations().contains(grid) {
                    return Some(ShadowedTemplate {
                        winner,
                        shadowed: index,
                        rotation: rotation as u8,
                    });
                }
            }
        }
        None
    }

    /// The four-card deck of the table game: 6×6 grids, 0 = dark, 255 = light.
    ///
    /// Ids 0 and 1 are [`MarkerType::TypeA`], ids 2 and 3 are [`MarkerType::TypeB`].
    pub fn builtin() -> Self {
        let mut catalog = Self {
            grid_size: BUILTIN_GRID_SIZE,
            templates: Vec::with_capacity(BUILTIN_MARKERS.len()),
        };
        for (id, marker_type, rows) in BUILTIN_MARKERS {
            let cells = rows.iter().flatten().copied().collect();
            // sizes are fixed at compile time
            if let Ok(base) = MarkerGrid::from_cells(BUILTIN_GRID_SIZE, cells) {
                catalog
                    .templates
                    .push(Arc::new(MarkerTemplate::new(*id, *marker_type, base)));
            }
        }
        catalog
    }
}

const BUILTIN_GRID_SIZE: usize = 6;

const D: u8 = 0;
const L: u8 = 255;

#[rustfmt::skip]
const BUILTIN_MARKERS: &[(u32, MarkerType, [[u8; 6]; 6])] = &[
    (0, MarkerType::TypeA, [
        [D, D, D, D, D, D],
        [D, L, D, L, L, D],
        [D, D, L, D, D, D],
        [D, L, L, D, D, D],
        [D, L, L, D, D, D],
        [D, D, D, D, D, D],
    ]),
    (1, MarkerType::TypeA, [
        [D, D, D, D, D, D],
        [D, L, D, L, L, D],
        [D, D, L, D, L, D],
        [D, D, D, L, L, D],
        [D, D, D, L, D, D],
        [D, D, D, D, D, D],
    ]),
    (2, MarkerType::TypeB, [
        [D, D, D, D, D, D],
        [D, D, L, L, D, D],
        [D, D, L, D, L, D],
        [D, D, L, D, D, D],
        [D, D, L, L, L, D],
        [D, D, D, D, D, D],
    ]),
    (3, MarkerType::TypeB, [
        [D, D, D, D, D, D],
        [D, D, L, L, L, D],
        [D, L, D, D, L, D],
        [D, L, L, D, D, D],
        [D, L, L, D, L, D],
        [D, D, D, D, D, D],
    ]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_deck_has_four_distinct_markers() {
        let catalog = MarkerCatalog::builtin();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.grid_size(), 6);
        let types: Vec<_> = catalog.templates().iter().map(|t| t.marker_type()).collect();
        assert_eq!(
            types,
            vec![
                MarkerType::TypeA,
                MarkerType::TypeA,
                MarkerType::TypeB,
                MarkerType::TypeB
            ]
        );
        assert!(catalog.duplicate_patterns().is_empty());
    }

    #[test]
    fn register_precomputes_rotations() {
        let mut catalog = MarkerCatalog::new(3).unwrap();
        catalog
            .register_rows(9, MarkerType::TypeB, &[[0u8, 255, 255], [0, 0, 0], [0, 0, 0]])
            .unwrap();
        let t = &catalog.templates()[0];
        assert_eq!(t.id(), 9);
        assert_eq!(t.grid_size(), 3);
        for k in 1..4 {
            assert_eq!(t.rotations()[k], t.rotations()[k - 1].rotate_ccw());
        }
        assert_eq!(t.rotations()[3].rotate_ccw(), *t.base());
    }

    #[test]
    fn wrong_size_is_rejected() {
        let mut catalog = MarkerCatalog::new(6).unwrap();
        let err = catalog
            .register_rows(1, MarkerType::TypeA, &[[0u8, 0], [0, 0]])
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::GridSize {
                id: 1,
                expected: 6,
                got: 2
            }
        );
        assert!(catalog.is_empty());
        assert_eq!(MarkerCatalog::new(0).unwrap_err(), CatalogError::InvalidGridSize);
    }

    #[test]
    fn rotated_duplicate_is_reported_but_kept() {
        let base = MarkerGrid::from_rows(&[[0u8, 255], [0, 0]]).unwrap();
        let mut catalog = MarkerCatalog::new(2).unwrap();
        catalog.register(1, MarkerType::TypeA, base.clone()).unwrap();
        catalog
            .register(2, MarkerType::TypeB, base.rotate_ccw())
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.duplicate_patterns(),
            vec![ShadowedTemplate {
                winner: 0,
                shadowed: 1,
                rotation: 0
            }]
        );
    }

    #[test]
    fn lookup_by_id_returns_first_registration() {
        let mut catalog = MarkerCatalog::new(1).unwrap();
        catalog.register_rows(4, MarkerType::TypeA, &[[0u8]]).unwrap();
        catalog.register_rows(4, MarkerType::TypeB, &[[255u8]]).unwrap();
        assert_eq!(catalog.get(4).unwrap().marker_type(), MarkerType::TypeA);
        assert!(catalog.get(5).is_none());
    }
}
