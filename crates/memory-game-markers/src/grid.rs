//! Square marker grids and their rotations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell value for a dark sample.
pub const CELL_DARK: u8 = 0;
/// Cell value for a light sample.
pub const CELL_LIGHT: u8 = 255;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid size must be > 0")]
    Empty,
    #[error("grid of size {size} needs {expected} cells, got {got}")]
    CellCount {
        size: usize,
        expected: usize,
        got: usize,
    },
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
}

/// An `N × N` grid of sampled cell values, stored row-major
/// (`cells[row * N + col]`).
///
/// Deserialization goes through [`MarkerGrid::from_cells`], so a decoded grid
/// is always square and non-empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct MarkerGrid {
    size: usize,
    cells: Vec<u8>,
}

/// Unchecked wire form of [`MarkerGrid`].
#[derive(Deserialize)]
struct RawGrid {
    size: usize,
    cells: Vec<u8>,
}

impl TryFrom<RawGrid> for MarkerGrid {
    type Error = GridError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Self::from_cells(raw.size, raw.cells)
    }
}

impl MarkerGrid {
    /// Build a grid from a flat row-major buffer.
    pub fn from_cells(size: usize, cells: Vec<u8>) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::Empty);
        }
        let expected = size * size;
        if cells.len() != expected {
            return Err(GridError::CellCount {
                size,
                expected,
                got: cells.len(),
            });
        }
        Ok(Self { size, cells })
    }

    /// Build a grid from rows. Every row must be as long as there are rows.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, GridError> {
        let size = rows.len();
        if size == 0 {
            return Err(GridError::Empty);
        }
        let mut cells = Vec::with_capacity(size * size);
        for (row, r) in rows.iter().enumerate() {
            let r = r.as_ref();
            if r.len() != size {
                return Err(GridError::RaggedRow {
                    row,
                    expected: size,
                    got: r.len(),
                });
            }
            cells.extend_from_slice(r);
        }
        Ok(Self { size, cells })
    }

    /// Side length `N`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        if row >= self.size || col >= self.size {
            return None;
        }
        Some(self.cells[row * self.size + col])
    }

    /// Rotate 90° counter-clockwise: `out[r][c] = in[c][N-1-r]`.
    ///
    /// The new top-left cell is the old top-right one.
    pub fn rotate_ccw(&self) -> Self {
        let n = self.size;
        let mut cells = vec![0u8; n * n];
        for r in 0..n {
            for c in 0..n {
                cells[r * n + c] = self.cells[c * n + (n - 1 - r)];
            }
        }
        Self { size: n, cells }
    }

    /// The four rotations `[self, ccw¹, ccw², ccw³]`.
    pub fn rotations(&self) -> [Self; 4] {
        let r1 = self.rotate_ccw();
        let r2 = r1.rotate_ccw();
        let r3 = r2.rotate_ccw();
        [self.clone(), r1, r2, r3]
    }

    /// True when every cell is either [`CELL_DARK`] or [`CELL_LIGHT`].
    pub fn is_binary(&self) -> bool {
        self.cells
            .iter()
            .all(|&v| v == CELL_DARK || v == CELL_LIGHT)
    }
}

impl fmt::Debug for MarkerGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MarkerGrid({}x{})", self.size, self.size)?;
        for row in self.cells.chunks(self.size) {
            let line: String = row
                .iter()
                .map(|&v| match v {
                    CELL_DARK => '#',
                    CELL_LIGHT => '.',
                    _ => '?',
                })
                .collect();
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}
