//! Reduce a rectified marker patch to a two-valued grid.

use crate::{MarkerGrid, CELL_DARK, CELL_LIGHT};
use memory_game_core::GrayImageView;
use serde::{Deserialize, Serialize};

/// Sampling geometry for rectified patches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSampleConfig {
    /// Side of the square rectified patch in pixels.
    pub patch_size: usize,
    /// Number of cells per side (`N`), border included.
    pub grid_size: usize,
}

impl Default for GridSampleConfig {
    fn default() -> Self {
        Self {
            patch_size: 300,
            grid_size: 6,
        }
    }
}

impl GridSampleConfig {
    /// Integer cell pitch in pixels.
    #[inline]
    pub fn cell_px(&self) -> usize {
        if self.grid_size == 0 {
            0
        } else {
            self.patch_size / self.grid_size
        }
    }
}

/// Intensity histogram of a rectified patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchHistogram {
    bins: [u32; 256],
    total: u64,
}

impl PatchHistogram {
    pub fn from_view(patch: &GrayImageView<'_>) -> Self {
        let mut bins = [0u32; 256];
        for &v in patch.data {
            bins[usize::from(v)] += 1;
        }
        Self {
            bins,
            total: patch.data.len() as u64,
        }
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Otsu level: intensities strictly above it belong to the light class.
    ///
    /// When several levels separate the classes equally well (the empty gap
    /// between two modes), the middle of that run is returned. A constant or
    /// empty patch yields its only value, or `0`, so every cell reads dark.
    pub fn split_level(&self) -> u8 {
        let weighted_total: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(v, &n)| v as f64 * f64::from(n))
            .sum();
        let total = self.total as f64;

        let mut dark_count = 0f64;
        let mut dark_sum = 0f64;
        let mut best: Option<(f64, usize, usize)> = None;
        for (level, &n) in self.bins.iter().enumerate() {
            dark_count += f64::from(n);
            dark_sum += level as f64 * f64::from(n);
            let light_count = total - dark_count;
            if dark_count == 0.0 || light_count == 0.0 {
                continue;
            }
            let gap = dark_sum / dark_count - (weighted_total - dark_sum) / light_count;
            let spread = dark_count * light_count * gap * gap;
            best = match best {
                Some((b, first, last)) if level == last + 1 && (spread - b).abs() <= 1e-9 * b => {
                    Some((b, first, level))
                }
                Some((b, ..)) if spread <= b => best,
                _ => Some((spread, level, level)),
            };
        }

        match best {
            Some((_, first, last)) => ((first + last) / 2) as u8,
            None => self.bins.iter().position(|&n| n > 0).unwrap_or(0) as u8,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("patch is {width}x{height}, expected {expected}x{expected}")]
    PatchSize {
        expected: usize,
        width: usize,
        height: usize,
    },
    #[error("grid of {grid_size} cells does not fit a {patch_size}px patch")]
    Geometry { grid_size: usize, patch_size: usize },
}

/// Threshold the patch at its Otsu level and read the pixel at each cell
/// centre.
///
/// Cells brighter than the threshold become [`CELL_LIGHT`], the rest
/// [`CELL_DARK`]. The resulting grid is row-major, row `r` being the `r`-th
/// band of the patch from the top.
pub fn sample_marker_grid(
    patch: &GrayImageView<'_>,
    cfg: &GridSampleConfig,
) -> Result<MarkerGrid, SampleError> {
    let step = cfg.cell_px();
    if step == 0 {
        return Err(SampleError::Geometry {
            grid_size: cfg.grid_size,
            patch_size: cfg.patch_size,
        });
    }
    if patch.width != cfg.patch_size
        || patch.height != cfg.patch_size
        || patch.data.len() != patch.width * patch.height
    {
        return Err(SampleError::PatchSize {
            expected: cfg.patch_size,
            width: patch.width,
            height: patch.height,
        });
    }

    let threshold = PatchHistogram::from_view(patch).split_level();
    let half = step / 2;
    let n = cfg.grid_size;

    let mut cells = Vec::with_capacity(n * n);
    for r in 0..n {
        for c in 0..n {
            let x = c * step + half;
            let y = r * step + half;
            let v = patch.data[y * patch.width + x];
            cells.push(if v > threshold { CELL_LIGHT } else { CELL_DARK });
        }
    }

    MarkerGrid::from_cells(n, cells).map_err(|_| SampleError::Geometry {
        grid_size: n,
        patch_size: cfg.patch_size,
    })
}
