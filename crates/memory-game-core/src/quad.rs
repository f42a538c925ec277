//! Quadrilateral marker candidates and the contour filter applied to them.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

const MIN_ABS_AREA: f64 = 1e-6;
const COLLINEAR_REL: f64 = 1e-9;

/// Four corner points of a marker candidate, in contour-traversal order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    pub fn from_array(corners: [[f32; 2]; 4]) -> Self {
        Self::new(corners.map(|[x, y]| Point2::new(x, y)))
    }

    pub fn corners_f64(&self) -> [Point2<f64>; 4] {
        self.corners.map(|p| Point2::new(p.x as f64, p.y as f64))
    }

    /// Closed polygon length.
    pub fn perimeter(&self) -> f64 {
        let c = self.corners_f64();
        (0..4).map(|i| (c[(i + 1) % 4] - c[i]).norm()).sum()
    }

    /// Shoelace area.
    ///
    /// Positive when the corners run clockwise on screen (y pointing down),
    /// which is the orientation the contour extractor reports for dark
    /// markers on a light background.
    pub fn signed_area(&self) -> f64 {
        let c = self.corners_f64();
        let twice: f64 = (0..4)
            .map(|i| {
                let a = c[i];
                let b = c[(i + 1) % 4];
                a.x * b.y - b.x * a.y
            })
            .sum();
        0.5 * twice
    }

    /// Non-finite coordinates, repeated corners, three collinear corners,
    /// or (near) zero area.
    pub fn is_degenerate(&self) -> bool {
        let c = self.corners_f64();
        if c.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return true;
        }
        for i in 0..4 {
            for j in (i + 1)..4 {
                if (c[i] - c[j]).norm() < 1e-9 {
                    return true;
                }
            }
        }
        if self.signed_area().abs() < MIN_ABS_AREA {
            return true;
        }
        // Triangle area of every corner triple, relative to the quad scale.
        let scale = self.perimeter() * self.perimeter();
        for skip in 0..4 {
            let [a, b, d] = match skip {
                0 => [c[1], c[2], c[3]],
                1 => [c[0], c[2], c[3]],
                2 => [c[0], c[1], c[3]],
                _ => [c[0], c[1], c[2]],
            };
            let cross = (b - a).perp(&(d - a));
            if cross.abs() < COLLINEAR_REL * scale {
                return true;
            }
        }
        false
    }
}

/// Acceptance window for quadrilateral candidates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadFilterParams {
    /// Minimum perimeter in pixels (exclusive).
    pub min_perimeter: f64,
    /// Maximum perimeter in pixels (exclusive).
    pub max_perimeter: f64,
    /// Reject quads whose signed area is not positive.
    pub require_positive_area: bool,
}

impl Default for QuadFilterParams {
    fn default() -> Self {
        Self {
            min_perimeter: 100.0,
            max_perimeter: 700.0,
            require_positive_area: true,
        }
    }
}

impl QuadFilterParams {
    pub fn accepts(&self, quad: &Quad) -> bool {
        if quad.is_degenerate() {
            return false;
        }
        let perimeter = quad.perimeter();
        if perimeter <= self.min_perimeter || perimeter >= self.max_perimeter {
            return false;
        }
        !self.require_positive_area || quad.signed_area() > 0.0
    }
}

/// Keep the quads that fall inside the size window with the expected winding.
pub fn filter_quads(quads: &[Quad], params: &QuadFilterParams) -> Vec<Quad> {
    quads.iter().filter(|q| params.accepts(q)).copied().collect()
}
