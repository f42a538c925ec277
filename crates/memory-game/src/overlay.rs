//! Screen-space overlay geometry for identified markers.
//!
//! Only the geometry is computed here; drawing it is up to the caller.

use memory_game_markers::MarkerType;
use memory_game_pose::{ProjectionMatrix, ScreenPoint};
use nalgebra::Point3;
use serde::Serialize;

/// Object-space corners of a cube standing on the marker, `scale` units on a
/// side. Indices `0..4` lie on the marker plane, `4..8` at `z = -scale`.
pub fn cube_points(scale: f64) -> [Point3<f64>; 8] {
    let s = scale;
    [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(s, 0.0, 0.0),
        Point3::new(s, s, 0.0),
        Point3::new(0.0, s, 0.0),
        Point3::new(0.0, 0.0, -s),
        Point3::new(s, 0.0, -s),
        Point3::new(s, s, -s),
        Point3::new(0.0, s, -s),
    ]
}

/// What to draw on top of a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    Cube { vertices: [ScreenPoint; 8] },
    Disc { center: ScreenPoint, radius: i32 },
}

impl Overlay {
    /// Cube for [`MarkerType::TypeB`], disc for [`MarkerType::TypeA`].
    ///
    /// `None` when a cube vertex has no finite screen position.
    pub fn for_marker(
        marker_type: MarkerType,
        projection: &ProjectionMatrix,
        scale: f64,
    ) -> Option<Self> {
        let object = cube_points(scale);
        let mut vertices = [ScreenPoint::new(0, 0); 8];
        for (v, p) in vertices.iter_mut().zip(&object) {
            *v = projection.to_screen(p)?;
        }
        Some(match marker_type {
            MarkerType::TypeB => Overlay::Cube { vertices },
            MarkerType::TypeA => disc(&vertices),
        })
    }

    /// Filled polygons of a cube overlay: the top, then the four sides.
    /// Empty for a disc.
    pub fn faces(&self) -> Vec<[ScreenPoint; 4]> {
        let Overlay::Cube { vertices: v } = self else {
            return Vec::new();
        };
        let mut faces = Vec::with_capacity(5);
        faces.push([v[4], v[5], v[6], v[7]]);
        for i in 0..4 {
            let j = (i + 1) % 4;
            faces.push([v[i], v[j], v[j + 4], v[i + 4]]);
        }
        faces
    }
}

/// Disc centred between the near base corner and the far top corner.
///
/// Midpoint and distance are taken in `i64`, so vertices anywhere in the
/// `i32` range cannot overflow. The midpoint of two `i32` values always
/// fits back into `i32`.
fn disc(v: &[ScreenPoint; 8]) -> Overlay {
    let (a, b) = (v[0], v[6]);
    let mid = |p: i32, q: i32| ((i64::from(p) + i64::from(q)) / 2) as i32;
    let center = ScreenPoint::new(mid(a.x, b.x), mid(a.y, b.y));
    let dx = (i64::from(a.x) - i64::from(b.x)) as f64;
    let dy = (i64::from(a.y) - i64::from(b.y)) as f64;
    let radius = (dx.hypot(dy) / 2.0 * 0.5) as i32;
    Overlay::Disc { center, radius }
}
