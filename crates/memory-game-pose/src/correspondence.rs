use nalgebra::Point3;

/// Object-space marker corners for each rotation index.
///
/// The marker occupies the unit square of the `z = 0` plane with `x` to the
/// right and `y` down as registered. Entry `k` lists the object corner seen
/// at each quad corner (TL, TR, BR, BL of the rectified patch) when the grid
/// matched rotation `k`, i.e. the registered grid turned `k × 90°`
/// counter-clockwise.
pub const WORLD_CORRESPONDENCES: [[Point3<f64>; 4]; 4] = [
    [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)],
    [p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0), p(0.0, 0.0)],
    [p(1.0, 1.0), p(0.0, 1.0), p(0.0, 0.0), p(1.0, 0.0)],
    [p(0.0, 1.0), p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)],
];

const fn p(x: f64, y: f64) -> Point3<f64> {
    Point3::new(x, y, 0.0)
}

/// Correspondence set for `rotation_index`, or `None` outside `0..=3`.
pub fn world_correspondence(rotation_index: u8) -> Option<&'static [Point3<f64>; 4]> {
    WORLD_CORRESPONDENCES.get(rotation_index as usize)
}
