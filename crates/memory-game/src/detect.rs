//! End-to-end helpers over `image::GrayImage`: candidate extraction and
//! running the frame pipeline.

use crate::frame::{FrameProcessor, FrameReport};
use ::image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::otsu_level;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;
use log::debug;
use memory_game_core::{GrayImageView, Quad};
use nalgebra::Point2;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Largest distance in pixels between a traced contour and its polygon.
pub const CONTOUR_APPROX_EPSILON: f64 = 4.0;

/// Borrow an `image::GrayImage` as the lightweight core view type.
pub fn gray_view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported image file and convert it to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage, ::image::ImageError> {
    Ok(::image::ImageReader::open(path)?.decode()?.to_luma8())
}

/// Four-cornered outlines in a frame, as marker candidates.
///
/// The frame is split at its Otsu level with light pixels as foreground,
/// every traced contour is simplified to a polygon within
/// [`CONTOUR_APPROX_EPSILON`], and the polygons with exactly four vertices
/// are kept. Corners are pixel centres, wound clockwise on screen. Size
/// limits are left to the processor's `QuadFilterParams`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img), fields(width = img.width(), height = img.height()))
)]
pub fn find_quads(img: &GrayImage) -> Vec<Quad> {
    let level = otsu_level(img);
    let mut binary = img.clone();
    for px in binary.pixels_mut() {
        *px = Luma([if px[0] > level { 255 } else { 0 }]);
    }

    let contours = find_contours::<i32>(&binary);
    let quads: Vec<Quad> = contours
        .iter()
        .filter_map(|c| quad_from_polygon(&approximate_closed(&c.points, CONTOUR_APPROX_EPSILON)))
        .collect();
    debug!(
        "otsu level {level}: {} contours, {} four-cornered",
        contours.len(),
        quads.len()
    );
    quads
}

/// Run one frame of `processor` over an `image::GrayImage`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(processor, img, quads), fields(width = img.width(), height = img.height()))
)]
pub fn process_image(processor: &mut FrameProcessor, img: &GrayImage, quads: &[Quad]) -> FrameReport {
    processor.process_frame(&gray_view(img), quads)
}

/// [`find_quads`] followed by [`process_image`].
pub fn detect_markers(processor: &mut FrameProcessor, img: &GrayImage) -> FrameReport {
    let quads = find_quads(img);
    process_image(processor, img, &quads)
}

/// Douglas-Peucker on a closed contour.
///
/// The contour is cut at two mutually distant points so that neither open
/// half starts or ends in the middle of an edge.
fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 4 {
        return points.to_vec();
    }
    let farthest_from = |from: Point<i32>| {
        points
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| {
                let (dx, dy) = (i64::from(p.x - from.x), i64::from(p.y - from.y));
                dx * dx + dy * dy
            })
            .map_or(0, |(i, _)| i)
    };
    let a = farthest_from(points[0]);
    let b = farthest_from(points[a]);
    let (a, b) = (a.min(b), a.max(b));
    if a == b {
        return vec![points[a]];
    }

    let wrapped: Vec<Point<i32>> = points[b..].iter().chain(&points[..=a]).copied().collect();
    let mut polygon = approximate_polygon_dp(&points[a..=b], epsilon, false);
    polygon.pop();
    let mut rest = approximate_polygon_dp(&wrapped, epsilon, false);
    rest.pop();
    polygon.append(&mut rest);
    polygon
}

fn quad_from_polygon(polygon: &[Point<i32>]) -> Option<Quad> {
    let [a, b, c, d] = polygon else {
        return None;
    };
    let centre = |p: &Point<i32>| Point2::new(p.x as f32 + 0.5, p.y as f32 + 0.5);
    let quad = Quad::new([centre(a), centre(b), centre(c), centre(d)]);
    if quad.signed_area() < 0.0 {
        let [a, b, c, d] = quad.corners;
        return Some(Quad::new([a, d, c, b]));
    }
    Some(quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_shares_the_buffer() {
        let img = GrayImage::from_fn(4, 3, |x, y| Luma([(y * 4 + x) as u8]));
        let view = gray_view(&img);
        assert_eq!((view.width, view.height), (4, 3));
        assert_eq!(view.get(3, 2), Some(11));
    }

    #[test]
    fn dark_square_on_light_background_is_one_quad() {
        let img = GrayImage::from_fn(200, 160, |x, y| {
            let inside = (50..150).contains(&x) && (30..130).contains(&y);
            Luma([if inside { 30 } else { 220 }])
        });
        let quads: Vec<Quad> = find_quads(&img)
            .into_iter()
            .filter(|q| q.perimeter() < 600.0)
            .collect();
        assert_eq!(quads.len(), 1, "{quads:?}");

        let q = quads[0];
        assert!(q.signed_area() > 0.0);
        assert!((q.perimeter() - 400.0).abs() < 12.0, "{}", q.perimeter());
        for corner in [(50.0, 30.0), (150.0, 30.0), (150.0, 130.0), (50.0, 130.0)] {
            let near = q
                .corners
                .iter()
                .any(|p| (p.x - corner.0).abs() <= 1.5 && (p.y - corner.1).abs() <= 1.5);
            assert!(near, "no quad corner near {corner:?}: {q:?}");
        }
    }

    #[test]
    fn triangle_is_not_a_quad() {
        // right triangle (20, 20), (20, 99), (99, 99)
        let img = GrayImage::from_fn(120, 120, |x, y| {
            let inside = x >= 20 && y < 100 && y >= x;
            Luma([if inside { 20 } else { 230 }])
        });
        let small: Vec<Quad> = find_quads(&img)
            .into_iter()
            .filter(|q| q.perimeter() < 400.0)
            .collect();
        assert!(small.is_empty(), "{small:?}");
    }

    #[test]
    fn counter_clockwise_polygon_is_rewound() {
        let pts = [(0, 0), (0, 10), (10, 10), (10, 0)].map(|(x, y)| Point::new(x, y));
        let q = quad_from_polygon(&pts).unwrap();
        assert!(q.signed_area() > 0.0);
        assert_eq!(q.corners[0], Point2::new(0.5, 0.5));
        assert!(quad_from_polygon(&pts[..3]).is_none());
    }
}
