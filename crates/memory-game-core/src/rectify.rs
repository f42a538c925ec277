use crate::{sample_bilinear_u8, GrayImage, GrayImageView, Homography, Quad};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Unwarp the image region inside `quad` into a `patch_size × patch_size` patch.
///
/// Quad corner `i` lands on patch corner `i` (TL, TR, BR, BL). Returns `None`
/// when the quad is degenerate and no homography exists.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(image, quad))
)]
pub fn rectify_quad(image: &GrayImageView<'_>, quad: &Quad, patch_size: usize) -> Option<GrayImage> {
    if patch_size == 0 || quad.is_degenerate() {
        return None;
    }
    let to_image = Homography::patch_to_quad(patch_size as f64, quad)?;

    let mut patch = GrayImage::filled(patch_size, patch_size, 0);
    for (i, px) in patch.data.iter_mut().enumerate() {
        // pixel centres on both sides
        let (x, y) = (i % patch_size, i / patch_size);
        let src = to_image.map(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
        *px = sample_bilinear_u8(image, (src.x - 0.5) as f32, (src.y - 0.5) as f32);
    }
    Some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_aligned_quad_extracts_region() {
        // left half dark, right half light inside a 40x40 region at (20,20)
        let mut img = GrayImage::filled(80, 80, 128);
        for y in 20..60 {
            for x in 20..60 {
                img.data[y * 80 + x] = if x < 40 { 0 } else { 255 };
            }
        }
        let quad = Quad::from_array([[20.0, 20.0], [60.0, 20.0], [60.0, 60.0], [20.0, 60.0]]);
        let patch = rectify_quad(&img.view(), &quad, 40).expect("patch");
        assert_eq!(patch.width, 40);
        assert_eq!(patch.data[10 * 40 + 5], 0);
        assert_eq!(patch.data[10 * 40 + 35], 255);
    }

    #[test]
    fn identity_quad_copies_pixels() {
        let mut img = GrayImage::filled(8, 8, 0);
        for (i, v) in img.data.iter_mut().enumerate() {
            *v = ((i % 8) * 30) as u8;
        }
        let quad = Quad::from_array([[0.0, 0.0], [8.0, 0.0], [8.0, 8.0], [0.0, 8.0]]);
        let patch = rectify_quad(&img.view(), &quad, 8).expect("patch");
        assert!(patch
            .data
            .iter()
            .zip(&img.data)
            .all(|(a, b)| a.abs_diff(*b) <= 1));
    }

    #[test]
    fn degenerate_quad_is_rejected() {
        let img = GrayImage::filled(10, 10, 0);
        let quad = Quad::from_array([[1.0, 1.0], [1.0, 1.0], [5.0, 5.0], [1.0, 5.0]]);
        assert!(rectify_quad(&img.view(), &quad, 10).is_none());
    }
}
