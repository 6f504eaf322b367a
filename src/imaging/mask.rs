use image::{GrayImage, Luma, RgbImage, Rgba, RgbaImage};
use imageops_ai::{ApplyAlphaMask, ModifyAlpha};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors;
use imageproc::morphology::open;

use crate::errors::{AvatarSegError, Result};

/// Sigma of the blur that smooths the model mask before thresholding.
const POST_PROCESS_SIGMA: f32 = 2.0;
/// Masks are cut at this value after blurring; `>=` is foreground.
const POST_PROCESS_CUTOFF: u8 = 127;
/// Sigma of the blur that softens the alpha of the simple cutout.
pub const SOFTEN_SIGMA: f32 = 1.0;

pub(crate) fn ensure_same_dimensions(
    what: &str,
    expected: (u32, u32),
    actual: (u32, u32),
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(AvatarSegError::Validation {
        field: what.to_string(),
        reason: format!(
            "is {}x{}, expected {}x{}",
            actual.0, actual.1, expected.0, expected.1
        ),
    })
}

/// Removes speckles and ragged edges from a raw model mask: an opening with
/// a 3×3 cross, a Gaussian blur and a hard cut, leaving only 0 and 255.
pub fn post_process_mask(mask: &GrayImage) -> GrayImage {
    let blurred = gaussian_blur_f32(&open_mask(mask), POST_PROCESS_SIGMA);
    map_colors(&blurred, |Luma([v])| {
        Luma([if v < POST_PROCESS_CUTOFF { 0 } else { 255 }])
    })
}

/// Opening with the 3×3 elliptical element, which at this size is the
/// 4-connected cross.
pub(crate) fn open_mask(mask: &GrayImage) -> GrayImage {
    open(mask, Norm::L1, 1)
}

/// Small-radius blur used to feather the alpha of a cutout that skipped
/// matting.
pub fn soften_alpha(alpha: &GrayImage) -> GrayImage {
    gaussian_blur_f32(alpha, SOFTEN_SIGMA)
}

/// Pairs an RGB image with a mask as its alpha channel. Colours are kept
/// as they are.
pub fn apply_alpha(image: &RgbImage, mask: &GrayImage) -> Result<RgbaImage> {
    ensure_same_dimensions("mask", image.dimensions(), mask.dimensions())?;
    Ok(image.clone().apply_alpha_mask(mask)?)
}

pub fn alpha_channel(image: &RgbaImage) -> GrayImage {
    map_colors(image, |Rgba([_, _, _, alpha])| Luma([alpha]))
}

pub fn replace_alpha(image: &mut RgbaImage, alpha: &GrayImage) -> Result<()> {
    ensure_same_dimensions("alpha", image.dimensions(), alpha.dimensions())?;
    image.replace_alpha_mut(alpha)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn square_mask(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_post_process_removes_isolated_noise() {
        let mut mask = square_mask(40, 10, 30);
        mask.put_pixel(2, 2, Luma([255]));
        mask.put_pixel(37, 5, Luma([180]));

        let cleaned = post_process_mask(&mask);

        assert_eq!(cleaned.get_pixel(2, 2)[0], 0);
        assert_eq!(cleaned.get_pixel(37, 5)[0], 0);
        assert_eq!(cleaned.get_pixel(20, 20)[0], 255);
        assert!(cleaned.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_soften_alpha_feathers_edges() {
        let mask = square_mask(20, 5, 15);
        let softened = soften_alpha(&mask);

        let edge = softened.get_pixel(5, 10)[0];
        assert!(edge > 0 && edge < 255, "edge value {}", edge);
        assert!(softened.get_pixel(10, 10)[0] >= 254);
        assert_eq!(softened.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_apply_and_replace_alpha() -> Result<()> {
        let image = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let mask = GrayImage::from_pixel(3, 2, Luma([77]));

        let mut rgba = apply_alpha(&image, &mask)?;
        let Rgba([r, g, b, a]) = *rgba.get_pixel(1, 1);
        assert_eq!([r, g, b], [10, 20, 30]);
        assert!(a.abs_diff(77) <= 1, "alpha {}", a);

        replace_alpha(&mut rgba, &GrayImage::from_pixel(3, 2, Luma([255])))?;
        assert_eq!(alpha_channel(&rgba), GrayImage::from_pixel(3, 2, Luma([255])));
        assert_eq!(rgba.get_pixel(2, 0).0[..3], [10, 20, 30]);
        Ok(())
    }

    #[test]
    fn test_opening_uses_a_cross() {
        // a plus sign survives a cross opening, a square element would erase it
        let mut mask = GrayImage::new(9, 9);
        for (x, y) in [(4, 4), (3, 4), (5, 4), (4, 3), (4, 5)] {
            mask.put_pixel(x, y, Luma([255]));
        }
        let opened = open_mask(&mask);
        assert_eq!(opened, mask);

        // a 2×2 block has no pixel whose whole cross is inside it
        let block = GrayImage::from_fn(9, 9, |x, y| {
            Luma([if (3..5).contains(&x) && (3..5).contains(&y) { 255 } else { 0 }])
        });
        assert!(open_mask(&block).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let image = RgbImage::new(3, 2);
        let mask = GrayImage::new(2, 3);
        assert!(matches!(
            apply_alpha(&image, &mask),
            Err(AvatarSegError::Validation { .. })
        ));
    }
}
