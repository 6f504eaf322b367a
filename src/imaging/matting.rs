//! Alpha matting for the high quality segmentation tier.
//!
//! The hard model mask is turned into a trimap (sure foreground, sure
//! background, unknown band around the edge). Alpha inside the band comes
//! from a guided filter steered by the photo's luminance, so fine structure
//! such as hair follows the image rather than the blocky mask. Foreground
//! colours are then recovered with Blur-Fusion x2 so the cutout does not
//! carry a fringe of the old background.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors;
use imageproc::morphology::erode;

use super::mask::{apply_alpha, ensure_same_dimensions};
use crate::config::MattingParams;
use crate::errors::{AvatarSegError, Result};

pub const TRIMAP_FOREGROUND: u8 = 255;
pub const TRIMAP_BACKGROUND: u8 = 0;
pub const TRIMAP_UNKNOWN: u8 = 128;

/// Gaussian window of the guided filter, roughly an 8 px radius.
const GUIDED_SIGMA: f32 = 4.0;
const GUIDED_EPSILON: f32 = 1e-4;
/// First Blur-Fusion radius; the second pass always uses 6.
const BLUR_FUSION_RADIUS: u32 = 90;
const BLUR_FUSION_ITERATIONS: u8 = 2;

type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Cuts `image` out with an alpha matte refined from `mask`.
///
/// Fails with [`AvatarSegError::Matting`] when the trimap has no sure
/// foreground or no sure background.
pub fn alpha_matting_cutout(
    image: &RgbImage,
    mask: &GrayImage,
    params: &MattingParams,
) -> Result<RgbaImage> {
    ensure_same_dimensions("mask", image.dimensions(), mask.dimensions())?;

    let trimap = trimap(mask, params)?;
    let alpha = estimate_alpha(image, mask, &trimap)?;
    let foreground = foreground_colours(image, &alpha)?;
    apply_alpha(&foreground, &alpha)
}

pub fn trimap(mask: &GrayImage, params: &MattingParams) -> Result<GrayImage> {
    let is_foreground = erode_region(
        &map_colors(mask, |Luma([v])| {
            Luma([if v > params.foreground_threshold { 255 } else { 0 }])
        }),
        params.erode_size,
    );
    let is_background = erode_region(
        &map_colors(mask, |Luma([v])| {
            Luma([if v < params.background_threshold { 255 } else { 0 }])
        }),
        params.erode_size,
    );

    let trimap = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if is_background.get_pixel(x, y)[0] > 0 {
            Luma([TRIMAP_BACKGROUND])
        } else if is_foreground.get_pixel(x, y)[0] > 0 {
            Luma([TRIMAP_FOREGROUND])
        } else {
            Luma([TRIMAP_UNKNOWN])
        }
    });

    for (value, region) in [
        (TRIMAP_FOREGROUND, "foreground"),
        (TRIMAP_BACKGROUND, "background"),
    ] {
        if !trimap.pixels().any(|Luma([v])| *v == value) {
            return Err(AvatarSegError::Matting {
                reason: format!("trimap has no {} pixels", region),
            });
        }
    }

    Ok(trimap)
}

/// Shrinks a binary region by a `size`×`size` square anchored at
/// `size / 2`, so even sizes reach one pixel further up and left.
fn erode_region(region: &GrayImage, size: u32) -> GrayImage {
    if size <= 1 {
        return region.clone();
    }

    let radius = ((size - 1) / 2).min(u32::from(u8::MAX)) as u8;
    let eroded = if radius == 0 {
        region.clone()
    } else {
        erode(region, Norm::LInf, radius)
    };
    if size % 2 == 1 {
        return eroded;
    }

    GrayImage::from_fn(region.width(), region.height(), |x, y| {
        let Luma([here]) = *eroded.get_pixel(x, y);
        let Luma([left]) = *eroded.get_pixel(x.saturating_sub(1), y);
        let Luma([up]) = *eroded.get_pixel(x, y.saturating_sub(1));
        let Luma([corner]) = *eroded.get_pixel(x.saturating_sub(1), y.saturating_sub(1));
        Luma([here.min(left).min(up).min(corner)])
    })
}

/// Alpha from the trimap: the known regions are kept, the unknown band is
/// filled with the mask smoothed by a guided filter over the luminance.
pub fn estimate_alpha(image: &RgbImage, mask: &GrayImage, trimap: &GrayImage) -> Result<GrayImage> {
    ensure_same_dimensions("mask", image.dimensions(), mask.dimensions())?;
    ensure_same_dimensions("trimap", image.dimensions(), trimap.dimensions())?;

    let guide: Plane = map_colors(image, |pixel| Luma([luminance(&pixel) / 255.0]));
    let input: Plane = map_colors(mask, |Luma([v])| Luma([f32::from(v) / 255.0]));
    let filtered = guided_filter(&guide, &input, GUIDED_SIGMA, GUIDED_EPSILON);

    Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
        match trimap.get_pixel(x, y)[0] {
            TRIMAP_FOREGROUND => Luma([255]),
            TRIMAP_BACKGROUND => Luma([0]),
            _ => Luma([to_u8(filtered.get_pixel(x, y)[0])]),
        }
    }))
}

fn luminance(&Rgb([r, g, b]): &Rgb<u8>) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

fn to_u8(unit: f32) -> u8 {
    (unit.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// He et al. guided filter with a grey guide, using Gaussian-weighted local
/// means.
fn guided_filter(guide: &Plane, input: &Plane, sigma: f32, epsilon: f32) -> Plane {
    let (width, height) = guide.dimensions();
    let mean = |plane: &Plane| gaussian_blur_f32(plane, sigma);
    let combine = |a: &Plane, b: &Plane, f: &dyn Fn(f32, f32) -> f32| {
        Plane::from_fn(width, height, |x, y| {
            Luma([f(a.get_pixel(x, y)[0], b.get_pixel(x, y)[0])])
        })
    };

    let mean_i = mean(guide);
    let mean_p = mean(input);
    let corr_ii = mean(&combine(guide, guide, &|i, j| i * j));
    let corr_ip = mean(&combine(guide, input, &|i, p| i * p));

    let var_i = combine(&corr_ii, &mean_i, &|c, m| c - m * m);
    let cov_ip = combine(&corr_ip, &combine(&mean_i, &mean_p, &|i, p| i * p), &|c, m| c - m);

    let a = combine(&cov_ip, &var_i, &|c, v| c / (v + epsilon));
    let b = combine(&mean_p, &combine(&a, &mean_i, &|a, m| a * m), &|p, am| p - am);

    let mean_a = mean(&a);
    let mean_b = mean(&b);
    combine(&combine(&mean_a, guide, &|a, i| a * i), &mean_b, &|ai, b| ai + b)
}

/// Blur-Fusion x2 foreground colour estimation (radii 90, then 6).
pub fn foreground_colours(image: &RgbImage, alpha: &GrayImage) -> Result<RgbImage> {
    ensure_same_dimensions("alpha", image.dimensions(), alpha.dimensions())?;

    imageops_ai::estimate_foreground(image, alpha, BLUR_FUSION_RADIUS, BLUR_FUSION_ITERATIONS)
        .map_err(|e| AvatarSegError::Matting {
            reason: format!("foreground estimation failed: {e}"),
        })
}
