use image::{imageops, imageops::FilterType, RgbaImage};

use crate::config::CanvasSpec;

/// Integer pixel size of the subject once fitted to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitSize {
    pub width: u32,
    pub height: u32,
}

/// Sizes a `width`×`height` subject so it is `head_scale` of the canvas
/// height tall, unless that would overflow the canvas width, in which case
/// it is fitted to the width instead. Aspect ratio is kept up to rounding.
pub fn fit_dimensions(
    (width, height): (u32, u32),
    canvas: &CanvasSpec,
    head_scale: f64,
) -> FitSize {
    let aspect = f64::from(width) / f64::from(height);

    let mut target_height = round_px(f64::from(canvas.height) * head_scale);
    let mut new_width = round_px(f64::from(target_height) * aspect);

    // overflow guard, always after the height fit
    if new_width > canvas.width {
        new_width = canvas.width;
        target_height = round_px(f64::from(new_width) / aspect);
    }

    FitSize {
        width: new_width.clamp(1, canvas.width),
        height: target_height.clamp(1, canvas.height),
    }
}

fn round_px(value: f64) -> u32 {
    value.round() as u32
}

pub fn resize_subject(subject: &RgbaImage, size: FitSize) -> RgbaImage {
    imageops::resize(subject, size.width, size.height, FilterType::Lanczos3)
}
