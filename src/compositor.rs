use image::RgbaImage;

use crate::config::CanvasSpec;
use crate::errors::{AvatarSegError, Result};
use crate::imaging::{paste_with_alpha_mask, to_bottom_position};

/// Top-left corner of the subject on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

pub fn new_canvas(canvas: &CanvasSpec) -> RgbaImage {
    RgbaImage::from_pixel(canvas.width, canvas.height, canvas.fill.pixel())
}

/// Horizontally centered, bottom anchored placement of a subject of the
/// given size.
pub fn placement(canvas: &CanvasSpec, (width, height): (u32, u32)) -> Result<Placement> {
    to_bottom_position(width, height, canvas.width, canvas.height)
        .map(|(x, y)| Placement { x, y })
        .ok_or_else(|| AvatarSegError::Validation {
            field: "subject".to_string(),
            reason: format!(
                "{}x{} does not fit the {}x{} canvas",
                width, height, canvas.width, canvas.height
            ),
        })
}

/// Lays the fitted subject onto a fresh canvas.
pub fn composite(subject: &RgbaImage, canvas: &CanvasSpec) -> Result<(RgbaImage, Placement)> {
    let at = placement(canvas, subject.dimensions())?;
    let mut output = new_canvas(canvas);
    paste_with_alpha_mask(&mut output, subject, at.x, at.y);
    Ok((output, at))
}
