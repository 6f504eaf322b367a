use image::{Rgba, RgbaImage};

/// Top-left corner that centers a `width`×`height` image horizontally in the
/// pad with its lowest row on the pad's lowest row, or `None` if it does not
/// fit.
pub fn to_bottom_position(
    width: u32,
    height: u32,
    pad_width: u32,
    pad_height: u32,
) -> Option<(u32, u32)> {
    if width > pad_width || height > pad_height {
        return None;
    }

    Some(((pad_width - width) / 2, pad_height - height))
}

/// Pastes `image` onto `canvas` at `(x, y)` using the image's own alpha as
/// the mask: each canvas channel, alpha included, moves toward the image
/// pixel by `alpha / 255`. Parts falling outside the canvas are dropped.
pub fn paste_with_alpha_mask(canvas: &mut RgbaImage, image: &RgbaImage, x: u32, y: u32) {
    for (dx, dy, source) in image.enumerate_pixels() {
        let (cx, cy) = (x + dx, y + dy);
        if cx >= canvas.width() || cy >= canvas.height() {
            continue;
        }

        let weight = f32::from(source[3]) / 255.0;
        let target = canvas.get_pixel_mut(cx, cy);
        *target = Rgba(blend(target.0, source.0, weight));
    }
}

fn blend(under: [u8; 4], over: [u8; 4], weight: f32) -> [u8; 4] {
    let mut out = [0u8; 4];
    for ((o, &u), &v) in out.iter_mut().zip(&under).zip(&over) {
        let mixed = f32::from(u) + (f32::from(v) - f32::from(u)) * weight;
        *o = mixed.round().clamp(0.0, 255.0) as u8;
    }
    out
}
