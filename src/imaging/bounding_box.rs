use image::{GenericImageView, GrayImage, Luma, RgbaImage};

/// Alpha values at or below this are treated as segmentation noise when
/// looking for the subject. Unrelated to the matting thresholds.
pub const NOISE_THRESHOLD: u8 = 10;

/// Pixel rectangle with exclusive `right` and `bottom`.
///
/// Always non-empty: `left < right` and `top < bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

pub trait ContentBounds {
    /// Smallest box holding every pixel whose opacity is above `threshold`,
    /// or `None` if there is no such pixel.
    fn content_bounds(&self, threshold: u8) -> Option<BoundingBox>;
}

impl ContentBounds for GrayImage {
    fn content_bounds(&self, threshold: u8) -> Option<BoundingBox> {
        find_bounds(
            self.enumerate_pixels()
                .filter(|(_, _, Luma([alpha]))| *alpha > threshold)
                .map(|(x, y, _)| (x, y)),
        )
    }
}

impl ContentBounds for RgbaImage {
    fn content_bounds(&self, threshold: u8) -> Option<BoundingBox> {
        find_bounds(
            self.enumerate_pixels()
                .filter(|(_, _, pixel)| pixel[3] > threshold)
                .map(|(x, y, _)| (x, y)),
        )
    }
}

fn find_bounds(points: impl Iterator<Item = (u32, u32)>) -> Option<BoundingBox> {
    let mut bounds: Option<[u32; 4]> = None; // [x1, y1, x2, y2], inclusive

    for (x, y) in points {
        match bounds.as_mut() {
            Some(bounds) => update_bounds(bounds, x, y),
            None => bounds = Some([x, y, x, y]),
        }
    }

    bounds.map(|[x1, y1, x2, y2]| BoundingBox {
        left: x1,
        top: y1,
        right: x2 + 1,
        bottom: y2 + 1,
    })
}

fn update_bounds(bounds: &mut [u32; 4], x: u32, y: u32) {
    bounds[0] = bounds[0].min(x);
    bounds[1] = bounds[1].min(y);
    bounds[2] = bounds[2].max(x);
    bounds[3] = bounds[3].max(y);
}

pub fn crop(image: &RgbaImage, bounds: BoundingBox) -> RgbaImage {
    image
        .view(bounds.left, bounds.top, bounds.width(), bounds.height())
        .to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_bounds_of_single_region() {
        let mut alpha = GrayImage::new(10, 8);
        for (x, y) in [(2, 3), (6, 3), (4, 5)] {
            alpha.put_pixel(x, y, Luma([200]));
        }

        let bounds = alpha.content_bounds(NOISE_THRESHOLD).unwrap();
        assert_eq!(
            bounds,
            BoundingBox {
                left: 2,
                top: 3,
                right: 7,
                bottom: 6
            }
        );
        assert_eq!((bounds.width(), bounds.height()), (5, 3));
    }

    #[test]
    fn test_noise_at_threshold_is_ignored() {
        let mut alpha = GrayImage::new(10, 10);
        alpha.put_pixel(0, 0, Luma([NOISE_THRESHOLD]));
        alpha.put_pixel(9, 9, Luma([3]));
        assert_eq!(alpha.content_bounds(NOISE_THRESHOLD), None);

        alpha.put_pixel(5, 5, Luma([NOISE_THRESHOLD + 1]));
        assert_eq!(
            alpha.content_bounds(NOISE_THRESHOLD),
            Some(BoundingBox {
                left: 5,
                top: 5,
                right: 6,
                bottom: 6
            })
        );
    }

    #[test]
    fn test_rgba_bounds_use_alpha_only() {
        let mut image = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 0]));
        image.put_pixel(1, 4, Rgba([0, 0, 0, 255]));
        image.put_pixel(3, 2, Rgba([0, 0, 0, 40]));

        let bounds = image.content_bounds(NOISE_THRESHOLD).unwrap();
        assert_eq!((bounds.left, bounds.top, bounds.right, bounds.bottom), (1, 2, 4, 5));
    }

    #[test]
    fn test_crop() {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let cropped = crop(
            &image,
            BoundingBox {
                left: 2,
                top: 3,
                right: 5,
                bottom: 7,
            },
        );
        assert_eq!(cropped.dimensions(), (3, 4));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([2, 3, 0, 255]));
        assert_eq!(*cropped.get_pixel(2, 3), Rgba([4, 6, 0, 255]));
    }
}
