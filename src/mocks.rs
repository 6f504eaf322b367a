use crate::errors::{AvatarSegError, Result};
use crate::traits::ImageSegmentationModel;
use image::{GrayImage, Luma, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Region the mock model reports as foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSubject {
    /// Nothing is foreground.
    Empty,
    /// Every pixel is foreground.
    FullFrame,
    /// Pixels in `left..right` × `top..bottom` are foreground (clamped to the image).
    Rect {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
}

/// Segmentation model for tests: paints a fixed hard mask and counts calls.
#[derive(Debug)]
pub struct MockSegmentationModel {
    pub subject: MockSubject,
    calls: AtomicUsize,
}

impl MockSegmentationModel {
    pub const fn new(subject: MockSubject) -> Self {
        Self {
            subject,
            calls: AtomicUsize::new(0),
        }
    }

    pub const fn rect(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self::new(MockSubject::Rect {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Number of `predict_mask` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ImageSegmentationModel for MockSegmentationModel {
    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let (width, height) = image.dimensions();
        let mask = match self.subject {
            MockSubject::Empty => GrayImage::new(width, height),
            MockSubject::FullFrame => GrayImage::from_pixel(width, height, Luma([255])),
            MockSubject::Rect {
                left,
                top,
                right,
                bottom,
            } => GrayImage::from_fn(width, height, |x, y| {
                if (left..right).contains(&x) && (top..bottom).contains(&y) {
                    Luma([255])
                } else {
                    Luma([0])
                }
            }),
        };
        Ok(mask)
    }
}

/// Model whose inference always fails, for exercising error reporting.
#[derive(Debug, Default)]
pub struct FailingSegmentationModel;

impl ImageSegmentationModel for FailingSegmentationModel {
    fn predict_mask(&self, _image: &RgbImage) -> Result<GrayImage> {
        Err(AvatarSegError::Model {
            operation: "mock inference".to_string(),
            source: "inference unavailable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_mask() -> Result<()> {
        let model = MockSegmentationModel::rect(2, 1, 5, 4);
        let mask = model.predict_mask(&RgbImage::new(8, 6))?;

        assert_eq!(mask.dimensions(), (8, 6));
        assert_eq!(mask.get_pixel(2, 1)[0], 255);
        assert_eq!(mask.get_pixel(4, 3)[0], 255);
        assert_eq!(mask.get_pixel(5, 3)[0], 0);
        assert_eq!(mask.get_pixel(2, 4)[0], 0);
        assert_eq!(model.calls(), 1);
        Ok(())
    }

    #[test]
    fn test_failing_model() {
        let err = FailingSegmentationModel
            .predict_mask(&RgbImage::new(4, 4))
            .unwrap_err();
        assert!(matches!(err, AvatarSegError::Model { .. }));
    }
}
