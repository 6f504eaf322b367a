use crate::errors::Result;
use image::{GrayImage, RgbImage};

/// Foreground/background classifier behind the segmentation adapter.
///
/// Implementations are shared read-only across a whole run, so inference
/// takes `&self`.
pub trait ImageSegmentationModel: Send + Sync {
    /// Predicts an alpha mask with the same dimensions as `image`;
    /// 255 is foreground, 0 is background.
    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage>;
}

impl<M: ImageSegmentationModel + ?Sized> ImageSegmentationModel for &M {
    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        (**self).predict_mask(image)
    }
}

impl<M: ImageSegmentationModel + ?Sized> ImageSegmentationModel for Box<M> {
    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        (**self).predict_mask(image)
    }
}
