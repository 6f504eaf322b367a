use image::{RgbImage, RgbaImage};
use tracing::debug;

use crate::config::MattingParams;
use crate::errors::Result;
use crate::imaging::{
    alpha_channel, alpha_matting_cutout, apply_alpha, post_process_mask, replace_alpha,
    soften_alpha,
};
use crate::traits::ImageSegmentationModel;

/// Which path produced a cutout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationTier {
    /// Alpha matting over the model mask.
    Matted,
    /// Plain model mask with a softened edge.
    Simple,
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub image: RgbaImage,
    pub tier: SegmentationTier,
}

/// Cuts the subject out of `image`, preferring the matted tier.
///
/// Any failure of the matted tier falls through to the simple tier exactly
/// once; if that fails as well its error is returned.
pub fn segment<M>(model: &M, image: &RgbImage, matting: &MattingParams) -> Result<Segmentation>
where
    M: ImageSegmentationModel + ?Sized,
{
    match segment_matted(model, image, matting) {
        Ok(cutout) => Ok(Segmentation {
            image: cutout,
            tier: SegmentationTier::Matted,
        }),
        Err(err) => {
            debug!(error = %err, "matting failed, using simple segmentation");
            segment_simple(model, image).map(|cutout| Segmentation {
                image: cutout,
                tier: SegmentationTier::Simple,
            })
        }
    }
}

pub fn segment_matted<M>(model: &M, image: &RgbImage, matting: &MattingParams) -> Result<RgbaImage>
where
    M: ImageSegmentationModel + ?Sized,
{
    let mask = post_process_mask(&model.predict_mask(image)?);
    alpha_matting_cutout(image, &mask, matting)
}

pub fn segment_simple<M>(model: &M, image: &RgbImage) -> Result<RgbaImage>
where
    M: ImageSegmentationModel + ?Sized,
{
    let mask = post_process_mask(&model.predict_mask(image)?);
    let mut cutout = apply_alpha(image, &mask)?;
    let softened = soften_alpha(&alpha_channel(&cutout));
    replace_alpha(&mut cutout, &softened)?;
    Ok(cutout)
}
