use std::fmt;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage, RgbaImage};
use tracing::debug;

use crate::compositor::{composite, Placement};
use crate::config::ProcessingConfig;
use crate::encoder::{write_output, OutputFormat};
use crate::errors::{AvatarSegError, Result};
use crate::fit::{fit_dimensions, resize_subject, FitSize};
use crate::imaging::{crop, BoundingBox, ContentBounds, NOISE_THRESHOLD};
use crate::segmentation::{segment, Segmentation, SegmentationTier};
use crate::traits::ImageSegmentationModel;

/// States an image passes through, in order. An image leaves early as
/// failed (any stage errors) or skipped (no subject found when cropping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Segmented,
    Cropped,
    Resized,
    Composited,
    Encoded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "load",
            Self::Segmented => "segmentation",
            Self::Cropped => "crop",
            Self::Resized => "resize",
            Self::Composited => "composite",
            Self::Encoded => "encode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Written {
        output: PathBuf,
        format: OutputFormat,
        tier: SegmentationTier,
    },
    /// The mask had no pixel above the noise threshold; nothing was written.
    Skipped,
    /// Processing raised; the message is what went out as `ERROR:`.
    Failed { message: String },
}

/// A finished canvas plus how it was laid out.
#[derive(Debug, Clone)]
pub struct Composition {
    pub image: RgbaImage,
    pub tier: SegmentationTier,
    pub subject: BoundingBox,
    pub size: FitSize,
    pub placement: Placement,
}

/// Runs the in-memory stages on a decoded photo. `Ok(None)` means there was
/// no subject to place. `source` only labels errors and logs.
pub fn compose<M>(
    model: &M,
    image: &RgbImage,
    config: &ProcessingConfig,
    source: &Path,
) -> Result<Option<Composition>>
where
    M: ImageSegmentationModel + ?Sized,
{
    let Segmentation { image: cutout, tier } = segment(model, image, &config.matting)
        .map_err(|e| e.at_stage(source, Stage::Segmented))?;

    let Some(subject) = cutout.content_bounds(NOISE_THRESHOLD) else {
        return Ok(None);
    };
    let person = crop(&cutout, subject);

    let size = fit_dimensions(person.dimensions(), &config.canvas, config.head_scale);
    let person = resize_subject(&person, size);

    let (canvas, placement) = composite(&person, &config.canvas)
        .map_err(|e| e.at_stage(source, Stage::Composited))?;

    debug!(
        source = %source.display(),
        ?tier,
        ?subject,
        width = size.width,
        height = size.height,
        x = placement.x,
        y = placement.y,
        "composited subject"
    );

    Ok(Some(Composition {
        image: canvas,
        tier,
        subject,
        size,
        placement,
    }))
}

/// Decodes a photo the way it is displayed: the EXIF orientation, if any,
/// is applied before anything looks at the pixels.
pub fn load_image(input: &Path) -> Result<RgbImage> {
    let load_error = |source: Box<dyn std::error::Error + Send + Sync>| {
        AvatarSegError::ImageProcessing {
            path: input.display().to_string(),
            stage: Stage::Loaded,
            source,
        }
    };

    let mut decoder = ImageReader::open(input)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| load_error(Box::new(e)))?
        .into_decoder()
        .map_err(|e| load_error(Box::new(e)))?;
    let orientation = decoder.orientation().map_err(|e| load_error(Box::new(e)))?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| load_error(Box::new(e)))?;
    image.apply_orientation(orientation);

    Ok(image.into_rgb8())
}

/// Full pipeline for one file: decode, compose, encode.
pub fn process_single_image<M>(
    model: &M,
    input: &Path,
    output: &Path,
    config: &ProcessingConfig,
) -> Result<ImageOutcome>
where
    M: ImageSegmentationModel + ?Sized,
{
    let image = load_image(input)?;

    let Some(composition) = compose(model, &image, config, input)? else {
        debug!(input = %input.display(), "no subject above the noise threshold, skipping");
        return Ok(ImageOutcome::Skipped);
    };

    let format = write_output(composition.image, output, config.transparent())
        .map_err(|e| e.at_stage(input, Stage::Encoded))?;

    Ok(ImageOutcome::Written {
        output: output.to_path_buf(),
        format,
        tier: composition.tier,
    })
}
