use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage, RgbaImage};

use crate::errors::{AvatarSegError, Result};
use crate::pipeline::Stage;

pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg { quality: u8 },
}

/// PNG whenever transparency is wanted or the destination says `.png`,
/// otherwise JPEG. The destination extension is not consulted beyond that.
pub fn choose_format(transparent: bool, destination: &Path) -> OutputFormat {
    let png_destination = destination
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));

    if transparent || png_destination {
        OutputFormat::Png
    } else {
        OutputFormat::Jpeg {
            quality: JPEG_QUALITY,
        }
    }
}

/// Writes the composited canvas, returning the format used.
pub fn write_output(image: RgbaImage, destination: &Path, transparent: bool) -> Result<OutputFormat> {
    let format = choose_format(transparent, destination);
    encode(image, destination, format)?;
    Ok(format)
}

pub fn encode(image: RgbaImage, destination: &Path, format: OutputFormat) -> Result<()> {
    let encode_error = |source: image::ImageError| AvatarSegError::ImageProcessing {
        path: destination.display().to_string(),
        stage: Stage::Encoded,
        source: Box::new(source),
    };

    match format {
        OutputFormat::Png => image
            .save_with_format(destination, ImageFormat::Png)
            .map_err(encode_error),
        OutputFormat::Jpeg { quality } => {
            let file = File::create(destination).map_err(|source| AvatarSegError::FileSystem {
                path: destination.to_path_buf(),
                operation: "create output file".to_string(),
                source,
            })?;
            // JPEG has no alpha; the canvas is already opaque
            let flattened: RgbImage = image.convert();
            let mut writer = BufWriter::new(file);
            flattened
                .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
                .map_err(encode_error)?;
            writer.flush().map_err(|source| AvatarSegError::FileSystem {
                path: destination.to_path_buf(),
                operation: "flush output file".to_string(),
                source,
            })
        }
    }
}
