use std::path::Path;

use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::Session,
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    errors::{AvatarSegError, Result},
    traits::ImageSegmentationModel,
};

/// File name rembg uses for the human segmentation variant of U²-Net.
pub const MODEL_FILE_NAME: &str = "u2net_human_seg.onnx";

/// Fallback input size when the model reports a dynamic shape.
const DEFAULT_IMAGE_SIZE: u32 = 320;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// U²-Net human segmentation running on ONNX Runtime.
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex; the model
/// itself is shared by reference across the whole batch.
pub struct Model {
    pub image_size: u32,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

fn model_error(operation: impl Into<String>, err: impl std::fmt::Display) -> AvatarSegError {
    AvatarSegError::Model {
        operation: operation.into(),
        source: err.to_string().into(),
    }
}

impl Model {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let mut session = Session::builder()
            .map_err(|e| model_error("session builder init", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| model_error("execution provider setup", e))?
            .with_memory_pattern(true)
            .map_err(|e| model_error("memory pattern setup", e))?
            .commit_from_file(model_path)
            .map_err(|e| model_error(format!("load model {}", model_path.display()), e))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| model_error("read model inputs", "model has no inputs"))?;
        let image_size = input
            .input_type
            .tensor_shape()
            .and_then(|shape| shape.get(2).copied())
            .filter(|&size| size > 0)
            .map_or(DEFAULT_IMAGE_SIZE, |size| size as u32);
        let input_name = input.name.clone();
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| model_error("read model outputs", "model has no outputs"))?;

        // warm up
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        session
            .run(ort::inputs![
                input_name.as_str() => TensorRef::from_array_view(&data)
                    .map_err(|e| model_error("warm-up tensor", e))?
            ])
            .map_err(|e| model_error("warm-up run", e))?;

        debug!(
            path = %model_path.display(),
            image_size,
            input = %input_name,
            output = %output_name,
            "segmentation model loaded"
        );

        Ok(Self {
            image_size,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }

    pub fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;
        let mask = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .to_owned();
        Ok(mask)
    }
}

impl ImageSegmentationModel for Model {
    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        let tensor = preprocess(image, self.image_size);
        let prediction = self.predict(tensor.view())?;
        let (width, height) = image.dimensions();
        postprocess_mask(prediction.view(), width, height)
    }
}

/// Resizes to the square model input, scales by the brightest channel value
/// and applies ImageNet normalization. Output is NCHW.
pub fn preprocess(image: &RgbImage, image_size: u32) -> Array4<f32> {
    let image = imageops::resize(image, image_size, image_size, FilterType::Lanczos3);
    let max = image
        .as_raw()
        .iter()
        .copied()
        .max()
        .map_or(0.0, f32::from)
        .max(1e-6);

    let pixels = image.as_ndarray3();
    let mut tensor = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
    for ((c, y, x), &value) in pixels.indexed_iter() {
        tensor[[0, c, y, x]] = (f32::from(value) / max - MEAN[c]) / STD[c];
    }
    tensor
}

/// Takes the first channel of the prediction, stretches it to the full
/// `u8` range and resizes it back to the source dimensions.
pub fn postprocess_mask(prediction: ArrayView4<f32>, width: u32, height: u32) -> Result<GrayImage> {
    let plane = prediction.slice(s![0, 0, .., ..]);
    let (rows, cols) = plane.dim();

    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let pixels = plane
        .iter()
        .map(|&v| {
            if range > f32::EPSILON {
                ((v - min) / range * 255.0) as u8
            } else {
                0
            }
        })
        .collect::<Vec<u8>>();

    let mask = GrayImage::from_raw(cols as u32, rows as u32, pixels).ok_or_else(|| {
        model_error(
            "mask conversion",
            format!("prediction of {cols}x{rows} does not fit an image buffer"),
        )
    })?;

    if mask.dimensions() == (width, height) {
        return Ok(mask);
    }
    Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
}
