pub mod compositor;
pub mod config;
pub mod encoder;
pub mod errors;
pub mod fit;
pub mod imaging;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod segmentation;
pub mod traits;

pub mod mocks;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use config::{Cli, ProcessingConfig, RunMode, Settings};
pub use errors::{AvatarSegError, Result};
pub use model::Model;
pub use pipeline::{process_single_image, ImageOutcome, Stage};
pub use progress::ProgressReporter;
pub use traits::*;

#[cfg(test)]
pub use mocks::*;

/// Tally of a run. Single-file runs count as a batch of one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &ImageOutcome) {
        match outcome {
            ImageOutcome::Written { .. } => self.written += 1,
            ImageOutcome::Skipped => self.skipped += 1,
            ImageOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct ImageProcessor<M: ImageSegmentationModel> {
    model: M,
    config: ProcessingConfig,
}

impl<M: ImageSegmentationModel> ImageProcessor<M> {
    pub const fn new(model: M, config: ProcessingConfig) -> Self {
        Self { model, config }
    }

    pub const fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn run<W: Write>(
        &self,
        mode: &RunMode,
        reporter: &mut ProgressReporter<W>,
    ) -> Result<BatchSummary> {
        match mode {
            RunMode::Single { file, output } => {
                let outcome = self.process_file(file, output, reporter)?;
                let mut summary = BatchSummary {
                    total: 1,
                    ..BatchSummary::default()
                };
                summary.record(&outcome);
                Ok(summary)
            }
            RunMode::Batch { input, output } => self.process_directory(input, output, reporter),
        }
    }

    /// Preview mode: nothing is reported unless the image fails.
    pub fn process_file<W: Write>(
        &self,
        input: &Path,
        output: &Path,
        reporter: &mut ProgressReporter<W>,
    ) -> Result<ImageOutcome> {
        self.attempt(input, output, reporter)
    }

    /// Processes every eligible file directly inside `input_dir`, in name
    /// order. Failures are reported and the batch moves on; only an
    /// unreadable input directory or an uncreatable output directory abort.
    pub fn process_directory<W: Write>(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        reporter: &mut ProgressReporter<W>,
    ) -> Result<BatchSummary> {
        if !input_dir.is_dir() {
            return Err(AvatarSegError::FileSystem {
                path: input_dir.to_path_buf(),
                operation: "read input directory".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "input directory does not exist",
                ),
            });
        }

        fs::create_dir_all(output_dir).map_err(|e| AvatarSegError::FileSystem {
            path: output_dir.to_path_buf(),
            operation: "create output directory".to_string(),
            source: e,
        })?;

        let image_files = self.collect_image_files(input_dir)?;
        let total = image_files.len();
        info!(total, input = %input_dir.display(), "starting batch");

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        reporter.starting(total)?;
        for (index, input_file) in image_files.iter().enumerate() {
            let output_file = output_path_for(input_file, output_dir, self.config.transparent());
            let outcome = self.attempt(input_file, &output_file, reporter)?;
            summary.record(&outcome);
            reporter.progress(index + 1, total)?;
        }
        reporter.done()?;

        info!(?summary, "batch finished");
        Ok(summary)
    }

    /// Runs one image and turns a per-image failure into an `ERROR:` line.
    /// Only a broken progress stream is returned as an error.
    fn attempt<W: Write>(
        &self,
        input: &Path,
        output: &Path,
        reporter: &mut ProgressReporter<W>,
    ) -> Result<ImageOutcome> {
        match process_single_image(&self.model, input, output, &self.config) {
            Ok(outcome) => {
                debug!(input = %input.display(), ?outcome, "image finished");
                Ok(outcome)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(input = %input.display(), error = %message, "image failed");
                reporter.error(&message)?;
                Ok(ImageOutcome::Failed { message })
            }
        }
    }

    fn collect_image_files(&self, input_path: &Path) -> Result<Vec<PathBuf>> {
        let mut image_files = Vec::new();

        for entry in WalkDir::new(input_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| AvatarSegError::FileSystem {
                path: e.path().unwrap_or(input_path).to_path_buf(),
                operation: "list input directory".to_string(),
                source: e.into(),
            })?;
            let path = entry.path();
            if path.is_file() && self.is_supported_image_format(path) {
                image_files.push(path.to_path_buf());
            }
        }

        Ok(image_files)
    }

    pub fn is_supported_image_format(&self, path: &Path) -> bool {
        is_supported_image_format(path)
    }
}

impl ImageProcessor<Model> {
    pub fn with_onnx_model(settings: &Settings) -> Result<Self> {
        let model = Model::new(&settings.model.path, settings.model.device_id)?;
        Ok(Self::new(model, settings.processing))
    }
}

pub fn is_supported_image_format(path: &Path) -> bool {
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        matches!(extension.to_lowercase().as_str(), "jpg" | "jpeg" | "png")
    } else {
        false
    }
}

/// Everything before the first `.` of the file name, with `.png` for
/// transparent output and `.jpg` otherwise: `photo.final.jpg` becomes
/// `photo.jpg`.
pub fn output_file_name(input_file: &Path, transparent: bool) -> String {
    let file_name = input_file
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    let extension = if transparent { "png" } else { "jpg" };
    format!("{stem}.{extension}")
}

pub fn output_path_for(input_file: &Path, output_dir: &Path, transparent: bool) -> PathBuf {
    output_dir.join(output_file_name(input_file, transparent))
}
