use clap::{ArgGroup, Parser};
use image::{Rgb, Rgba};
use std::path::{Path, PathBuf};

use crate::errors::{AvatarSegError, Result};
use crate::model::MODEL_FILE_NAME;

/// Command line surface. Exactly one of `--input` (batch) or `--file`
/// (single preview) must be given.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "file"])))]
pub struct Cli {
    /// Directory of photos to process in batch mode.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Single photo to process (preview mode).
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Output directory (batch mode) or output file (preview mode).
    #[arg(long)]
    pub output: PathBuf,

    /// Canvas fill as `R,G,B`, used unless `--transparent` is set.
    #[arg(long, value_parser = parse_color)]
    pub color: Rgb<u8>,

    /// Fraction of the canvas height the subject should occupy.
    #[arg(long, value_parser = parse_scale)]
    pub scale: f64,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Matting erosion size.
    #[arg(long, default_value_t = 15)]
    pub erode: u32,

    /// Matting foreground threshold.
    #[arg(long, default_value_t = 220)]
    pub fg: u8,

    /// Matting background threshold.
    #[arg(long, default_value_t = 15)]
    pub bg: u8,

    /// Write transparent PNGs instead of filling the canvas.
    #[arg(long)]
    pub transparent: bool,

    /// U²-Net human segmentation model. Defaults to the rembg cache.
    #[arg(long, env = "AVATAR_SEG_MODEL")]
    pub model_path: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// Log debug diagnostics to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Transparent,
    Solid(Rgb<u8>),
}

impl Fill {
    pub const fn pixel(&self) -> Rgba<u8> {
        match self {
            Self::Transparent => Rgba([0, 0, 0, 0]),
            Self::Solid(Rgb([r, g, b])) => Rgba([*r, *g, *b, 255]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub fill: Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MattingParams {
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u32,
}

impl Default for MattingParams {
    fn default() -> Self {
        Self {
            foreground_threshold: 220,
            background_threshold: 15,
            erode_size: 15,
        }
    }
}

/// Per-run processing parameters. Built once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingConfig {
    pub canvas: CanvasSpec,
    pub head_scale: f64,
    pub matting: MattingParams,
}

impl ProcessingConfig {
    pub const fn transparent(&self) -> bool {
        matches!(self.canvas.fill, Fill::Transparent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Single { file: PathBuf, output: PathBuf },
    Batch { input: PathBuf, output: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub device_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: RunMode,
    pub processing: ProcessingConfig,
    pub model: ModelConfig,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings> {
        let mode = match (self.file, self.input) {
            (Some(file), None) => RunMode::Single {
                file,
                output: self.output,
            },
            (None, Some(input)) => RunMode::Batch {
                input,
                output: self.output,
            },
            _ => {
                return Err(AvatarSegError::Configuration {
                    message: "exactly one of --file or --input is required".to_string(),
                })
            }
        };

        let fill = if self.transparent {
            Fill::Transparent
        } else {
            Fill::Solid(self.color)
        };

        let processing = ProcessingConfig {
            canvas: CanvasSpec {
                width: self.width,
                height: self.height,
                fill,
            },
            head_scale: self.scale,
            matting: MattingParams {
                foreground_threshold: self.fg,
                background_threshold: self.bg,
                erode_size: self.erode,
            },
        };

        let model = ModelConfig {
            path: resolve_model_path(self.model_path)?,
            device_id: self.device_id,
        };

        Ok(Settings {
            mode,
            processing,
            model,
        })
    }
}

/// Explicit path first, then `$U2NET_HOME`, then `~/.u2net`, which is where
/// rembg caches its downloads.
pub fn resolve_model_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path,
        None => default_model_dir()?.join(MODEL_FILE_NAME),
    };

    if !path.is_file() {
        return Err(AvatarSegError::Configuration {
            message: format!("model file not found: {}", path.display()),
        });
    }
    Ok(path)
}

fn default_model_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("U2NET_HOME") {
        return Ok(PathBuf::from(home));
    }
    std::env::var_os("HOME")
        .map(|home| Path::new(&home).join(".u2net"))
        .ok_or_else(|| AvatarSegError::Configuration {
            message: "cannot locate the model: pass --model-path or set U2NET_HOME".to_string(),
        })
}

fn parse_color(s: &str) -> std::result::Result<Rgb<u8>, String> {
    let channels = s
        .split(',')
        .map(|c| {
            c.trim()
                .parse::<u8>()
                .map_err(|e| format!("invalid color component `{}`: {}", c.trim(), e))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    match channels.as_slice() {
        &[r, g, b] => Ok(Rgb([r, g, b])),
        _ => Err(format!("expected `R,G,B`, got `{}`", s)),
    }
}

fn parse_scale(s: &str) -> std::result::Result<f64, String> {
    let scale: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if scale.is_finite() && scale > 0.0 && scale <= 1.0 {
        Ok(scale)
    } else {
        Err(format!("{} is not in (0, 1]", s))
    }
}
