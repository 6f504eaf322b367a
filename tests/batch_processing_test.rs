use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use avatar_seg_rs::config::{CanvasSpec, Fill, MattingParams};
use avatar_seg_rs::mocks::{FailingSegmentationModel, MockSegmentationModel, MockSubject};
use avatar_seg_rs::{
    BatchSummary, ImageProcessor, ImageSegmentationModel, ProcessingConfig, ProgressReporter,
    RunMode,
};

fn processing(fill: Fill) -> ProcessingConfig {
    ProcessingConfig {
        canvas: CanvasSpec {
            width: 96,
            height: 128,
            fill,
        },
        head_scale: 0.6,
        matting: MattingParams::default(),
    }
}

fn write_photo(path: &Path) {
    RgbImage::from_fn(80, 100, |x, y| {
        if (20..60).contains(&x) && y >= 10 {
            Rgb([230, 200, 170])
        } else {
            Rgb([40, 120, 40])
        }
    })
    .save(path)
    .unwrap();
}

fn run_batch<M: ImageSegmentationModel>(
    model: M,
    fill: Fill,
    input: &Path,
    output: &Path,
) -> (BatchSummary, Vec<String>) {
    let processor = ImageProcessor::new(model, processing(fill));
    let mut reporter = ProgressReporter::new(Vec::new());
    let mode = RunMode::Batch {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
    };
    let summary = processor.run(&mode, &mut reporter).unwrap();
    let stdout = String::from_utf8(reporter.into_inner()).unwrap();
    (summary, stdout.lines().map(str::to_string).collect())
}

#[test]
fn test_batch_skips_unsupported_files() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;

    write_photo(&input.join("a.jpg"));
    write_photo(&input.join("b.JPEG"));
    write_photo(&input.join("c.png"));
    fs::write(input.join("d.gif"), b"GIF89a")?;

    let (summary, lines) = run_batch(
        MockSegmentationModel::rect(20, 10, 60, 100),
        Fill::Solid(Rgb([255, 255, 255])),
        &input,
        &output,
    );

    assert_eq!(
        lines,
        ["STARTING:3", "PROGRESS:1/3", "PROGRESS:2/3", "PROGRESS:3/3", "DONE"]
    );
    assert_eq!(summary.total, 3);
    assert_eq!(summary.written, 3);

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let written = image::open(output.join(name))?;
        assert_eq!((written.width(), written.height()), (96, 128), "{name}");
    }
    assert!(!output.join("d.jpg").exists());
    assert_eq!(fs::read(input.join("d.gif"))?, b"GIF89a");
    Ok(())
}

#[test]
fn test_empty_directory_still_reports() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("nested").join("output");
    fs::create_dir_all(&input)?;

    let (summary, lines) = run_batch(
        MockSegmentationModel::new(MockSubject::Empty),
        Fill::Transparent,
        &input,
        &output,
    );

    assert_eq!(lines, ["STARTING:0", "DONE"]);
    assert_eq!(summary, BatchSummary::default());
    assert!(output.is_dir());
    Ok(())
}

#[test]
fn test_empty_subject_is_skipped_silently() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    write_photo(&input.join("empty.png"));

    let (summary, lines) = run_batch(
        MockSegmentationModel::new(MockSubject::Empty),
        Fill::Transparent,
        &input,
        &output,
    );

    assert_eq!(lines, ["STARTING:1", "PROGRESS:1/1", "DONE"]);
    assert_eq!(summary.skipped, 1);
    assert_eq!(fs::read_dir(&output)?.count(), 0);
    Ok(())
}

#[test]
fn test_failures_do_not_stop_the_batch() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    write_photo(&input.join("one.jpg"));
    write_photo(&input.join("two.jpg"));

    let (summary, lines) = run_batch(
        FailingSegmentationModel,
        Fill::Transparent,
        &input,
        &output,
    );

    assert_eq!(lines.len(), 6, "{lines:?}");
    assert_eq!(lines[0], "STARTING:2");
    assert!(lines[1].starts_with("ERROR:"));
    assert_eq!(lines[2], "PROGRESS:1/2");
    assert!(lines[3].starts_with("ERROR:"));
    assert_eq!(lines[4], "PROGRESS:2/2");
    assert_eq!(lines[5], "DONE");
    assert_eq!(summary.failed, 2);
    Ok(())
}

#[test]
fn test_corrupt_file_reports_error_and_continues() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    fs::write(input.join("a_broken.jpg"), b"not a jpeg")?;
    write_photo(&input.join("b_good.jpg"));

    let (summary, lines) = run_batch(
        MockSegmentationModel::rect(20, 10, 60, 100),
        Fill::Solid(Rgb([0, 0, 0])),
        &input,
        &output,
    );

    assert_eq!(lines[0], "STARTING:2");
    assert!(lines[1].starts_with("ERROR:"), "{lines:?}");
    assert_eq!(&lines[2..], ["PROGRESS:1/2", "PROGRESS:2/2", "DONE"]);
    assert_eq!(summary.written, 1);
    assert_eq!(summary.failed, 1);
    assert!(output.join("b_good.jpg").exists());
    Ok(())
}
