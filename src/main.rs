use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use ppocr::{DetectionOptions, OcrBuilder, RecognitionOptions};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Detect and recognize text in images.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Detection model (ONNX).
    #[arg(long)]
    det_model: PathBuf,
    /// Recognition model (ONNX).
    #[arg(long)]
    rec_model: PathBuf,
    /// Character table, one symbol per line.
    #[arg(long)]
    keys: PathBuf,
    #[arg(long, default_value_t = 4)]
    threads: usize,
    #[arg(long, default_value_t = DetectionOptions::default().max_side_len)]
    max_side_len: u32,
    #[arg(long, default_value_t = DetectionOptions::default().det_db_thresh)]
    det_db_thresh: f32,
    #[arg(long, default_value_t = DetectionOptions::default().det_db_box_thresh)]
    det_db_box_thresh: f32,
    #[arg(long, default_value_t = DetectionOptions::default().det_db_unclip_ratio)]
    det_db_unclip_ratio: f32,
    #[arg(long)]
    det_db_use_dilate: bool,
    /// Image files, or directories containing jpg/png images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn collect_images(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            images.push(input.clone());
            continue;
        }
        let mut found = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect::<Vec<_>>();
        found.sort();
        images.extend(found);
    }
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let detection = DetectionOptions {
        max_side_len: args.max_side_len,
        det_db_thresh: args.det_db_thresh,
        det_db_box_thresh: args.det_db_box_thresh,
        det_db_unclip_ratio: args.det_db_unclip_ratio,
        det_db_use_dilate: args.det_db_use_dilate,
        ..Default::default()
    };

    let mut ocr = match OcrBuilder::new()
        .threads(args.threads)
        .det_model(&args.det_model)
        .rec_model(&args.rec_model, &args.keys)
        .detection_options(detection)
        .recognition_options(RecognitionOptions::default())
        .build()
    {
        Ok(ocr) => ocr,
        Err(err) => {
            eprintln!("Failed to set up OCR: {err}");
            return ExitCode::FAILURE;
        }
    };

    let images = match collect_images(&args.inputs) {
        Ok(images) => images,
        Err(err) => {
            eprintln!("Failed to list inputs: {err}");
            return ExitCode::FAILURE;
        }
    };

    for path in images {
        let image = match image::open(&path) {
            Ok(image) => image,
            Err(err) => {
                eprintln!("Skipping {}: {err}", path.display());
                continue;
            }
        };
        let start = Instant::now();
        match ocr.run(&image) {
            Ok(results) => {
                log::debug!("{} took {:?}", path.display(), start.elapsed());
                println!("{}: {} regions", path.display(), results.len());
                for result in results {
                    println!(
                        "  {:?} -> {:?} (confidence: {:.3})",
                        result.bounds.polygon.as_pixels(),
                        result.text.text,
                        result.text.confidence
                    );
                }
            }
            Err(err) => eprintln!("Failed on {}: {err}", path.display()),
        }
    }
    ExitCode::SUCCESS
}
