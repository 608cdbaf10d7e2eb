mod background;
mod capture;
mod compositor;
mod output;
mod pipeline;
mod scheduler;
mod segmentation;

use anyhow::{Context, Result};
use background::{spawn_prompt_worker, BackgroundGenerator, BackgroundImage, BackgroundLayer};
use capture::WebcamCapture;
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver};
use output::V4L2Output;
use pipeline::Pipeline;
use scheduler::FixedRateScheduler;
use std::io;
use std::thread;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to segmentation model (ONNX file)
    /// If not provided, runs in passthrough mode without segmentation
    #[arg(long)]
    model: Option<String>,

    /// Show the segmentation mask instead of the composited video
    #[arg(long)]
    show_mask: bool,

    /// Background image, as a file path or http(s) URL
    /// Without one, background pixels are transparent black
    #[arg(short, long)]
    background: Option<String>,

    /// Image generation endpoint; when set, each line typed on stdin is sent
    /// as a prompt and the generated picture becomes the background
    #[arg(long)]
    generator_url: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Camola backdrop starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let capture = WebcamCapture::new(
        args.input_device,
        args.capture_width,
        args.capture_height,
        args.fps,
    )
    .context("Failed to initialize webcam capture")?;

    let output = V4L2Output::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    let background = args
        .background
        .as_deref()
        .map(BackgroundImage::load)
        .transpose()
        .context("Failed to load background image")?;
    if background.is_none() {
        tracing::info!("No background image given, background pixels will be transparent");
    }

    let mut pipeline = Pipeline::new(capture, output, BackgroundLayer::new(background))
        .with_mask_preview(args.show_mask);

    if let Some(model_path) = &args.model {
        tracing::info!("Loading segmentation model from {} in the background", model_path);
        pipeline = pipeline.with_loader(segmentation::load_default_model(model_path));
    } else {
        tracing::info!("Running in passthrough mode (no segmentation)");
    }

    if let Some(endpoint) = &args.generator_url {
        let generator = BackgroundGenerator::new(endpoint.as_str())?;
        let backgrounds =
            spawn_prompt_worker(stdin_prompts(), move |prompt| generator.generate(prompt));
        pipeline = pipeline.with_background_updates(backgrounds);
        tracing::info!("Type a prompt and press Enter to generate a new background");
    }

    tracing::info!("Press Ctrl+C to stop");
    let mut scheduler = FixedRateScheduler::new(args.fps);
    tracing::debug!("Frame interval: {:?}", scheduler.frame_duration());
    pipeline::run(&mut pipeline, &mut scheduler)?;

    Ok(())
}

fn stdin_prompts() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("Stopped reading prompts from stdin: {err}");
                    break;
                }
            }
        }
    });
    rx
}
