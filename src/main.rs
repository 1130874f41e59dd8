use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::{ImageReader, RgbImage};
use tokio::sync::mpsc;
use tracing::{info, warn};

use shapecount::{
    render_histogram, run_capture, CaptureOptions, CountsReport, DetectorConfig, ShapeCounts,
    ShapeDetector, SharedCounts,
};

#[derive(Parser)]
#[command(name = "shapecount")]
#[command(about = "Classify and count triangles, squares, rectangles and circles in images")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify the shapes in one image
    Detect {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Where to write the annotated image
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Save per-step debug images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Stream image files through a counting window
    Capture {
        /// Frames, in playback order
        #[arg(value_name = "FRAMES", required = true)]
        frames: Vec<PathBuf>,

        /// Close the window after this many seconds
        #[arg(long, value_name = "SECONDS")]
        window_secs: Option<f64>,

        /// Stop after this many classified frames
        #[arg(long, value_name = "N")]
        max_frames: Option<u64>,

        /// Playback rate of the frame source
        #[arg(long, default_value_t = 10.0)]
        fps: f64,

        /// Save every annotated frame to directory
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file; missing fields take their defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a JSON report instead of a table
    #[arg(long)]
    json: bool,

    /// Render the counts as a bar chart
    #[arg(long, value_name = "PNG")]
    histogram: Option<PathBuf>,
}

impl CommonArgs {
    fn load_config(&self) -> Result<DetectorConfig> {
        match &self.config {
            Some(path) => DetectorConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => Ok(DetectorConfig::default()),
        }
    }

    fn report(&self, frames: u64, counts: ShapeCounts) -> Result<()> {
        if self.json {
            println!("{}", CountsReport::new(frames, counts)?.to_json()?);
        } else {
            println!("\n=== Shape Counts ({frames} frame(s)) ===");
            for (label, count) in counts.iter() {
                println!("  {:<10} {}", label.name(), count);
            }
            println!("  {:<10} {}", "Total", counts.total());
        }

        if let Some(path) = &self.histogram {
            render_histogram(&counts, 640, 400)
                .save(path)
                .with_context(|| format!("Failed to save histogram {}", path.display()))?;
            info!("Histogram saved to {}", path.display());
        }
        Ok(())
    }
}

fn load_frame(path: &Path) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(img.to_rgb8())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    shapecount::logging::init_tracing(cli.verbose);

    match cli.command {
        Command::Detect {
            image_path,
            output,
            debug_out,
            common,
        } => detect(&image_path, output.as_deref(), debug_out, &common),
        Command::Capture {
            frames,
            window_secs,
            max_frames,
            fps,
            out_dir,
            common,
        } => {
            let window = window_secs
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("--window-secs must be a non-negative number")?;
            let options = CaptureOptions { window, max_frames };
            capture(frames, options, fps, out_dir, &common).await
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&DetectorConfig::default())?);
            Ok(())
        }
    }
}

fn detect(
    image_path: &Path,
    output: Option<&Path>,
    debug_out: Option<PathBuf>,
    common: &CommonArgs,
) -> Result<()> {
    let detector = ShapeDetector::new(common.load_config()?)?;

    info!("Loading image: {}", image_path.display());
    let frame = load_frame(image_path)?;
    info!("Image loaded: {}x{}", frame.width(), frame.height());

    let result = match debug_out {
        Some(dir) => detector.pipeline().with_debug(dir)?.run(&frame)?,
        None => detector.detect(&frame)?,
    };

    if let Some(path) = output {
        result
            .annotated
            .save(path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!("Annotated image saved to {}", path.display());
    }

    common.report(1, result.counts)
}

async fn capture(
    frames: Vec<PathBuf>,
    options: CaptureOptions,
    fps: f64,
    out_dir: Option<PathBuf>,
    common: &CommonArgs,
) -> Result<()> {
    let detector = Arc::new(ShapeDetector::new(common.load_config()?)?);
    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let interval = if fps > 0.0 {
        Duration::from_secs_f64(1.0 / fps)
    } else {
        Duration::ZERO
    };

    let (tx, rx) = mpsc::channel(4);
    let producer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        for path in frames {
            ticker.tick().await;
            let loaded = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_frame(&path)).await
            };
            match loaded {
                Ok(Ok(frame)) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(Err(e)) => warn!("Skipping {}: {:#}", path.display(), e),
                Err(e) => warn!("Loader for {} failed: {}", path.display(), e),
            }
        }
    });

    let shared = SharedCounts::new();
    let summary = run_capture(detector, rx, shared.clone(), options, |index, result| {
        info!(frame = index, total = result.counts.total(), "Frame classified");
        if let Some(dir) = &out_dir {
            let path = dir.join(format!("frame_{index:04}.png"));
            result
                .annotated
                .save(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
        }
        Ok(())
    })
    .await?;
    producer.abort();

    info!(
        "Capture stopped ({:?}): {} frames classified, {} skipped",
        summary.stop_reason, summary.frames_processed, summary.frames_skipped
    );
    common.report(shared.frames(), summary.counts)
}
