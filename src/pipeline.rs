use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use tracing::debug;

use crate::detection::{tally, validate_frame};
use crate::models::{Contour, Detection, DetectionResult, HoughCircle};

/// State of one frame as it moves through the pipeline
#[derive(Clone)]
pub struct FrameData {
    /// The input frame, never modified
    pub original: Arc<RgbImage>,

    /// What the most recent step produced; this is the image saved in debug mode
    pub image: DynamicImage,

    /// Working grayscale image (equalized and blurred once those steps ran)
    pub gray: Option<GrayImage>,

    /// Binary edge map after morphology
    pub edges: Option<GrayImage>,

    pub edge_density: f32,
    pub contours: Vec<Contour>,
    pub detections: Vec<Detection>,
    pub hough_circles: Vec<HoughCircle>,
    pub fallback_ran: bool,

    /// Final overlay, set by the annotation step
    pub annotated: Option<RgbImage>,
}

impl FrameData {
    pub fn from_frame(frame: RgbImage) -> Self {
        let image = DynamicImage::ImageRgb8(frame.clone());
        Self {
            original: Arc::new(frame),
            image,
            gray: None,
            edges: None,
            edge_density: 0.0,
            contours: Vec::new(),
            detections: Vec::new(),
            hough_circles: Vec::new(),
            fallback_ran: false,
            annotated: None,
        }
    }

    /// Grayscale image or an error naming the step that needed it
    pub fn require_gray(&self, step: &str) -> Result<&GrayImage> {
        self.gray
            .as_ref()
            .with_context(|| format!("{step} needs a grayscale image; add a grayscale step first"))
    }

    /// Edge map or an error naming the step that needed it
    pub fn require_edges(&self, step: &str) -> Result<&GrayImage> {
        self.edges
            .as_ref()
            .with_context(|| format!("{step} needs an edge map; add an edge detection step first"))
    }

    /// Per-frame counts and the annotated frame (the untouched input if nothing annotated it)
    pub fn into_result(self) -> DetectionResult {
        let counts = tally(&self.detections, &self.hough_circles);
        let annotated = match self.annotated {
            Some(annotated) => annotated,
            None => Arc::unwrap_or_clone(self.original),
        };
        DetectionResult {
            annotated,
            counts,
            detections: self.detections,
            hough_circles: self.hough_circles,
            edge_density: self.edge_density,
            fallback_ran: self.fallback_ran,
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Transform the frame state
    fn process(&self, data: FrameData, context: &PipelineContext) -> Result<FrameData>;

    /// Human-readable name, also used for the debug directory
    fn name(&self) -> &str;
}

/// Composable pipeline builder
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)
                .with_context(|| format!("Failed to read debug directory {}", output_dir.display()))?;
            if entries.count() > 0 {
                anyhow::bail!("Debug directory is not empty: {}", output_dir.display());
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on one frame
    pub fn run(&self, frame: &RgbImage) -> Result<DetectionResult> {
        Ok(self.run_partial(frame, self.steps.len())?.into_result())
    }

    /// Run only the first `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, frame: &RgbImage, num_steps: usize) -> Result<FrameData> {
        validate_frame(frame)?;

        let mut data = FrameData::from_frame(frame.clone());
        self.save_debug("00_input", &data.image)?;

        for (i, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!("Running step {}: {}", i + 1, step.name());
            data = step
                .process(data, &self.context)
                .with_context(|| format!("Step '{}' failed", step.name()))?;

            let dir_name = format!("{:02}_{}", i + 1, step.name().to_lowercase().replace(' ', "_"));
            self.save_debug(&dir_name, &data.image)?;
        }

        Ok(data)
    }

    fn save_debug(&self, dir_name: &str, image: &DynamicImage) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };
        let dir = debug_config.output_dir.join(dir_name);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("01.png");
        save_png(image, &path)?;
        debug!("Debug: saved {}/01.png", dir_name);
        Ok(())
    }
}

fn save_png(image: &DynamicImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("Failed to save debug image {}", path.display()))
}
