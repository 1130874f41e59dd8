pub mod annotate;
pub mod circles;
pub mod classify;
pub mod contours;
pub mod edges;
pub mod features;
pub mod preprocessing;
pub mod steps;

use std::sync::Arc;

use image::{GrayImage, RgbImage};
use tracing::{debug, info, instrument};

use crate::config::{ClassifierConfig, ContourConfig, DetectorConfig};
use crate::error::{DetectError, Result};
use crate::models::{Contour, Detection, DetectionResult, HoughCircle, ShapeCounts, ShapeLabel};
use crate::pipeline::Pipeline;

/// Reject frames with a zero dimension before any processing
pub fn validate_frame(frame: &RgbImage) -> Result<()> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::EmptyFrame { width, height });
    }
    Ok(())
}

/// Measure and classify contours, keeping only the labelled ones
pub fn classify_contours(
    contours: &[Contour],
    width: u32,
    height: u32,
    contour_config: &ContourConfig,
    classifier_config: &ClassifierConfig,
) -> Vec<Detection> {
    contours
        .iter()
        .filter_map(|contour| {
            let (features, polygon) = features::measure(contour, width, height, contour_config)?;
            let label = classify::classify(&features, classifier_config);
            debug!(
                "contour: area={:.0} vertices={} aspect={:.2} circularity={:.3} -> {:?}",
                features.area, features.vertex_count, features.aspect_ratio, features.circularity, label
            );
            label.map(|label| Detection { label, polygon, features })
        })
        .collect()
}

/// Per-frame counts: one per detection plus one Circle per fallback circle
pub fn tally(detections: &[Detection], circles: &[HoughCircle]) -> ShapeCounts {
    let mut counts = ShapeCounts::new();
    for detection in detections {
        counts.increment(detection.label);
    }
    for _ in circles {
        counts.increment(ShapeLabel::Circle);
    }
    counts
}

/// Classify the shapes in one frame.
///
/// The input is never modified; the result carries an annotated copy. When an
/// accumulator is given, this frame's counts are added to it.
#[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
pub fn detect_shapes(
    frame: &RgbImage,
    config: &DetectorConfig,
    accumulator: Option<&mut ShapeCounts>,
) -> Result<DetectionResult> {
    validate_frame(frame)?;
    config.validate()?;
    let (width, height) = frame.dimensions();

    let blurred = preprocess(frame, config);
    let edge_map = edges::detect_edges(&blurred, &config.edges);
    let edge_density = edges::edge_density(&edge_map);
    debug!("edge density {:.4}", edge_density);

    let found = contours::find_external_contours(&edge_map);
    let detections = classify_contours(&found, width, height, &config.contours, &config.classifier);
    debug!("{} contours, {} classified", found.len(), detections.len());

    let fallback_ran = circles::should_run(edge_density, &config.hough);
    let hough_circles = if fallback_ran {
        circles::detect_circles(&blurred, &edge_map, &config.hough)
    } else {
        Vec::new()
    };

    let counts = tally(&detections, &hough_circles);
    let annotated = annotate::annotate(frame, &detections, &hough_circles, &config.annotation);

    if let Some(accumulator) = accumulator {
        *accumulator += &counts;
    }

    info!(
        triangle = counts.triangle,
        square = counts.square,
        rectangle = counts.rectangle,
        circle = counts.circle,
        fallback_ran,
        "frame processed"
    );

    Ok(DetectionResult {
        annotated,
        counts,
        detections,
        hough_circles,
        edge_density,
        fallback_ran,
    })
}

/// Grayscale, equalized and blurred
fn preprocess(frame: &RgbImage, config: &DetectorConfig) -> GrayImage {
    let gray = preprocessing::to_grayscale(frame);
    let equalized =
        preprocessing::equalize_local(&gray, config.preprocess.clip_limit, config.preprocess.tile_grid);
    preprocessing::apply_blur(&equalized, config.preprocess.blur)
}

/// Shape detector bound to a validated configuration
#[derive(Debug, Clone, Default)]
pub struct ShapeDetector {
    config: DetectorConfig,
}

impl ShapeDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the full detection pipeline on a frame
    pub fn detect(&self, frame: &RgbImage) -> Result<DetectionResult> {
        detect_shapes(frame, &self.config, None)
    }

    /// Detect and add this frame's counts to `counts`
    pub fn detect_into(&self, frame: &RgbImage, counts: &mut ShapeCounts) -> Result<DetectionResult> {
        detect_shapes(frame, &self.config, Some(counts))
    }

    /// Preprocessed grayscale image (for debugging)
    pub fn preprocessed(&self, frame: &RgbImage) -> Result<GrayImage> {
        validate_frame(frame)?;
        Ok(preprocess(frame, &self.config))
    }

    /// Edge map after morphology (for debugging)
    pub fn edge_map(&self, frame: &RgbImage) -> Result<GrayImage> {
        let blurred = self.preprocessed(frame)?;
        Ok(edges::detect_edges(&blurred, &self.config.edges))
    }

    /// All external contours, before any area gate (for debugging)
    pub fn get_contours(&self, frame: &RgbImage) -> Result<Vec<Contour>> {
        Ok(contours::find_external_contours(&self.edge_map(frame)?))
    }

    /// Composable pipeline with the same stages as `detect`
    pub fn pipeline(&self) -> Pipeline {
        build_standard_pipeline(&self.config)
    }
}

/// Build the standard detection pipeline using the composable pipeline system
pub fn build_standard_pipeline(config: &DetectorConfig) -> Pipeline {
    use crate::detection::steps::*;

    Pipeline::new()
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(EqualizeStep {
            clip_limit: config.preprocess.clip_limit,
            tile_grid: config.preprocess.tile_grid,
        }))
        .add_step(Arc::new(BlurStep {
            blur: config.preprocess.blur,
        }))
        .add_step(Arc::new(EdgeDetectionStep {
            config: config.edges.clone(),
        }))
        .add_step(Arc::new(ContourDetectionStep))
        .add_step(Arc::new(ShapeClassificationStep {
            contours: config.contours.clone(),
            classifier: config.classifier.clone(),
            style: config.annotation.clone(),
        }))
        .add_step(Arc::new(CircleFallbackStep {
            config: config.hough.clone(),
            style: config.annotation.clone(),
        }))
        .add_step(Arc::new(AnnotationStep {
            style: config.annotation.clone(),
        }))
}
