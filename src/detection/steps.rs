use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};

use crate::config::{
    AnnotationStyle, BlurKind, ClassifierConfig, ContourConfig, EdgeConfig, HoughConfig,
};
use crate::detection::{annotate, circles, classify_contours, contours, edges, preprocessing};
use crate::pipeline::{FrameData, PipelineContext, PipelineStep};

/// Convert frame to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let gray = preprocessing::to_grayscale(&data.original);
        data.image = DynamicImage::ImageLuma8(gray.clone());
        data.gray = Some(gray);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Tile-based contrast equalization
pub struct EqualizeStep {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl PipelineStep for EqualizeStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let gray = data.require_gray(self.name())?;
        let equalized = preprocessing::equalize_local(gray, self.clip_limit, self.tile_grid);
        data.image = DynamicImage::ImageLuma8(equalized.clone());
        data.gray = Some(equalized);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Contrast Equalization"
    }
}

/// Noise reduction
pub struct BlurStep {
    pub blur: BlurKind,
}

impl PipelineStep for BlurStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let gray = data.require_gray(self.name())?;
        let blurred = preprocessing::apply_blur(gray, self.blur);
        data.image = DynamicImage::ImageLuma8(blurred.clone());
        data.gray = Some(blurred);
        Ok(data)
    }

    fn name(&self) -> &str {
        match self.blur {
            BlurKind::Gaussian { .. } => "Gaussian Blur",
            BlurKind::Median { .. } => "Median Blur",
        }
    }
}

/// Canny edges plus closing and dilation
pub struct EdgeDetectionStep {
    pub config: EdgeConfig,
}

impl PipelineStep for EdgeDetectionStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let gray = data.require_gray(self.name())?;
        let edge_map = edges::detect_edges(gray, &self.config);
        data.edge_density = edges::edge_density(&edge_map);
        data.image = DynamicImage::ImageLuma8(edge_map.clone());
        data.edges = Some(edge_map);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

/// Find external contours in the edge map
pub struct ContourDetectionStep;

impl PipelineStep for ContourDetectionStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let edge_map = data.require_edges(self.name())?;
        let found = contours::find_external_contours(edge_map);

        // debug view: every outline in white on black
        let mut view = RgbImage::new(edge_map.width(), edge_map.height());
        for contour in &found {
            annotate::draw_polygon_outline(&mut view, &contour.points, Rgb([255, 255, 255]), 1);
        }

        data.image = DynamicImage::ImageRgb8(view);
        data.contours = found;
        Ok(data)
    }

    fn name(&self) -> &str {
        "Contour Detection"
    }
}

/// Measure contours and keep the ones the decision tree labels
pub struct ShapeClassificationStep {
    pub contours: ContourConfig,
    pub classifier: ClassifierConfig,
    pub style: AnnotationStyle,
}

impl PipelineStep for ShapeClassificationStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let (width, height) = data.original.dimensions();
        data.detections =
            classify_contours(&data.contours, width, height, &self.contours, &self.classifier);

        let view = annotate::annotate(&data.original, &data.detections, &[], &self.style);
        data.image = DynamicImage::ImageRgb8(view);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Shape Classification"
    }
}

/// Hough circle search, only on sparse edge maps
pub struct CircleFallbackStep {
    pub config: HoughConfig,
    pub style: AnnotationStyle,
}

impl PipelineStep for CircleFallbackStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        data.fallback_ran = circles::should_run(data.edge_density, &self.config);
        let found = if data.fallback_ran {
            let gray = data.require_gray(self.name())?;
            let edge_map = data.require_edges(self.name())?;
            circles::detect_circles(gray, edge_map, &self.config)
        } else {
            Vec::new()
        };
        data.hough_circles = found;

        let view = annotate::annotate(&data.original, &[], &data.hough_circles, &self.style);
        data.image = DynamicImage::ImageRgb8(view);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Circle Fallback"
    }
}

/// Draw every detection on a copy of the input
pub struct AnnotationStep {
    pub style: AnnotationStyle,
}

impl PipelineStep for AnnotationStep {
    fn process(&self, mut data: FrameData, _context: &PipelineContext) -> Result<FrameData> {
        let annotated =
            annotate::annotate(&data.original, &data.detections, &data.hough_circles, &self.style);
        data.image = DynamicImage::ImageRgb8(annotated.clone());
        data.annotated = Some(annotated);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Annotation"
    }
}
