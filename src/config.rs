//! Tuning parameters for every pipeline stage.
//!
//! The decision thresholds (aspect-ratio bands, circularity floors, the
//! approximation ratio) are calibration values rather than domain constants,
//! so they all live here with their defaults and can be loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

/// Complete detector configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub preprocess: PreprocessConfig,
    pub edges: EdgeConfig,
    pub contours: ContourConfig,
    pub classifier: ClassifierConfig,
    pub hough: HoughConfig,
    pub annotation: AnnotationStyle,
}

impl DetectorConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DetectorConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage panic or make classifier branches overlap.
    pub fn validate(&self) -> Result<()> {
        self.preprocess.validate()?;
        self.edges.validate()?;
        self.contours.validate()?;
        self.classifier.validate()?;
        self.hough.validate()?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> DetectError {
    DetectError::InvalidConfig(msg.into())
}

/// Grayscale, local contrast equalization and noise reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Contrast limit of the tile-based equalization (typically 2.0..3.0)
    pub clip_limit: f32,
    /// Number of tiles along each axis
    pub tile_grid: u32,
    pub blur: BlurKind,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tile_grid: 8,
            blur: BlurKind::default(),
        }
    }
}

impl PreprocessConfig {
    fn validate(&self) -> Result<()> {
        if !(self.clip_limit > 0.0) {
            return Err(invalid("preprocess.clip_limit must be positive"));
        }
        if self.tile_grid == 0 {
            return Err(invalid("preprocess.tile_grid must be at least 1"));
        }
        if let BlurKind::Gaussian { sigma } = self.blur {
            if !(sigma > 0.0) {
                return Err(invalid("preprocess.blur.sigma must be positive"));
            }
        }
        Ok(())
    }
}

/// Noise-reduction policy applied after equalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlurKind {
    /// Gaussian blur. Keeps edges sharper; sigma 0.8 matches a 3x3 kernel.
    Gaussian { sigma: f32 },
    /// Median filter of side `2 * radius + 1`. More robust for round shapes.
    Median { radius: u32 },
}

impl Default for BlurKind {
    fn default() -> Self {
        BlurKind::Gaussian { sigma: 0.8 }
    }
}

/// Canny thresholds and the morphology that bridges broken outlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub thresholds: EdgeThresholds,
    /// Side length of the square structuring element
    pub morph_kernel: u8,
    pub close_iterations: u32,
    pub dilate_iterations: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            thresholds: EdgeThresholds::default(),
            morph_kernel: 2,
            close_iterations: 1,
            dilate_iterations: 1,
        }
    }
}

impl EdgeConfig {
    fn validate(&self) -> Result<()> {
        match self.thresholds {
            EdgeThresholds::Adaptive { sigma } => {
                if !(0.0..1.0).contains(&sigma) {
                    return Err(invalid("edges.thresholds.sigma must be in [0, 1)"));
                }
            }
            EdgeThresholds::Fixed { low, high } => {
                if !(low >= 1.0 && high >= low) {
                    return Err(invalid("edges.thresholds need 1 <= low <= high"));
                }
            }
        }
        if self.morph_kernel == 0 {
            return Err(invalid("edges.morph_kernel must be at least 1"));
        }
        Ok(())
    }
}

/// How the Canny hysteresis thresholds are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeThresholds {
    /// Thresholds at `(1 - sigma) * median` and `(1 + sigma) * median`.
    Adaptive { sigma: f32 },
    Fixed { low: f32, high: f32 },
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        EdgeThresholds::Adaptive { sigma: 0.25 }
    }
}

/// Contour area gates and polygon approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Absolute floor for the minimum contour area, in square pixels
    pub min_area: f64,
    /// Minimum area as a fraction of the frame area; the larger of the two wins
    pub min_area_frame_ratio: f64,
    /// Contours larger than this fraction of the frame are dropped
    pub max_area_frame_ratio: Option<f64>,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter
    pub approx_epsilon_ratio: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_area: 500.0,
            min_area_frame_ratio: 0.0002,
            max_area_frame_ratio: Some(0.25),
            approx_epsilon_ratio: 0.035,
        }
    }
}

impl ContourConfig {
    /// Smallest accepted area for a frame of the given size (inclusive).
    pub fn min_area_for(&self, width: u32, height: u32) -> f64 {
        let frame_area = width as f64 * height as f64;
        self.min_area.max(self.min_area_frame_ratio * frame_area)
    }

    /// Largest accepted area for a frame of the given size, if bounded.
    pub fn max_area_for(&self, width: u32, height: u32) -> Option<f64> {
        let frame_area = width as f64 * height as f64;
        self.max_area_frame_ratio.map(|ratio| ratio * frame_area)
    }

    fn validate(&self) -> Result<()> {
        if self.min_area < 0.0 || self.min_area_frame_ratio < 0.0 {
            return Err(invalid("contours minimum area must not be negative"));
        }
        if let Some(ratio) = self.max_area_frame_ratio {
            if !(ratio > 0.0) {
                return Err(invalid("contours.max_area_frame_ratio must be positive"));
            }
        }
        if !(self.approx_epsilon_ratio > 0.0) {
            return Err(invalid("contours.approx_epsilon_ratio must be positive"));
        }
        Ok(())
    }
}

/// Inclusive range for an aspect ratio (width / height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectBand {
    pub min: f64,
    pub max: f64,
}

impl AspectBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, aspect_ratio: f64) -> bool {
        aspect_ratio >= self.min && aspect_ratio <= self.max
    }
}

/// Decision tree thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Rejects degenerate three-vertex slivers
    pub triangle_min_circularity: f64,
    pub square_aspect: AspectBand,
    pub rectangle_aspect: AspectBand,
    pub circle_min_vertices: usize,
    pub circle_min_circularity: f64,
    pub circle_aspect: AspectBand,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            triangle_min_circularity: 0.3,
            square_aspect: AspectBand::new(0.95, 1.05),
            rectangle_aspect: AspectBand::new(0.25, 4.0),
            circle_min_vertices: 7,
            circle_min_circularity: 0.82,
            circle_aspect: AspectBand::new(0.8, 1.2),
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<()> {
        for (name, band) in [
            ("square_aspect", self.square_aspect),
            ("rectangle_aspect", self.rectangle_aspect),
            ("circle_aspect", self.circle_aspect),
        ] {
            if !(band.min > 0.0 && band.min <= band.max) {
                return Err(invalid(format!("classifier.{name} needs 0 < min <= max")));
            }
        }
        // Vertex counts 3 and 4 belong to the polygon branches.
        if self.circle_min_vertices < 5 {
            return Err(invalid("classifier.circle_min_vertices must be at least 5"));
        }
        Ok(())
    }
}

/// Hough-style circle fallback, used on sparse edge maps only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    pub enabled: bool,
    /// Fallback runs only when the edge density is strictly below this fraction
    pub max_edge_density: f32,
    /// Accumulator cell size in pixels
    pub resolution: u32,
    pub min_center_distance: f32,
    /// Minimum votes for an accumulator cell to become a center candidate
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
    /// Fraction of the circumference that must lie on edge pixels
    pub min_edge_support: f32,
    /// Radial slack in pixels when checking a sample against the edge map
    pub support_band: u32,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_edge_density: 0.02,
            resolution: 2,
            min_center_distance: 40.0,
            accumulator_threshold: 30,
            min_radius: 15,
            max_radius: 150,
            min_edge_support: 0.6,
            support_band: 1,
        }
    }
}

impl HoughConfig {
    fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(invalid("hough.resolution must be at least 1"));
        }
        if self.min_radius == 0 || self.min_radius > self.max_radius {
            return Err(invalid("hough radii need 1 <= min_radius <= max_radius"));
        }
        if !(self.min_edge_support > 0.0 && self.min_edge_support <= 1.0) {
            return Err(invalid("hough.min_edge_support must be in (0, 1]"));
        }
        if self.support_band >= self.min_radius {
            return Err(invalid("hough.support_band must be smaller than min_radius"));
        }
        Ok(())
    }
}

/// Overlay appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    pub line_thickness: u32,
    pub font_size: f32,
    /// Gap between the label baseline and the bounding box top
    pub label_offset: i32,
    pub center_marker_radius: i32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            font_size: 18.0,
            label_offset: 10,
            center_marker_radius: 2,
        }
    }
}
