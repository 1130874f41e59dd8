use std::fmt;
use std::ops::AddAssign;

use image::RgbImage;
use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// Guards the circularity denominator against zero-length contours.
pub const CIRCULARITY_EPSILON: f64 = 1e-9;

/// Outline of one connected region of the edge map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed area (shoelace formula, always non-negative)
    pub fn area(&self) -> f64 {
        contour_area(&self.points)
    }

    /// Length of the closed outline
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::enclosing(&self.points)
    }

    /// 4π·area / perimeter², 1.0 for a perfect circle
    pub fn circularity(&self) -> f64 {
        circularity(self.area(), self.perimeter())
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.bounding_box().aspect_ratio()
    }
}

/// 4π·area / (perimeter² + ε). A zero perimeter gives 0, never a circle.
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter <= CIRCULARITY_EPSILON {
        return 0.0;
    }
    4.0 * std::f64::consts::PI * area / (perimeter * perimeter + CIRCULARITY_EPSILON)
}

/// Axis-aligned box; width and height count pixels inclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn enclosing(points: &[Point<i32>]) -> Self {
        let Some(first) = points.first() else {
            return Self { x: 0, y: 0, width: 0, height: 0 };
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Geometric measurements of one contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeFeatures {
    pub area: f64,
    pub perimeter: f64,
    /// Vertices of the approximated polygon
    pub vertex_count: usize,
    pub bounding_box: BoundingBox,
    pub aspect_ratio: f64,
    pub circularity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeLabel {
    Triangle,
    Square,
    Rectangle,
    Circle,
}

impl ShapeLabel {
    pub const ALL: [ShapeLabel; 4] = [
        ShapeLabel::Triangle,
        ShapeLabel::Square,
        ShapeLabel::Rectangle,
        ShapeLabel::Circle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShapeLabel::Triangle => "Triangle",
            ShapeLabel::Square => "Square",
            ShapeLabel::Rectangle => "Rectangle",
            ShapeLabel::Circle => "Circle",
        }
    }
}

impl fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-label detection counts. The key set is fixed; counts only grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeCounts {
    pub triangle: u32,
    pub square: u32,
    pub rectangle: u32,
    pub circle: u32,
}

impl ShapeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: ShapeLabel) -> u32 {
        match label {
            ShapeLabel::Triangle => self.triangle,
            ShapeLabel::Square => self.square,
            ShapeLabel::Rectangle => self.rectangle,
            ShapeLabel::Circle => self.circle,
        }
    }

    pub fn increment(&mut self, label: ShapeLabel) {
        let slot = match label {
            ShapeLabel::Triangle => &mut self.triangle,
            ShapeLabel::Square => &mut self.square,
            ShapeLabel::Rectangle => &mut self.rectangle,
            ShapeLabel::Circle => &mut self.circle,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        self.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Counts in display order
    pub fn iter(&self) -> impl Iterator<Item = (ShapeLabel, u32)> + '_ {
        ShapeLabel::ALL.into_iter().map(move |label| (label, self.get(label)))
    }
}

impl AddAssign<&ShapeCounts> for ShapeCounts {
    fn add_assign(&mut self, other: &ShapeCounts) {
        self.triangle = self.triangle.saturating_add(other.triangle);
        self.square = self.square.saturating_add(other.square);
        self.rectangle = self.rectangle.saturating_add(other.rectangle);
        self.circle = self.circle.saturating_add(other.circle);
    }
}

/// One contour accepted by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: ShapeLabel,
    /// Approximated polygon, drawn as the outline
    pub polygon: Vec<Point<i32>>,
    pub features: ShapeFeatures,
}

/// One circle accepted by the Hough fallback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoughCircle {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    pub votes: u32,
    /// Fraction of the sampled circumference lying on edge pixels
    pub support: f32,
}

/// Everything produced for one input frame.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Copy of the input with outlines and labels drawn on it
    pub annotated: RgbImage,
    pub counts: ShapeCounts,
    pub detections: Vec<Detection>,
    pub hough_circles: Vec<HoughCircle>,
    /// Fraction of edge pixels after morphology
    pub edge_density: f32,
    pub fallback_ran: bool,
}
