use std::sync::OnceLock;

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::point::Point;

use crate::config::AnnotationStyle;
use crate::models::{BoundingBox, Detection, HoughCircle, ShapeLabel};

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Embedded label font, parsed once
pub fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| FontRef::try_from_slice(FONT_DATA).ok()).as_ref()
}

pub fn label_color(label: ShapeLabel) -> Rgb<u8> {
    match label {
        ShapeLabel::Triangle => Rgb([255, 255, 0]),
        ShapeLabel::Square => Rgb([0, 0, 255]),
        ShapeLabel::Rectangle => Rgb([0, 255, 0]),
        ShapeLabel::Circle => Rgb([255, 0, 0]),
    }
}

/// Pixel offsets that give a line of the requested thickness
fn thickness_range(thickness: u32) -> std::ops::RangeInclusive<i32> {
    let thickness = thickness.max(1) as i32;
    -((thickness - 1) / 2)..=thickness / 2
}

/// Closed polygon outline
pub fn draw_polygon_outline(canvas: &mut RgbImage, polygon: &[Point<i32>], color: Rgb<u8>, thickness: u32) {
    if polygon.len() < 2 {
        return;
    }
    let offsets = thickness_range(thickness);
    for (i, start) in polygon.iter().enumerate() {
        let end = polygon[(i + 1) % polygon.len()];
        for ox in offsets.clone() {
            for oy in offsets.clone() {
                draw_line_segment_mut(
                    canvas,
                    ((start.x + ox) as f32, (start.y + oy) as f32),
                    ((end.x + ox) as f32, (end.y + oy) as f32),
                    color,
                );
            }
        }
    }
}

/// Label text above the box's top-left corner, kept inside the frame
pub fn draw_label(canvas: &mut RgbImage, text: &str, anchor: BoundingBox, color: Rgb<u8>, style: &AnnotationStyle) {
    let Some(font) = label_font() else {
        return;
    };
    let scale = PxScale::from(style.font_size);
    let (text_w, text_h) = text_size(scale, font, text);
    let (width, height) = canvas.dimensions();

    let max_x = (width as i32 - text_w as i32).max(0);
    let max_y = (height as i32 - text_h as i32).max(0);
    let x = (anchor.x as i32).clamp(0, max_x);
    let y = (anchor.y as i32 - style.label_offset - text_h as i32).clamp(0, max_y);

    draw_text_mut(canvas, color, x, y, scale, font, text);
}

/// Outline and label for one classified contour
pub fn draw_detection(canvas: &mut RgbImage, detection: &Detection, style: &AnnotationStyle) {
    let color = label_color(detection.label);
    draw_polygon_outline(canvas, &detection.polygon, color, style.line_thickness);
    draw_label(canvas, detection.label.name(), detection.features.bounding_box, color, style);
}

/// Outline and center marker for one fallback circle
pub fn draw_hough_circle(canvas: &mut RgbImage, circle: &HoughCircle, style: &AnnotationStyle) {
    let color = label_color(ShapeLabel::Circle);
    let center = (circle.center_x.round() as i32, circle.center_y.round() as i32);
    let radius = circle.radius.round() as i32;
    for offset in thickness_range(style.line_thickness) {
        if radius + offset > 0 {
            draw_hollow_circle_mut(canvas, center, radius + offset, color);
        }
    }
    draw_filled_circle_mut(canvas, center, style.center_marker_radius.max(1), color);
}

/// Copy of the frame with every detection drawn on it
pub fn annotate(
    frame: &RgbImage,
    detections: &[Detection],
    circles: &[HoughCircle],
    style: &AnnotationStyle,
) -> RgbImage {
    let mut canvas = frame.clone();
    for detection in detections {
        draw_detection(&mut canvas, detection, style);
    }
    for circle in circles {
        draw_hough_circle(&mut canvas, circle, style);
    }
    canvas
}
