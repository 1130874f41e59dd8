//! End-to-end classification on synthetic frames.
//!
//! The circle fallback is switched off here so each count comes from the
//! contour path alone; the fallback has its own tests in `test_hough.rs`.

mod common;

use approx::assert_relative_eq;
use shapecount::{detect_shapes, DetectError, ShapeCounts, ShapeDetector, ShapeLabel};

use common::*;

fn only(label: ShapeLabel) -> ShapeCounts {
    let mut counts = ShapeCounts::new();
    counts.increment(label);
    counts
}

#[test]
fn test_blank_frame_is_left_untouched() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let frame = blank_frame(320, 240);

    let result = detector.detect(&frame)?;

    assert!(result.counts.is_empty());
    assert!(result.detections.is_empty());
    assert_eq!(result.annotated, frame, "nothing should be drawn");
    Ok(())
}

#[test]
fn test_triangle() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let result = detector.detect(&triangle_frame())?;

    assert_eq!(result.counts, only(ShapeLabel::Triangle));
    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].features.vertex_count, 3);
    Ok(())
}

#[test]
fn test_square_and_rectangle_do_not_cross_over() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;

    let square = detector.detect(&square_frame())?;
    assert_eq!(square.counts, only(ShapeLabel::Square));
    assert_relative_eq!(square.detections[0].features.aspect_ratio, 1.0, epsilon = 0.03);

    let rectangle = detector.detect(&rectangle_frame())?;
    assert_eq!(rectangle.counts, only(ShapeLabel::Rectangle));
    assert_relative_eq!(rectangle.detections[0].features.aspect_ratio, 2.0, epsilon = 0.1);
    Ok(())
}

#[test]
fn test_filled_circle() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let result = detector.detect(&circle_frame())?;

    assert_eq!(result.counts, only(ShapeLabel::Circle));
    let features = &result.detections[0].features;
    assert!(features.circularity >= 0.85, "circularity {}", features.circularity);
    assert!(features.vertex_count >= 7);
    Ok(())
}

#[test]
fn test_mixed_frame_counts_each_shape_once() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let result = detector.detect(&mixed_frame())?;

    for label in ShapeLabel::ALL {
        assert_eq!(result.counts.get(label), 1, "{label}");
    }
    assert_eq!(result.counts.total(), 4);
    Ok(())
}

#[test]
fn test_annotation_uses_label_colors() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let frame = square_frame();
    let result = detector.detect(&frame)?;

    let blue = image::Rgb([0, 0, 255]);
    assert!(result.annotated.pixels().any(|p| *p == blue));
    // the input frame is not drawn on
    assert!(!frame.pixels().any(|p| *p == blue));
    Ok(())
}

#[test]
fn test_runs_are_idempotent() -> anyhow::Result<()> {
    let config = contour_only_config();
    let frame = mixed_frame();

    let first = detect_shapes(&frame, &config, None)?;
    let second = detect_shapes(&frame, &config, None)?;

    assert_eq!(first.counts, second.counts);
    assert_eq!(first.annotated, second.annotated);
    Ok(())
}

#[test]
fn test_accumulator_sums_frames() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let frames = [triangle_frame(), square_frame(), mixed_frame(), blank_frame(50, 50)];

    let mut running = ShapeCounts::new();
    let mut expected = ShapeCounts::new();
    for frame in &frames {
        let result = detector.detect_into(frame, &mut running)?;
        expected += &result.counts;
    }

    assert_eq!(running, expected);
    assert_eq!(running.triangle, 2);
    assert_eq!(running.square, 2);
    assert_eq!(running.total(), 6);
    Ok(())
}

#[test]
fn test_small_shapes_are_ignored() -> anyhow::Result<()> {
    let detector = ShapeDetector::new(contour_only_config())?;
    let mut frame = blank_frame(400, 400);
    imageproc::drawing::draw_filled_rect_mut(
        &mut frame,
        imageproc::rect::Rect::at(100, 100).of_size(12, 12),
        INK,
    );

    let result = detector.detect(&frame)?;
    assert!(result.counts.is_empty());
    Ok(())
}

#[test]
fn test_empty_frame_is_an_error() {
    let frame = image::RgbImage::new(0, 0);
    let err = detect_shapes(&frame, &contour_only_config(), None).unwrap_err();
    assert!(matches!(err, DetectError::EmptyFrame { .. }));
}
