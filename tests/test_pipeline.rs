//! The composable pipeline against the direct detector, plus debug output.

mod common;

use std::sync::Arc;

use shapecount::config::EdgeConfig;
use shapecount::detection::steps::EdgeDetectionStep;
use shapecount::{build_standard_pipeline, DetectorConfig, Pipeline, ShapeDetector};

use common::*;

const STEP_DIRS: [&str; 9] = [
    "00_input",
    "01_grayscale_conversion",
    "02_contrast_equalization",
    "03_gaussian_blur",
    "04_edge_detection",
    "05_contour_detection",
    "06_shape_classification",
    "07_circle_fallback",
    "08_annotation",
];

#[test]
fn test_pipeline_matches_detector() -> anyhow::Result<()> {
    for config in [DetectorConfig::default(), contour_only_config()] {
        let detector = ShapeDetector::new(config)?;
        for frame in [mixed_frame(), circle_outline_frame(), blank_frame(64, 64)] {
            let direct = detector.detect(&frame)?;
            let piped = detector.pipeline().run(&frame)?;

            assert_eq!(piped.counts, direct.counts);
            assert_eq!(piped.detections.len(), direct.detections.len());
            assert_eq!(piped.hough_circles.len(), direct.hough_circles.len());
            assert_eq!(piped.fallback_ran, direct.fallback_ran);
            assert_eq!(piped.annotated, direct.annotated);
        }
    }
    Ok(())
}

#[test]
fn test_debug_output_has_one_dir_per_step() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");

    let pipeline = build_standard_pipeline(&contour_only_config()).with_debug(debug_dir.clone())?;
    let result = pipeline.run(&square_frame())?;
    assert_eq!(result.counts.square, 1);

    for name in STEP_DIRS {
        let path = debug_dir.join(name).join("01.png");
        assert!(path.exists(), "missing {}", path.display());
    }
    assert_eq!(std::fs::read_dir(&debug_dir)?.count(), STEP_DIRS.len());

    let annotated = image::open(debug_dir.join("08_annotation/01.png"))?.to_rgb8();
    assert_eq!(annotated, result.annotated);
    Ok(())
}

#[test]
fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.txt"), "x")?;

    let err = Pipeline::new().with_debug(dir.path().to_path_buf()).err();
    assert!(err.is_some());
    Ok(())
}

#[test]
fn test_run_partial_stops_early() -> anyhow::Result<()> {
    let pipeline = build_standard_pipeline(&DetectorConfig::default());
    assert_eq!(pipeline.step_names().len(), 8);

    let data = pipeline.run_partial(&square_frame(), 4)?;
    assert!(data.edges.is_some());
    assert!(data.edge_density > 0.0);
    assert!(data.contours.is_empty());
    assert!(data.annotated.is_none());

    let result = data.into_result();
    assert!(result.counts.is_empty());
    assert_eq!(result.annotated, square_frame());
    Ok(())
}

#[test]
fn test_missing_prerequisite_step_is_reported() {
    let pipeline = Pipeline::new().add_step(Arc::new(EdgeDetectionStep {
        config: EdgeConfig::default(),
    }));

    let err = pipeline.run(&square_frame()).unwrap_err();
    assert!(format!("{err:#}").contains("grayscale"));
}

#[test]
fn test_empty_frame_is_rejected() {
    let pipeline = build_standard_pipeline(&DetectorConfig::default());
    assert!(pipeline.run(&image::RgbImage::new(10, 0)).is_err());
}

#[test]
fn test_detector_debug_views_match_pipeline_stages() -> anyhow::Result<()> {
    let config = contour_only_config();
    let detector = ShapeDetector::new(config.clone())?;
    assert_eq!(detector.config(), &config);

    let frame = mixed_frame();
    let pipeline = detector.pipeline();

    let preprocessed = detector.preprocessed(&frame)?;
    assert_eq!(Some(preprocessed), pipeline.run_partial(&frame, 3)?.gray);

    let edge_map = detector.edge_map(&frame)?;
    assert_eq!(Some(edge_map), pipeline.run_partial(&frame, 4)?.edges);

    let contours = detector.get_contours(&frame)?;
    assert!(contours.len() >= 4, "{} contours", contours.len());
    assert_eq!(contours.len(), pipeline.run_partial(&frame, 5)?.contours.len());

    assert!(detector.preprocessed(&image::RgbImage::new(0, 5)).is_err());
    Ok(())
}
