use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::morphology::{grayscale_close, grayscale_dilate, Mask};
use imageproc::stats::percentile;

use crate::config::{EdgeConfig, EdgeThresholds};

/// Canny hysteresis thresholds for this image.
///
/// Both values are floored at 1 so a flat frame yields no edges, and `high` never drops below `low`.
pub fn edge_thresholds(blurred: &GrayImage, thresholds: EdgeThresholds) -> (f32, f32) {
    let (low, high) = match thresholds {
        EdgeThresholds::Adaptive { sigma } => {
            let median = percentile(blurred, 50) as f32;
            (
                ((1.0 - sigma) * median).max(0.0),
                ((1.0 + sigma) * median).min(255.0),
            )
        }
        EdgeThresholds::Fixed { low, high } => (low, high),
    };
    let low = low.max(1.0);
    (low, high.max(low))
}

/// Square structuring element of side `size`, anchored at its middle
pub fn square_mask(size: u8) -> Mask {
    let size = size.max(1);
    let shape = GrayImage::from_pixel(size as u32, size as u32, Luma([255]));
    Mask::from_image(&shape, size / 2, size / 2)
}

/// Canny edge map followed by closing and dilation
pub fn detect_edges(blurred: &GrayImage, config: &EdgeConfig) -> GrayImage {
    if blurred.width() == 0 || blurred.height() == 0 {
        return blurred.clone();
    }

    let (low, high) = edge_thresholds(blurred, config.thresholds);
    let mut edges = canny(blurred, low, high);

    let mask = square_mask(config.morph_kernel);
    for _ in 0..config.close_iterations {
        edges = grayscale_close(&edges, &mask);
    }
    for _ in 0..config.dilate_iterations {
        edges = grayscale_dilate(&edges, &mask);
    }
    edges
}

/// Fraction of foreground pixels in a binary edge map
pub fn edge_density(edges: &GrayImage) -> f32 {
    let total = edges.width() as u64 * edges.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let foreground = edges.pixels().filter(|p| p[0] > 0).count() as u64;
    foreground as f32 / total as f32
}
