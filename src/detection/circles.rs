use std::f32::consts::TAU;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::suppress::suppress_non_maximum;
use tracing::debug;

use crate::config::HoughConfig;
use crate::models::HoughCircle;

type Accumulator = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Whether the circle fallback applies to an edge map of this density
pub fn should_run(edge_density: f32, config: &HoughConfig) -> bool {
    config.enabled && edge_density < config.max_edge_density
}

/// Find circles with a gradient-directed Hough transform.
///
/// Every edge pixel votes for centers along its gradient line, in both directions,
/// at each radius in range. Accumulator peaks become center candidates. Each one is
/// refined to the nearby center and radius whose circumference lies best on the
/// edge map and is accepted if that support reaches `min_edge_support`.
pub fn detect_circles(blurred: &GrayImage, edges: &GrayImage, config: &HoughConfig) -> Vec<HoughCircle> {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 || blurred.dimensions() != edges.dimensions() {
        return Vec::new();
    }

    let accumulator = vote(blurred, edges, config);
    let candidates = center_candidates(&accumulator, config);
    debug!("Hough fallback: {} center candidates", candidates.len());

    let mut accepted: Vec<HoughCircle> = Vec::new();
    for (center_x, center_y, votes) in candidates {
        let far_enough = accepted.iter().all(|c| {
            (c.center_x - center_x).hypot(c.center_y - center_y) >= config.min_center_distance
        });
        if !far_enough {
            continue;
        }

        let Some((center_x, center_y, radius, support)) =
            fit_circle(edges, center_x, center_y, config)
        else {
            continue;
        };
        if support >= config.min_edge_support {
            accepted.push(HoughCircle {
                center_x,
                center_y,
                radius,
                votes,
                support,
            });
        }
    }
    accepted
}

fn vote(blurred: &GrayImage, edges: &GrayImage, config: &HoughConfig) -> Accumulator {
    let res = config.resolution.max(1);
    let (width, height) = edges.dimensions();
    let mut accumulator = Accumulator::new(width.div_ceil(res), height.div_ceil(res));

    let gx = horizontal_sobel(blurred);
    let gy = vertical_sobel(blurred);

    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        let dx = gx.get_pixel(x, y)[0] as f32;
        let dy = gy.get_pixel(x, y)[0] as f32;
        let magnitude = dx.hypot(dy);
        if magnitude < f32::EPSILON {
            continue;
        }
        let (ux, uy) = (dx / magnitude, dy / magnitude);

        for r in config.min_radius..=config.max_radius {
            for sign in [-1.0f32, 1.0] {
                let cx = x as f32 + sign * r as f32 * ux;
                let cy = y as f32 + sign * r as f32 * uy;
                if cx < 0.0 || cy < 0.0 || cx >= width as f32 || cy >= height as f32 {
                    continue;
                }
                accumulator.get_pixel_mut(cx as u32 / res, cy as u32 / res)[0] += 1;
            }
        }
    }
    accumulator
}

/// Local accumulator maxima above the vote threshold, strongest first, in pixel coordinates
fn center_candidates(accumulator: &Accumulator, config: &HoughConfig) -> Vec<(f32, f32, u32)> {
    let res = config.resolution.max(1);
    let radius = (config.min_center_distance / res as f32 / 2.0).max(1.0) as u32;
    let threshold = config.accumulator_threshold.max(1);
    let offset = (res - 1) as f32 / 2.0;

    let peaks = suppress_non_maximum(accumulator, radius);
    let mut candidates: Vec<(f32, f32, u32)> = peaks
        .enumerate_pixels()
        .filter(|(_, _, votes)| votes[0] >= threshold)
        .map(|(x, y, votes)| ((x * res) as f32 + offset, (y * res) as f32 + offset, votes[0]))
        .collect();
    candidates.sort_by(|a, b| b.2.cmp(&a.2));
    candidates
}

/// Best center within one accumulator cell of a candidate, nearest offsets winning ties
fn fit_circle(edges: &GrayImage, cx: f32, cy: f32, config: &HoughConfig) -> Option<(f32, f32, f32, f32)> {
    let reach = config.resolution.max(1) as i32;
    let mut offsets: Vec<(i32, i32)> = (-reach..=reach)
        .flat_map(|oy| (-reach..=reach).map(move |ox| (ox, oy)))
        .collect();
    offsets.sort_by_key(|&(ox, oy)| ox * ox + oy * oy);

    let mut best: Option<(f32, f32, f32, f32)> = None;
    for (ox, oy) in offsets {
        let (x, y) = (cx + ox as f32, cy + oy as f32);
        let Some((radius, support)) = best_radius(edges, x, y, config) else {
            continue;
        };
        if best.is_none_or(|(_, _, _, s)| support > s) {
            best = Some((x, y, radius, support));
        }
    }
    best
}

/// Radius with the best edge support, taking the middle of a run of equally good radii
fn best_radius(edges: &GrayImage, cx: f32, cy: f32, config: &HoughConfig) -> Option<(f32, f32)> {
    let mut best: Option<(u32, u32, f32)> = None;
    for r in config.min_radius..=config.max_radius {
        let support = edge_support(edges, cx, cy, r as f32, config.support_band);
        best = match best {
            Some((first, last, s)) if support == s && r == last + 1 => Some((first, r, s)),
            Some((_, _, s)) if support <= s => best,
            _ => Some((r, r, support)),
        };
    }
    best.map(|(first, last, support)| ((first + last) as f32 / 2.0, support))
}

/// Fraction of points sampled on a circle that fall on edge pixels.
///
/// A sample hits when any point within `band` pixels of it along the radius is an
/// edge. Samples outside the image count as misses.
pub fn edge_support(edges: &GrayImage, cx: f32, cy: f32, radius: f32, band: u32) -> f32 {
    let samples = ((TAU * radius).ceil() as usize).max(32);
    let band = band as i32;
    let hits = (0..samples)
        .filter(|&i| {
            let t = i as f32 / samples as f32 * TAU;
            let (sin, cos) = t.sin_cos();
            (-band..=band).any(|d| {
                let r = radius + d as f32;
                is_edge(edges, (cx + r * cos).round(), (cy + r * sin).round())
            })
        })
        .count();
    hits as f32 / samples as f32
}

fn is_edge(edges: &GrayImage, x: f32, y: f32) -> bool {
    let (width, height) = edges.dimensions();
    x >= 0.0
        && y >= 0.0
        && (x as u32) < width
        && (y as u32) < height
        && edges.get_pixel(x as u32, y as u32)[0] > 0
}
