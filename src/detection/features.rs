use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use crate::config::ContourConfig;
use crate::models::{Contour, ShapeFeatures};

/// Douglas-Peucker reduction of a closed outline.
///
/// The outline is cut at its first point and at the point farthest from it, and
/// both halves are reduced as open curves so the result does not depend on
/// where the border follower happened to start.
pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || !(epsilon > 0.0) {
        return points.to_vec();
    }

    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let dx = (p.x - start.x) as i64;
            let dy = (p.y - start.y) as i64;
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut polygon = approximate_polygon_dp(&points[..=far], epsilon, false);
    polygon.pop();

    let mut back: Vec<Point<i32>> = points[far..].to_vec();
    back.push(start);
    let mut tail = approximate_polygon_dp(&back, epsilon, false);
    tail.pop();

    polygon.extend(tail);
    polygon
}

/// Measure a contour and reduce it to a polygon.
///
/// Returns `None` when the area falls outside the accepted range for a frame of
/// `width` x `height`: below the minimum (inclusive bound) or above the maximum.
pub fn measure(
    contour: &Contour,
    width: u32,
    height: u32,
    config: &ContourConfig,
) -> Option<(ShapeFeatures, Vec<Point<i32>>)> {
    let area = contour.area();
    if area < config.min_area_for(width, height) {
        return None;
    }
    if let Some(max_area) = config.max_area_for(width, height) {
        if area > max_area {
            return None;
        }
    }

    let perimeter = contour.perimeter();
    let polygon = approximate_closed_polygon(&contour.points, config.approx_epsilon_ratio * perimeter);
    let bounding_box = contour.bounding_box();

    let features = ShapeFeatures {
        area,
        perimeter,
        vertex_count: polygon.len(),
        bounding_box,
        aspect_ratio: bounding_box.aspect_ratio(),
        circularity: crate::models::circularity(area, perimeter),
    };
    Some((features, polygon))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: i32, h: i32) -> Contour {
        Contour::new(vec![
            Point::new(0, 0),
            Point::new(w, 0),
            Point::new(w, h),
            Point::new(0, h),
        ])
    }

    fn circle(radius: f64, samples: usize) -> Vec<Point<i32>> {
        (0..samples)
            .map(|i| {
                let t = i as f64 / samples as f64 * std::f64::consts::TAU;
                Point::new(
                    (200.0 + radius * t.cos()).round() as i32,
                    (200.0 + radius * t.sin()).round() as i32,
                )
            })
            .collect()
    }

    #[test]
    fn min_area_is_inclusive() {
        let config = ContourConfig::default();
        // 25 x 20 = 500, exactly the floor
        assert!(measure(&rect(25, 20), 640, 480, &config).is_some());
        // 499 x 1 = 499, one below
        assert!(measure(&rect(499, 1), 640, 480, &config).is_none());
    }

    #[test]
    fn oversized_contours_are_rejected() {
        let config = ContourConfig::default();
        // quarter of a 100 x 100 frame is the largest allowed area
        assert!(measure(&rect(50, 50), 100, 100, &config).is_some());
        assert!(measure(&rect(51, 50), 100, 100, &config).is_none());

        let unbounded = ContourConfig { max_area_frame_ratio: None, ..config };
        assert!(measure(&rect(51, 50), 100, 100, &unbounded).is_some());
    }

    #[test]
    fn rectangle_keeps_four_corners() {
        let mut points = Vec::new();
        for x in 0..40 {
            points.push(Point::new(x, 0));
        }
        for y in 0..20 {
            points.push(Point::new(40, y));
        }
        for x in (1..=40).rev() {
            points.push(Point::new(x, 20));
        }
        for y in (1..=20).rev() {
            points.push(Point::new(0, y));
        }

        let polygon = approximate_closed_polygon(&points, 0.035 * 120.0);
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn circle_keeps_many_vertices() {
        let contour = Contour::new(circle(80.0, 360));
        let (features, polygon) = measure(&contour, 400, 400, &ContourConfig::default()).unwrap();
        assert!(polygon.len() >= 7, "got {} vertices", polygon.len());
        assert!(features.circularity > 0.85);
        assert!((features.aspect_ratio - 1.0).abs() < 0.05);
    }

    #[test]
    fn tiny_outlines_pass_through() {
        let points = vec![Point::new(0, 0), Point::new(1, 1)];
        assert_eq!(approximate_closed_polygon(&points, 1.0), points);
    }
}
