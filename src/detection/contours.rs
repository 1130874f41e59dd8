use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::models::Contour;

/// Outer borders of the top-level foreground regions in a binary edge map.
///
/// Hole borders and anything nested inside a hole are skipped. Straight runs are
/// reduced to their end points and outlines with fewer than three points are dropped.
pub fn find_external_contours(edges: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| compress_collinear(&c.points))
        .filter(|points| points.len() >= 3)
        .map(Contour::new)
        .collect()
}

/// Drop every point that continues the step direction of its predecessor
pub fn compress_collinear(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());

    points
        .iter()
        .enumerate()
        .filter(|&(i, &p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, p) != step(p, next)
        })
        .map(|(_, &p)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }

    fn sorted(mut points: Vec<Point<i32>>) -> Vec<(i32, i32)> {
        points.sort_by_key(|p| (p.x, p.y));
        points.into_iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn filled_square_reduces_to_corners() {
        let mut img = GrayImage::new(12, 12);
        fill(&mut img, 2, 2, 8, 8, 255);

        let contours = find_external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            sorted(contours[0].points.clone()),
            vec![(2, 2), (2, 8), (8, 2), (8, 8)]
        );
    }

    #[test]
    fn holes_and_nested_regions_are_ignored() {
        let mut img = GrayImage::new(30, 30);
        fill(&mut img, 2, 2, 27, 27, 255);
        fill(&mut img, 6, 6, 23, 23, 0);
        // island inside the hole
        fill(&mut img, 12, 12, 17, 17, 255);

        let contours = find_external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box().width, 26);
    }

    #[test]
    fn single_pixels_are_dropped() {
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(4, 4, Luma([255]));
        assert!(find_external_contours(&img).is_empty());
    }

    #[test]
    fn diagonal_runs_collapse() {
        let points: Vec<_> = [(0, 0), (1, 1), (2, 2), (3, 3), (3, 0), (2, 0), (1, 0)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        assert_eq!(
            compress_collinear(&points),
            vec![Point::new(0, 0), Point::new(3, 3), Point::new(3, 0)]
        );
    }
}
