use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use shapecount::DetectorConfig;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Plain white frame
pub fn blank_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

/// Equilateral triangle with side 200 on a 400x400 frame
pub fn triangle_frame() -> RgbImage {
    let mut frame = blank_frame(400, 400);
    draw_triangle(&mut frame, 200, 80, 200);
    frame
}

/// 140x140 square on a 400x400 frame
pub fn square_frame() -> RgbImage {
    let mut frame = blank_frame(400, 400);
    draw_filled_rect_mut(&mut frame, Rect::at(130, 130).of_size(140, 140), INK);
    frame
}

/// 160x80 rectangle (2:1) on a 400x400 frame
pub fn rectangle_frame() -> RgbImage {
    let mut frame = blank_frame(400, 400);
    draw_filled_rect_mut(&mut frame, Rect::at(120, 160).of_size(160, 80), INK);
    frame
}

/// Filled circle of radius 80 on a 400x400 frame
pub fn circle_frame() -> RgbImage {
    let mut frame = blank_frame(400, 400);
    draw_filled_circle_mut(&mut frame, (200, 200), 80, INK);
    frame
}

/// Filled disk of the given radius centered on a 400x400 frame
pub fn disk_frame(radius: i32) -> RgbImage {
    let mut frame = blank_frame(400, 400);
    draw_filled_circle_mut(&mut frame, (200, 200), radius, INK);
    frame
}

/// One of each shape on a 640x480 frame
pub fn mixed_frame() -> RgbImage {
    let mut frame = blank_frame(640, 480);
    draw_triangle(&mut frame, 110, 50, 180);
    draw_filled_rect_mut(&mut frame, Rect::at(260, 60).of_size(120, 120), INK);
    draw_filled_rect_mut(&mut frame, Rect::at(440, 80).of_size(160, 80), INK);
    draw_filled_circle_mut(&mut frame, (200, 360), 70, INK);
    frame
}

/// Thin dark ring of radius 50 on a large frame; its edge map stays sparse
pub fn circle_outline_frame() -> RgbImage {
    let mut frame = blank_frame(600, 600);
    draw_filled_circle_mut(&mut frame, (300, 300), 52, INK);
    draw_filled_circle_mut(&mut frame, (300, 300), 48, WHITE);
    frame
}

/// Vertical stripes four pixels wide; nearly every pixel is near an edge
pub fn stripes_frame() -> RgbImage {
    RgbImage::from_fn(200, 200, |x, _| if (x / 4) % 2 == 0 { INK } else { WHITE })
}

/// Defaults with the circle fallback switched off, so counts come from contours only
pub fn contour_only_config() -> DetectorConfig {
    let mut config = DetectorConfig::default();
    config.hough.enabled = false;
    config
}

/// Upward equilateral triangle with the apex at (`apex_x`, `apex_y`)
fn draw_triangle(frame: &mut RgbImage, apex_x: i32, apex_y: i32, side: i32) {
    let height = (side as f64 * 3f64.sqrt() / 2.0).round() as i32;
    let polygon = [
        Point::new(apex_x, apex_y),
        Point::new(apex_x + side / 2, apex_y + height),
        Point::new(apex_x - side / 2, apex_y + height),
    ];
    draw_polygon_mut(frame, &polygon, INK);
}
