use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};

use crate::config::BlurKind;

/// Convert frame to grayscale
pub fn to_grayscale(frame: &RgbImage) -> GrayImage {
    image::DynamicImage::ImageRgb8(frame.clone()).to_luma8()
}

/// Apply the configured noise-reduction filter
pub fn apply_blur(img: &GrayImage, blur: BlurKind) -> GrayImage {
    match blur {
        BlurKind::Gaussian { sigma } => gaussian_blur_f32(img, sigma),
        BlurKind::Median { radius } => median_filter(img, radius, radius),
    }
}

/// Contrast limited adaptive histogram equalization.
///
/// The image is split into `tile_grid` x `tile_grid` tiles. Each tile gets its
/// own equalization table with histogram bins clipped at
/// `clip_limit * tile_pixels / 256`; the clipped excess is spread over all
/// bins. Every output pixel blends the tables of its four nearest tiles.
pub fn equalize_local(img: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let grid = tile_grid.max(1);
    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(img, (x0, y0, x1, y1), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        let value = pixel[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let (tx0, tx1, ax) = neighbours(fx, tiles_x);
        let (ty0, ty1, ay) = neighbours(fy, tiles_y);

        let top = lut_at(tx0, ty0)[value] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[value] as f32 * ax;
        let bottom =
            lut_at(tx0, ty1)[value] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[value] as f32 * ax;
        let blended = top * (1.0 - ay) + bottom * ay;

        out.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
    }

    out
}

/// Lower and upper tile index around a fractional tile coordinate, plus the blend weight.
fn neighbours(f: f32, tiles: u32) -> (u32, u32, f32) {
    let last = tiles as i64 - 1;
    let base = f.floor();
    let weight = f - base;
    let lo = (base as i64).clamp(0, last) as u32;
    let hi = (base as i64 + 1).clamp(0, last) as u32;
    (lo, hi, weight)
}

fn tile_lut(img: &GrayImage, (x0, y0, x1, y1): (u32, u32, u32, u32), clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let pixels = (x1 - x0) * (y1 - y0);

    let limit = ((clip_limit * pixels as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let batch = excess / 256;
    let residual = excess - batch * 256;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (256 / residual).max(1) as usize;
        for bin in hist.iter_mut().step_by(step).take(residual as usize) {
            *bin += 1;
        }
    }

    let scale = 255.0 / pixels as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (value, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
