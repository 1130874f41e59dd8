use ab_glyph::PxScale;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::detection::annotate::label_font;
use crate::error::Result;
use crate::models::{ShapeCounts, ShapeLabel};

/// Counts of one run, as printed by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountsReport {
    pub session_id: Uuid,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub frames: u64,
    pub counts: ShapeCounts,
}

impl CountsReport {
    pub fn new(frames: u64, counts: ShapeCounts) -> Result<Self> {
        Ok(Self {
            session_id: Uuid::new_v4(),
            generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
            frames,
            counts,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const MARGIN: u32 = 28;

fn bar_color(label: ShapeLabel) -> Rgb<u8> {
    match label {
        ShapeLabel::Triangle => Rgb([255, 215, 0]),
        ShapeLabel::Square => Rgb([0, 0, 255]),
        ShapeLabel::Rectangle => Rgb([0, 128, 0]),
        ShapeLabel::Circle => Rgb([255, 0, 0]),
    }
}

/// Bar chart of the four counts, names below the bars and values above
pub fn render_histogram(counts: &ShapeCounts, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    if width < 8 || height <= 2 * MARGIN {
        return canvas;
    }

    let plot_top = MARGIN;
    let baseline = height - MARGIN;
    let plot_height = baseline - plot_top;
    let slot = width / ShapeLabel::ALL.len() as u32;
    let bar_width = (slot * 3 / 5).max(1);
    let peak = counts.iter().map(|(_, n)| n).max().unwrap_or(0).max(1);

    draw_line_segment_mut(
        &mut canvas,
        (0.0, baseline as f32),
        (width as f32 - 1.0, baseline as f32),
        INK,
    );

    let font = label_font();
    let scale = PxScale::from(16.0);

    for (i, (label, value)) in counts.iter().enumerate() {
        let bar_height = (value as u64 * plot_height as u64 / peak as u64) as u32;
        let left = i as u32 * slot + (slot - bar_width) / 2;
        let top = baseline - bar_height;
        if bar_height > 0 {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(left as i32, top as i32).of_size(bar_width, bar_height),
                bar_color(label),
            );
        }

        let Some(font) = font else {
            continue;
        };
        let centre = (left + bar_width / 2) as i32;

        let name = label.name();
        let (name_w, _) = text_size(scale, font, name);
        draw_text_mut(&mut canvas, INK, centre - name_w as i32 / 2, baseline as i32 + 6, scale, font, name);

        let text = value.to_string();
        let (text_w, text_h) = text_size(scale, font, &text);
        let y = (top as i32 - text_h as i32 - 4).max(0);
        draw_text_mut(&mut canvas, INK, centre - text_w as i32 / 2, y, scale, font, &text);
    }

    canvas
}
