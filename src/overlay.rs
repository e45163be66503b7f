use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};

use crate::analytics::{HeatmapAccumulator, ZoneRegion};
use crate::detection::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const ZONE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LINE_THICKNESS: i32 = 2;
/// Pixels per font cell.
const LABEL_SCALE: i32 = 2;
const GLYPH_ADVANCE: i32 = 4 * LABEL_SCALE;
const LABEL_HEIGHT: i32 = 5 * LABEL_SCALE;

/// 3x5 glyphs for the track label alphabet. Bit 2 is the leftmost column.
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        _ => [0; 5],
    }
}

/// Draws detection boxes and the zone, then alpha-blends the heatmap with
/// `heatmap_weight` (the frame keeps `1 - heatmap_weight`).
pub fn compose_overlay(
    frame: &mut RgbImage,
    detections: &[Detection],
    zone: &ZoneRegion,
    heatmap: &HeatmapAccumulator,
    heatmap_weight: f32,
) {
    draw_detections(frame, detections);
    draw_zone(frame, zone);
    blend_heatmap(frame, heatmap, heatmap_weight);
}

/// Boxes every detection and tags tracked ones with `ID <track id>`.
pub fn draw_detections(frame: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let bbox = &detection.bbox;
        let (x, y) = (bbox.x1 as i32, bbox.y1 as i32);
        draw_rect(
            frame,
            x,
            y,
            bbox.width() as u32,
            bbox.height() as u32,
            BOX_COLOR,
        );
        if let Some(track_id) = detection.track_id {
            // Above the box, or just inside it when the box touches the top edge.
            let label_y = if y - LABEL_HEIGHT - LABEL_SCALE >= 0 {
                y - LABEL_HEIGHT - LABEL_SCALE
            } else {
                y + LINE_THICKNESS + 1
            };
            let label_x = if label_y > y { x + LINE_THICKNESS + 1 } else { x };
            draw_label(frame, label_x, label_y, &format!("ID {track_id}"), BOX_COLOR);
        }
    }
}

fn draw_label(frame: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        let origin_x = x + i as i32 * GLYPH_ADVANCE;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let cell = Rect::at(origin_x + col * LABEL_SCALE, y + row as i32 * LABEL_SCALE)
                    .of_size(LABEL_SCALE as u32, LABEL_SCALE as u32);
                draw_filled_rect_mut(frame, cell, color);
            }
        }
    }
}

pub fn draw_zone(frame: &mut RgbImage, zone: &ZoneRegion) {
    draw_rect(frame, zone.x1, zone.y1, zone.width(), zone.height(), ZONE_COLOR);
}

fn draw_rect(frame: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    for inset in 0..LINE_THICKNESS {
        let w = width.saturating_sub(2 * inset as u32);
        let h = height.saturating_sub(2 * inset as u32);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(w, h);
        draw_hollow_rect_mut(frame, rect, color);
    }
}

/// No-op while the heatmap is uninitialized or all zero.
pub fn blend_heatmap(frame: &mut RgbImage, heatmap: &HeatmapAccumulator, weight: f32) {
    let Some(colored) = heatmap.render() else {
        return;
    };
    let weight = weight.clamp(0.0, 1.0);
    let keep = 1.0 - weight;
    let width = frame.width().min(colored.width());
    let height = frame.height().min(colored.height());
    for y in 0..height {
        for x in 0..width {
            let heat = colored.get_pixel(x, y);
            let pixel = frame.get_pixel_mut(x, y);
            for c in 0..3 {
                let mixed = pixel[c] as f32 * keep + heat[c] as f32 * weight;
                pixel[c] = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    frame
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .context("failed to encode frame as JPEG")?;
    Ok(buffer.into_inner())
}
