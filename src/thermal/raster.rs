//! Receipt rasterizer
//!
//! Paints a [`ReceiptLayout`] onto an 8-bit grayscale canvas with TrueType
//! fonts, then thresholds it into the 1-bit bitmap thermal printers take.

use super::layout::{Align, Baseline, DrawOp, Ink, ReceiptLayout, TextOp};
use super::ThermalError;
use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

const WHITE: u8 = 255;
const BLACK: u8 = 0;

/// Regular face plus an optional bold face
pub struct FontSet {
    regular: FontVec,
    bold: Option<FontVec>,
}

impl FontSet {
    pub fn load(regular: &Path, bold: Option<&Path>) -> Result<Self, ThermalError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| ThermalError::FontRead {
                path: path.to_path_buf(),
                source,
            })
        };

        let regular_bytes = read(regular)?;
        let bold_bytes = bold.map(read).transpose()?;
        debug!(regular = %regular.display(), bold = bold.is_some(), "Loaded receipt fonts");
        Self::from_bytes(regular_bytes, bold_bytes)
    }

    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self, ThermalError> {
        let parse = |bytes: Vec<u8>| {
            FontVec::try_from_vec(bytes).map_err(|e| ThermalError::InvalidFont(e.to_string()))
        };
        Ok(Self {
            regular: parse(regular)?,
            bold: bold.map(parse).transpose()?,
        })
    }

    pub fn has_bold(&self) -> bool {
        self.bold.is_some()
    }

    fn face(&self, bold: bool) -> &FontVec {
        match (&self.bold, bold) {
            (Some(face), true) => face,
            _ => &self.regular,
        }
    }

    /// Advance width of `text` in pixels
    pub fn measure(&self, text: &str, size: f32, bold: bool) -> f32 {
        let scaled = self.face(bold).as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut previous: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }
}

/// Grayscale drawing surface
pub struct Canvas {
    image: GrayImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([WHITE])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    fn put(&mut self, x: i64, y: i64, value: u8) {
        if x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height() {
            self.image.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    /// Blend `ink` over the current pixel by `coverage` (0..=1)
    fn blend(&mut self, x: i64, y: i64, ink: u8, coverage: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let current = pixel.0[0] as f32;
        let mixed = current + (ink as f32 - current) * coverage.clamp(0.0, 1.0);
        pixel.0[0] = mixed.round() as u8;
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, ink: Ink) {
        let value = ink_value(ink);
        let (x0, y0) = (x.round() as i64, y.round() as i64);
        let (x1, y1) = ((x + w).round() as i64, (y + h).round() as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                self.put(px, py, value);
            }
        }
    }

    /// One pixel wide outline
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.hline(x, x + w, y, None);
        self.hline(x, x + w, y + h - 1.0, None);
        self.fill_rect(x, y, 1.0, h, Ink::Black);
        self.fill_rect(x + w - 1.0, y, 1.0, h, Ink::Black);
    }

    pub fn hline(&mut self, x1: f32, x2: f32, y: f32, dash: Option<(f32, f32)>) {
        let row = y.floor() as i64;
        let (start, end) = (x1.round() as i64, x2.round() as i64);
        for px in start..end {
            let on = match dash {
                Some((dash, gap)) => {
                    let period = (dash + gap).max(1.0);
                    ((px - start) as f32 % period) < dash
                }
                None => true,
            };
            if on {
                self.put(px, row, BLACK);
            }
        }
    }

    /// Blit a square module matrix at integer scale
    pub fn matrix(&mut self, x: f32, y: f32, scale: u32, size: usize, modules: &[bool]) {
        let (ox, oy) = (x.round() as i64, y.round() as i64);
        let scale = scale.max(1) as i64;
        for (index, dark) in modules.iter().enumerate() {
            if !dark {
                continue;
            }
            let (mx, my) = ((index % size) as i64, (index / size) as i64);
            for dy in 0..scale {
                for dx in 0..scale {
                    self.put(ox + mx * scale + dx, oy + my * scale + dy, BLACK);
                }
            }
        }
    }

    pub fn text(&mut self, op: &TextOp, fonts: &FontSet) {
        let face = fonts.face(op.bold);
        let scale = PxScale::from(op.size);
        let scaled = face.as_scaled(scale);

        let width = fonts.measure(&op.text, op.size, op.bold);
        let left = match op.align {
            Align::Left => op.x,
            Align::Right => op.x - width,
            Align::Center => op.x - width / 2.0,
        };
        let baseline = match op.baseline {
            Baseline::Alphabetic => op.y,
            Baseline::Middle => op.y + (scaled.ascent() + scaled.descent()) / 2.0,
        };

        // without a bold face, double-strike one pixel to the right
        let strikes: &[f32] = if op.bold && !fonts.has_bold() {
            &[0.0, 1.0]
        } else {
            &[0.0]
        };
        let ink = ink_value(op.ink);

        for offset in strikes {
            let mut caret = left + offset;
            let mut previous: Option<GlyphId> = None;
            for c in op.text.chars() {
                let id = scaled.glyph_id(c);
                if let Some(prev) = previous {
                    caret += scaled.kern(prev, id);
                }
                let glyph = id.with_scale_and_position(scale, point(caret, baseline));
                caret += scaled.h_advance(id);
                previous = Some(id);

                if let Some(outlined) = face.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    let (bx, by) = (bounds.min.x as i64, bounds.min.y as i64);
                    outlined.draw(|gx, gy, coverage| {
                        self.blend(bx + gx as i64, by + gy as i64, ink, coverage);
                    });
                }
            }
        }
    }
}

fn ink_value(ink: Ink) -> u8 {
    match ink {
        Ink::Black => BLACK,
        Ink::White => WHITE,
    }
}

/// Paint every operation of a layout
pub fn render(layout: &ReceiptLayout, fonts: &FontSet) -> GrayImage {
    let mut canvas = Canvas::new(layout.width, layout.height);
    for op in &layout.ops {
        match op {
            DrawOp::Text(text) => canvas.text(text, fonts),
            DrawOp::HLine { x1, x2, y, dash } => canvas.hline(*x1, *x2, *y, *dash),
            DrawOp::StrokeRect { x, y, w, h } => canvas.stroke_rect(*x, *y, *w, *h),
            DrawOp::FillRect { x, y, w, h, ink } => canvas.fill_rect(*x, *y, *w, *h, *ink),
            DrawOp::Matrix {
                x,
                y,
                scale,
                size,
                modules,
            } => canvas.matrix(*x, *y, *scale, *size, modules),
        }
    }
    canvas.into_image()
}

pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, ThermalError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Packed 1-bit image, rows MSB first, 1 = black dot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MonoBitmap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.width.div_ceil(8) as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packed bytes for rows `start..end`
    pub fn rows(&self, start: u32, end: u32) -> &[u8] {
        let stride = self.bytes_per_row();
        let end = end.min(self.height);
        &self.data[start as usize * stride..end as usize * stride]
    }

    pub fn is_black(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[y as usize * self.bytes_per_row() + (x / 8) as usize];
        byte & (0x80 >> (x % 8)) != 0
    }
}

/// Pixels darker than `threshold` become black dots
pub fn to_monochrome(image: &GrayImage, threshold: u8) -> MonoBitmap {
    let (width, height) = image.dimensions();
    let stride = width.div_ceil(8) as usize;
    let mut data = vec![0u8; stride * height as usize];

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[0] < threshold {
            data[y as usize * stride + (x / 8) as usize] |= 0x80 >> (x % 8);
        }
    }

    MonoBitmap {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_starts_white() {
        let canvas = Canvas::new(16, 4);
        let mono = to_monochrome(&canvas.into_image(), 128);
        assert!(mono.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_fill_rect_and_monochrome_packing() {
        let mut canvas = Canvas::new(12, 3);
        canvas.fill_rect(0.0, 1.0, 9.0, 1.0, Ink::Black);
        let mono = to_monochrome(&canvas.into_image(), 128);

        assert_eq!(mono.bytes_per_row(), 2);
        assert_eq!(mono.rows(0, 1), &[0x00, 0x00]);
        assert_eq!(mono.rows(1, 2), &[0xFF, 0x80]);
        assert!(mono.is_black(8, 1));
        assert!(!mono.is_black(9, 1));
        assert!(!mono.is_black(100, 100));
    }

    #[test]
    fn test_white_fill_over_black() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_rect(0.0, 0.0, 10.0, 10.0, Ink::Black);
        canvas.fill_rect(2.0, 2.0, 6.0, 6.0, Ink::White);
        let mono = to_monochrome(&canvas.into_image(), 128);

        assert!(mono.is_black(1, 1));
        assert!(!mono.is_black(5, 5));
    }

    #[test]
    fn test_dashed_line() {
        let mut canvas = Canvas::new(16, 2);
        canvas.hline(0.0, 16.0, 0.0, Some((4.0, 4.0)));
        let mono = to_monochrome(&canvas.into_image(), 128);

        assert_eq!(mono.rows(0, 1), &[0xF0, 0xF0]);
    }

    #[test]
    fn test_stroke_rect_outline_only() {
        let mut canvas = Canvas::new(8, 8);
        canvas.stroke_rect(0.0, 0.0, 8.0, 8.0);
        let mono = to_monochrome(&canvas.into_image(), 128);

        assert!(mono.is_black(0, 0));
        assert!(mono.is_black(7, 7));
        assert!(mono.is_black(0, 4));
        assert!(mono.is_black(7, 4));
        assert!(!mono.is_black(4, 4));
    }

    #[test]
    fn test_matrix_blit_scales_modules() {
        let mut canvas = Canvas::new(8, 8);
        // 2x2 matrix, dark on the diagonal
        canvas.matrix(2.0, 2.0, 2, 2, &[true, false, false, true]);
        let mono = to_monochrome(&canvas.into_image(), 128);

        assert!(mono.is_black(2, 2) && mono.is_black(3, 3));
        assert!(!mono.is_black(4, 2));
        assert!(mono.is_black(4, 4) && mono.is_black(5, 5));
        assert!(!mono.is_black(6, 6));
    }

    #[test]
    fn test_drawing_is_clipped() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(-10.0, -10.0, 100.0, 100.0, Ink::Black);
        canvas.hline(-5.0, 50.0, 10.0, None);
        let mono = to_monochrome(&canvas.into_image(), 128);
        assert!(mono.is_black(3, 3));
    }

    #[test]
    fn test_threshold_boundary() {
        let mut image = GrayImage::from_pixel(2, 1, Luma([WHITE]));
        image.put_pixel(0, 0, Luma([127]));
        image.put_pixel(1, 0, Luma([128]));
        let mono = to_monochrome(&image, 128);
        assert!(mono.is_black(0, 0));
        assert!(!mono.is_black(1, 0));
    }

    #[test]
    fn test_png_encoding() {
        let png = encode_png(&Canvas::new(8, 8).into_image()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_invalid_font_bytes_rejected() {
        let result = FontSet::from_bytes(b"not a font".to_vec(), None);
        assert!(matches!(result, Err(ThermalError::InvalidFont(_))));
    }

    #[test]
    fn test_missing_font_file() {
        let result = FontSet::load(Path::new("/nonexistent/receipt.ttf"), None);
        assert!(matches!(result, Err(ThermalError::FontRead { .. })));
    }
}
