//! ASCII-art mosaic rendering with a built-in bitmap font

use crate::error::Result;
use crate::types::PixelGrid;
use crate::utils::filters::{resampling_filter, resize};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};

/// Brightness ramp, darkest glyph first
pub const ASCII_RAMP: &str = "@%#*+=-:. ";

/// Glyph cell size in pixels (5x7 glyph plus one pixel of spacing)
pub const CELL_WIDTH: u32 = 6;
pub const CELL_HEIGHT: u32 = 8;

/// Blank margin around the character grid
pub const CANVAS_PADDING: u32 = 5;

/// 5x7 bitmaps, one row per byte, bit 4 is the leftmost column
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '@' => [0b01110, 0b10001, 0b10111, 0b10101, 0b10111, 0b10000, 0b01110],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '*' => [0b00000, 0b00100, 0b10101, 0b01110, 0b10101, 0b00100, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        _ => [0; 7],
    }
}

/// Map a brightness value onto the ramp
#[must_use]
pub fn ramp_char(value: u8) -> char {
    let ramp: Vec<char> = ASCII_RAMP.chars().collect();
    let scale = (256 / ramp.len()).max(1);
    ramp[(usize::from(value) / scale).min(ramp.len() - 1)]
}

/// Character rows for `columns` columns, keeping the picture's aspect ratio
/// once glyph cells are taller than they are wide
#[must_use]
pub fn grid_rows(width: u32, height: u32, columns: u32) -> u32 {
    if width == 0 {
        return 1;
    }
    let aspect = CELL_HEIGHT as f32 / CELL_WIDTH as f32;
    ((height as f32 * columns as f32 * aspect) / width as f32).max(1.0) as u32
}

/// Text lines for the image, one ramp character per cell
///
/// # Errors
/// Propagates resize failures.
pub fn ascii_lines(grid: &PixelGrid, columns: u32) -> Result<Vec<String>> {
    let (w, h) = grid.dimensions();
    let rows = grid_rows(w, h, columns);
    let gray = PixelGrid::from_gray_image(&grid.to_gray_image());
    let small = resize(&gray, columns, rows, FilterType::Triangle)?;

    Ok((0..rows as usize)
        .map(|r| (0..columns as usize).map(|c| ramp_char(small.get(r, c, 0))).collect())
        .collect())
}

/// Render the image as black glyphs on white, resized back to the input size
///
/// # Errors
/// Propagates resize failures.
pub fn ascii_art(grid: &PixelGrid, columns: u32) -> Result<PixelGrid> {
    let (w, h) = grid.dimensions();
    let lines = ascii_lines(grid, columns)?;

    let canvas_w = CELL_WIDTH * columns + 2 * CANVAS_PADDING;
    let canvas_h = CELL_HEIGHT * lines.len() as u32 + 2 * CANVAS_PADDING;
    let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([255, 255, 255]));

    for (row, line) in lines.iter().enumerate() {
        let top = CANVAS_PADDING + row as u32 * CELL_HEIGHT;
        for (col, ch) in line.chars().enumerate() {
            let left = CANVAS_PADDING + col as u32 * CELL_WIDTH;
            for (gy, bits) in glyph(ch).iter().enumerate() {
                for gx in 0..5u32 {
                    if bits & (0b10000 >> gx) != 0 {
                        canvas.put_pixel(left + gx, top + gy as u32, Rgb([0, 0, 0]));
                    }
                }
            }
        }
    }

    log::debug!("ASCII canvas {}x{} for {} rows", canvas_w, canvas_h, lines.len());
    let rendered = PixelGrid::from_rgb_image(&canvas);
    let filter = resampling_filter((canvas_w, canvas_h), (w, h));
    resize(&rendered, w, h, filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_ends() {
        assert_eq!(ramp_char(0), '@');
        assert_eq!(ramp_char(255), ' ');
        assert_eq!(ramp_char(30), '%');
    }

    #[test]
    fn test_grid_rows_follow_aspect() {
        assert_eq!(grid_rows(120, 90, 120), 120);
        assert_eq!(grid_rows(300, 10, 20), 1);
    }

    #[test]
    fn test_white_image_renders_blank() {
        let grid = PixelGrid::filled(40, 60, &[255, 255, 255]);
        let out = ascii_art(&grid, 20).unwrap();
        assert_eq!(out.dimensions(), (60, 40));
        assert!(out.as_array().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_black_image_has_ink() {
        let grid = PixelGrid::filled(40, 60, &[0, 0, 0]);
        let lines = ascii_lines(&grid, 20).unwrap();
        assert!(lines.iter().all(|l| l.chars().all(|c| c == '@')));

        let out = ascii_art(&grid, 20).unwrap();
        assert_eq!(out.channels(), 3);
        assert!(out.as_array().iter().any(|&v| v < 200));
    }
}
