//! Contrast-limited adaptive histogram equalization

use image::GrayImage;

/// CLAHE over a grid of `tiles_x x tiles_y` tiles
///
/// Each tile's histogram is clipped at `clip_limit * tile_area / 256`, the
/// excess is redistributed uniformly and the tile's CDF becomes a lookup
/// table. Pixels are mapped by bilinear interpolation between the four
/// nearest tile centres.
#[must_use]
pub fn clahe(plane: &GrayImage, tiles_x: usize, tiles_y: usize, clip_limit: f32) -> GrayImage {
    let (w, h) = (plane.width() as usize, plane.height() as usize);
    if w == 0 || h == 0 || tiles_x == 0 || tiles_y == 0 {
        return plane.clone();
    }
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);
    let src = plane.as_raw();

    let mut maps = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = (tx * tile_w).min(w);
            let y0 = (ty * tile_h).min(h);
            let x1 = ((tx + 1) * tile_w).min(w);
            let y1 = ((ty + 1) * tile_h).min(h);
            let tile_pixels = (x1 - x0) * (y1 - y0);
            let map = &mut maps[ty * tiles_x + tx];

            if tile_pixels == 0 {
                for (i, slot) in map.iter_mut().enumerate() {
                    *slot = i as u8;
                }
                continue;
            }

            let mut hist = [0u32; 256];
            for row in y0..y1 {
                for &v in &src[row * w + x0..row * w + x1] {
                    hist[v as usize] += 1;
                }
            }

            let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);
            let mut excess = 0u32;
            for bin in &mut hist {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let per_bin = excess / 256;
            let remainder = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += per_bin;
                if i < remainder {
                    *bin += 1;
                }
            }

            let scale = 255.0 / tile_pixels as f32;
            let mut cdf = 0u32;
            for (i, bin) in hist.iter().enumerate() {
                cdf += bin;
                map[i] = (cdf as f32 * scale).round().min(255.0) as u8;
            }
        }
    }

    let mut out = GrayImage::new(w as u32, h as u32);
    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    for y in 0..h {
        let gy = y as f32 * inv_th - 0.5;
        let ty1 = gy.floor();
        let fy = gy - ty1;
        let ty0 = (ty1 as isize).clamp(0, tiles_y as isize - 1) as usize;
        let ty2 = (ty1 as isize + 1).clamp(0, tiles_y as isize - 1) as usize;

        for x in 0..w {
            let gx = x as f32 * inv_tw - 0.5;
            let tx1 = gx.floor();
            let fx = gx - tx1;
            let tx0 = (tx1 as isize).clamp(0, tiles_x as isize - 1) as usize;
            let tx2 = (tx1 as isize + 1).clamp(0, tiles_x as isize - 1) as usize;

            let v = src[y * w + x] as usize;
            let tl = f32::from(maps[ty0 * tiles_x + tx0][v]);
            let tr = f32::from(maps[ty0 * tiles_x + tx2][v]);
            let bl = f32::from(maps[ty2 * tiles_x + tx0][v]);
            let br = f32::from(maps[ty2 * tiles_x + tx2][v]);

            let top = tl * (1.0 - fx) + tr * fx;
            let bottom = bl * (1.0 - fx) + br * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x as u32, y as u32, image::Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}
