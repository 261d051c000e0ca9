//! Field-specific image normalization for OCR
//!
//! The opponent name is rendered as glowing stylized text, the clan name as
//! flat text, so each gets its own strategy. Both are pure functions and
//! always return a binary image with dark glyphs on a light background.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_open, Mask};
use tracing::debug;

use crate::capture::FieldRole;

/// Upscale factor for the name field
pub const NAME_SCALE: f32 = 3.5;
/// Upscale factor for the clan field
pub const CLAN_SCALE: f32 = 3.0;
/// CLAHE clip limit
const CLAHE_CLIP: f32 = 3.0;
/// CLAHE tile grid (per axis)
const CLAHE_TILES: u32 = 8;
/// Sigma matching a 3x3 Gaussian kernel
const BLUR_SIGMA: f32 = 0.8;
/// Adaptive threshold neighbourhood is (2 * radius + 1) square, i.e. 31x31
const ADAPTIVE_RADIUS: u32 = 15;
/// Constant subtracted from the neighbourhood mean
const ADAPTIVE_OFFSET: i32 = 5;

/// Run the strategy for `role`
pub fn preprocess_field(image: &RgbaImage, role: FieldRole) -> GrayImage {
    let out = match role {
        FieldRole::Name => preprocess_name(image),
        FieldRole::Clan => preprocess_clan(image),
    };
    debug!(
        "Preprocessed {} field {:?} -> {:?}",
        role.label(),
        image.dimensions(),
        out.dimensions()
    );
    out
}

/// Glowing name text: lightness, upscale, CLAHE, top-hat, blur, Otsu
pub fn preprocess_name(image: &RgbaImage) -> GrayImage {
    let lightness = lightness_channel(image);
    let scaled = upscale(&lightness, NAME_SCALE);
    let equalized = clahe(&scaled, CLAHE_CLIP, CLAHE_TILES);
    let hat = top_hat(&equalized);
    let smooth = gaussian_blur_f32(&hat, BLUR_SIGMA);
    let level = otsu_level(&smooth);
    normalize_polarity(binarize(&smooth, level))
}

/// Flat clan text: grayscale, upscale, blur, adaptive mean threshold
pub fn preprocess_clan(image: &RgbaImage) -> GrayImage {
    let gray = imageops::grayscale(image);
    let scaled = upscale(&gray, CLAN_SCALE);
    let smooth = gaussian_blur_f32(&scaled, BLUR_SIGMA);
    normalize_polarity(adaptive_threshold(&smooth, ADAPTIVE_RADIUS, ADAPTIVE_OFFSET))
}

/// CIE L* of each pixel, scaled to 0..=255
fn lightness_channel(image: &RgbaImage) -> GrayImage {
    let mut linear = [0f32; 256];
    for (i, v) in linear.iter_mut().enumerate() {
        let c = i as f32 / 255.0;
        *v = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let lum = 0.212_671 * linear[p[0] as usize]
            + 0.715_160 * linear[p[1] as usize]
            + 0.072_169 * linear[p[2] as usize];
        let l = if lum > 0.008_856 {
            116.0 * lum.cbrt() - 16.0
        } else {
            903.3 * lum
        };
        Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
    })
}

/// Bicubic upscale by `factor`
fn upscale(image: &GrayImage, factor: f32) -> GrayImage {
    let w = ((image.width() as f32 * factor).round() as u32).max(1);
    let h = ((image.height() as f32 * factor).round() as u32).max(1);
    imageops::resize(image, w, h, FilterType::CatmullRom)
}

/// Contrast-limited adaptive histogram equalization
///
/// Per-tile clipped histograms become lookup tables; each pixel blends the
/// four nearest tile mappings bilinearly.
fn clahe(image: &GrayImage, clip: f32, tiles: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let nx = tiles.min(w) as usize;
    let ny = tiles.min(h) as usize;
    let x_bounds: Vec<u32> = (0..=nx).map(|i| (i as u32 * w) / nx as u32).collect();
    let y_bounds: Vec<u32> = (0..=ny).map(|i| (i as u32 * h) / ny as u32).collect();

    let mut luts = vec![[0u8; 256]; nx * ny];
    for ty in 0..ny {
        for tx in 0..nx {
            let mut hist = [0u32; 256];
            for y in y_bounds[ty]..y_bounds[ty + 1] {
                for x in x_bounds[tx]..x_bounds[tx + 1] {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x_bounds[tx + 1] - x_bounds[tx]) * (y_bounds[ty + 1] - y_bounds[ty]);
            luts[ty * nx + tx] = tile_lut(&mut hist, area, clip);
        }
    }

    let tile_w = w as f32 / nx as f32;
    let tile_h = h as f32 / ny as f32;

    GrayImage::from_fn(w, h, |x, y| {
        let fx = (x as f32 + 0.5) / tile_w - 0.5;
        let fy = (y as f32 + 0.5) / tile_h - 0.5;
        let (xa, xb, wx) = neighbours(fx, nx);
        let (ya, yb, wy) = neighbours(fy, ny);
        let v = image.get_pixel(x, y)[0] as usize;

        let top = luts[ya * nx + xa][v] as f32 * (1.0 - wx) + luts[ya * nx + xb][v] as f32 * wx;
        let bottom = luts[yb * nx + xa][v] as f32 * (1.0 - wx) + luts[yb * nx + xb][v] as f32 * wx;
        Luma([(top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(hist: &mut [u32; 256], area: u32, clip: f32) -> [u8; 256] {
    let limit = ((clip * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let batch = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        sum += bin;
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Neighbouring tile indices and the weight of the second one
fn neighbours(f: f32, count: usize) -> (usize, usize, f32) {
    let base = f.floor();
    let weight = f - base;
    let last = count as i64 - 1;
    let a = (base as i64).clamp(0, last) as usize;
    let b = (base as i64 + 1).clamp(0, last) as usize;
    (a, b, weight)
}

/// White top-hat with a 3x3 square: source minus its grayscale opening
fn top_hat(image: &GrayImage) -> GrayImage {
    let opened = grayscale_open(image, &Mask::square(1));
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[0].saturating_sub(opened.get_pixel(x, y)[0])])
    })
}

/// Global threshold: strictly above `level` becomes white
fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Local mean threshold over a (2r+1)^2 window minus `offset`
fn adaptive_threshold(image: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = image.dimensions();
    let stride = w as usize + 1;

    // Summed-area table with a zero first row/column
    let mut integral = vec![0u64; stride * (h as usize + 1)];
    for y in 0..h as usize {
        let mut row = 0u64;
        for x in 0..w as usize {
            row += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let x0 = x.saturating_sub(radius) as usize;
        let y0 = y.saturating_sub(radius) as usize;
        let x1 = (x + radius + 1).min(w) as usize;
        let y1 = (y + radius + 1).min(h) as usize;
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let count = ((x1 - x0) * (y1 - y0)) as f32;
        let mean = sum as f32 / count;

        if image.get_pixel(x, y)[0] as f32 > mean - offset as f32 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Invert a predominantly dark binary image so glyphs end up dark on light
fn normalize_polarity(mut image: GrayImage) -> GrayImage {
    let total: u64 = image.pixels().map(|p| p[0] as u64).sum();
    let count = (image.width() as u64 * image.height() as u64).max(1);
    if (total as f64 / count as f64) < 127.0 {
        imageops::invert(&mut image);
    }
    image
}
