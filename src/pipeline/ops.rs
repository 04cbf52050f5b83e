//! The blocking processing steps, in pipeline order: decode, orient,
//! whitespace trim, rotate, zoom-crop, resize, enhance, quantize.

use image::{DynamicImage, GenericImageView, ImageDecoder, ImageEncoder, RgbImage};
use std::io::Cursor;

use super::{PipelineError, ProcessOptions, ProcessedImage, THUMB_HEIGHT, THUMB_WIDTH};
use crate::models::Rotation;
use spectra_dither::{dither_rgb, Palette};

/// Luminance at or above this is treated as whitespace when trimming.
const WHITESPACE_LUMA: f32 = 240.0;

pub(super) fn run(
    bytes: &[u8],
    options: &ProcessOptions,
) -> Result<ProcessedImage, PipelineError> {
    let mut img = decode(bytes)?;

    if options.auto_crop_whitespace {
        img = trim_whitespace(&img);
    }

    img = match options.rotation {
        Rotation::Deg0 => img,
        Rotation::Deg90 => img.rotate90(),
        Rotation::Deg180 => img.rotate180(),
        Rotation::Deg270 => img.rotate270(),
    };

    let (target_w, target_h) = options.rotation.target_dimensions();
    img = zoom_crop(img, target_w, target_h, options)?;
    img = img.resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3);

    let mut rgb = img.to_rgb8();
    if options.enhance_contrast {
        stretch_contrast(&mut rgb);
    }
    if options.sharpen {
        rgb = image::imageops::unsharpen(&rgb, 1.0, 2);
    }

    let palette = Palette::spectra6();
    let pixels = dither_rgb(
        rgb.as_raw(),
        target_w as usize,
        target_h as usize,
        &palette,
        options.dither,
    );

    let thumbnail_png = encode_thumbnail(&pixels, target_w, target_h)?;

    Ok(ProcessedImage {
        pixels,
        width: target_w,
        height: target_h,
        thumbnail_png,
    })
}

/// Decode any supported source into RGB with alpha composited over white.
fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if looks_like_svg(bytes) {
        return rasterize_svg(bytes);
    }

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(image::metadata::Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    img.apply_orientation(orientation);

    Ok(flatten_over_white(img))
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

fn rasterize_svg(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    use resvg::usvg;

    let options = usvg::Options {
        fontdb: std::sync::Arc::new(fontdb::Database::new()),
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(bytes, &options)
        .map_err(|e| PipelineError::Decode(format!("svg: {e}")))?;

    let size = tree.size();
    let width = size.width().ceil().max(1.0) as u32;
    let height = size.height().ceil().max(1.0) as u32;
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| PipelineError::Decode("svg: pixmap allocation failed".into()))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // White fill means alpha is opaque; take RGB directly.
    let mut rgb = RgbImage::new(width, height);
    for (i, px) in pixmap.data().chunks_exact(4).enumerate() {
        let x = (i as u32) % width;
        let y = (i as u32) / width;
        rgb.put_pixel(x, y, image::Rgb([px[0], px[1], px[2]]));
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Composite any alpha channel over a white background.
fn flatten_over_white(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    DynamicImage::ImageRgb8(rgb)
}

fn luminance(px: &image::Rgb<u8>) -> f32 {
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}

/// Trim outer rows/columns that are entirely whitespace by luminance.
/// Keeps the image unchanged when it is all white or nothing would remain.
fn trim_whitespace(img: &DynamicImage) -> DynamicImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for (x, y, px) in rgb.enumerate_pixels() {
        if luminance(px) < WHITESPACE_LUMA {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x > max_x || min_y > max_y {
        return img.clone();
    }
    let (crop_w, crop_h) = (max_x - min_x + 1, max_y - min_y + 1);
    if crop_w == width && crop_h == height {
        return img.clone();
    }
    img.crop_imm(min_x, min_y, crop_w, crop_h)
}

/// Select the crop rectangle for fill-fit at the target aspect, scaled down
/// by the zoom level and anchored so `(crop_x%, crop_y%)` of the source sits
/// at the crop center (clamped to stay inside the image).
fn zoom_crop(
    img: DynamicImage,
    target_w: u32,
    target_h: u32,
    options: &ProcessOptions,
) -> Result<DynamicImage, PipelineError> {
    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(PipelineError::Degenerate);
    }

    let aspect = target_w as f64 / target_h as f64;
    let (mut crop_w, mut crop_h) = if (src_w as f64 / src_h as f64) > aspect {
        (src_h as f64 * aspect, src_h as f64)
    } else {
        (src_w as f64, src_w as f64 / aspect)
    };
    crop_w /= options.zoom_level as f64;
    crop_h /= options.zoom_level as f64;

    if crop_w < 1.0 || crop_h < 1.0 {
        return Err(PipelineError::Degenerate);
    }

    let anchor_x = src_w as f64 * options.crop_x as f64 / 100.0;
    let anchor_y = src_h as f64 * options.crop_y as f64 / 100.0;
    let x = (anchor_x - crop_w / 2.0).clamp(0.0, src_w as f64 - crop_w);
    let y = (anchor_y - crop_h / 2.0).clamp(0.0, src_h as f64 - crop_h);

    Ok(img.crop_imm(
        x.floor() as u32,
        y.floor() as u32,
        crop_w.round() as u32,
        crop_h.round() as u32,
    ))
}

/// Linear contrast stretch between the 1st and 99th luminance percentiles.
fn stretch_contrast(img: &mut RgbImage) {
    let mut histogram = [0u32; 256];
    for px in img.pixels() {
        histogram[luminance(px).round().clamp(0.0, 255.0) as usize] += 1;
    }
    let total: u32 = histogram.iter().sum();
    if total == 0 {
        return;
    }

    let percentile = |fraction: f64| -> u8 {
        let threshold = (total as f64 * fraction) as u32;
        let mut seen = 0u32;
        for (value, &count) in histogram.iter().enumerate() {
            seen += count;
            if seen >= threshold {
                return value as u8;
            }
        }
        255
    };
    let lo = percentile(0.01) as f32;
    let hi = percentile(0.99) as f32;
    if hi - lo < 16.0 {
        // Too flat to stretch meaningfully.
        return;
    }

    let scale = 255.0 / (hi - lo);
    for px in img.pixels_mut() {
        for c in 0..3 {
            px[c] = ((px[c] as f32 - lo) * scale).clamp(0.0, 255.0).round() as u8;
        }
    }
}

/// PNG thumbnail of the quantized buffer, fitted inside the thumbnail box.
fn encode_thumbnail(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    let full = RgbImage::from_raw(width, height, pixels.to_vec())
        .ok_or_else(|| PipelineError::Worker("thumbnail buffer mismatch".into()))?;
    let thumb = DynamicImage::ImageRgb8(full).thumbnail(THUMB_WIDTH, THUMB_HEIGHT);
    let thumb = thumb.to_rgb8();

    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            thumb.as_raw(),
            thumb.width(),
            thumb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| PipelineError::Worker(format!("thumbnail encode: {e}")))?;
    Ok(out)
}
