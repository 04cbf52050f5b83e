//! Error diffusion dithering.
//!
//! The scan order is fixed: top-to-bottom, each row left-to-right, never
//! serpentine. Device firmware regenerates buffers server-side and compares
//! them byte-for-byte, so the scan order is part of the wire contract.

use crate::palette::Palette;

/// An error diffusion kernel: `(dx, dy, weight)` triples with weights that
/// already include the divisor.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    pub entries: &'static [(i32, i32, f32)],
    /// Number of rows below the current one the kernel can reach.
    pub row_depth: usize,
}

/// Floyd-Steinberg: 100% of the error to 4 neighbors.
///
/// ```text
///       X   7
///   3   5   1      (/16)
/// ```
pub const FLOYD_STEINBERG: Kernel = Kernel {
    entries: &[
        (1, 0, 7.0 / 16.0),
        (-1, 1, 3.0 / 16.0),
        (0, 1, 5.0 / 16.0),
        (1, 1, 1.0 / 16.0),
    ],
    row_depth: 1,
};

/// Atkinson: 75% of the error to 6 neighbors, higher contrast on small
/// palettes.
///
/// ```text
///       X   1   1
///   1   1   1
///       1              (/8)
/// ```
pub const ATKINSON: Kernel = Kernel {
    entries: &[
        (1, 0, 1.0 / 8.0),
        (2, 0, 1.0 / 8.0),
        (-1, 1, 1.0 / 8.0),
        (0, 1, 1.0 / 8.0),
        (1, 1, 1.0 / 8.0),
        (0, 2, 1.0 / 8.0),
    ],
    row_depth: 2,
};

/// Quantization algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherAlgorithm {
    /// Floyd-Steinberg error diffusion.
    #[default]
    FloydSteinberg,
    /// Atkinson error diffusion.
    Atkinson,
    /// Plain nearest-color mapping, no diffusion.
    None,
}

impl DitherAlgorithm {
    pub fn kernel(&self) -> Option<&'static Kernel> {
        match self {
            Self::FloydSteinberg => Some(&FLOYD_STEINBERG),
            Self::Atkinson => Some(&ATKINSON),
            Self::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FloydSteinberg => "floyd-steinberg",
            Self::Atkinson => "atkinson",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "floyd-steinberg" => Some(Self::FloydSteinberg),
            "atkinson" => Some(Self::Atkinson),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Quantize an RGB888 buffer to palette indices.
///
/// `rgb` must be exactly `width * height * 3` bytes, row-major from the
/// top-left. Accumulated error is clamped to `[0, 255]` per channel before
/// the nearest-color lookup.
pub fn dither_indexed(
    rgb: &[u8],
    width: usize,
    height: usize,
    palette: &Palette,
    algorithm: DitherAlgorithm,
) -> Vec<u8> {
    assert_eq!(
        rgb.len(),
        width * height * 3,
        "pixel buffer does not match dimensions"
    );

    let mut output = vec![0u8; width * height];
    let Some(kernel) = algorithm.kernel() else {
        for (i, px) in rgb.chunks_exact(3).enumerate() {
            output[i] = palette.nearest(px[0] as f32, px[1] as f32, px[2] as f32) as u8;
        }
        return output;
    };

    // Sliding window of error rows: errors[0] is the current row.
    let depth = kernel.row_depth + 1;
    let mut errors: Vec<Vec<[f32; 3]>> = (0..depth).map(|_| vec![[0.0f32; 3]; width]).collect();

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            let acc = errors[0][x];
            let r = (rgb[idx] as f32 + acc[0]).clamp(0.0, 255.0);
            let g = (rgb[idx + 1] as f32 + acc[1]).clamp(0.0, 255.0);
            let b = (rgb[idx + 2] as f32 + acc[2]).clamp(0.0, 255.0);

            let nearest = palette.nearest(r, g, b);
            output[y * width + x] = nearest as u8;

            let chosen = palette.color(nearest);
            let err = [
                r - chosen[0] as f32,
                g - chosen[1] as f32,
                b - chosen[2] as f32,
            ];

            for &(dx, dy, weight) in kernel.entries {
                let nx = x as i32 + dx;
                if nx < 0 || nx as usize >= width {
                    continue;
                }
                if y + dy as usize >= height {
                    continue;
                }
                let cell = &mut errors[dy as usize][nx as usize];
                cell[0] += err[0] * weight;
                cell[1] += err[1] * weight;
                cell[2] += err[2] * weight;
            }
        }
        errors.rotate_left(1);
        if let Some(last) = errors.last_mut() {
            last.fill([0.0; 3]);
        }
    }

    output
}

/// Quantize an RGB888 buffer, returning a same-sized RGB888 buffer where
/// every triple is a palette color.
pub fn dither_rgb(
    rgb: &[u8],
    width: usize,
    height: usize,
    palette: &Palette,
    algorithm: DitherAlgorithm,
) -> Vec<u8> {
    let indices = dither_indexed(rgb, width, height, palette, algorithm);
    let mut out = Vec::with_capacity(indices.len() * 3);
    for idx in indices {
        out.extend_from_slice(&palette.color(idx as usize));
    }
    out
}
