//! spectra-dither: palette quantization for Spectra 6 e-paper panels.
//!
//! Converts full-color RGB888 buffers into buffers whose every pixel is one
//! of the six panel colors (black, white, yellow, red, blue, green), using
//! error diffusion to preserve apparent tone.
//!
//! # Contract
//!
//! - Nearest-color matching minimizes squared Euclidean distance in
//!   *linear* sRGB; ties resolve to the earliest palette entry.
//! - Error diffusion scans top-to-bottom, each row left-to-right. There is
//!   no serpentine ordering; output is byte-identical across runs for the
//!   same input.
//! - Accumulated channel values are clamped to `[0, 255]` before matching.
//!
//! # Quick start
//!
//! ```
//! use spectra_dither::{dither_rgb, DitherAlgorithm, Palette};
//!
//! let palette = Palette::spectra6();
//! let pixels = vec![128u8; 2 * 2 * 3];
//! let out = dither_rgb(&pixels, 2, 2, &palette, DitherAlgorithm::FloydSteinberg);
//! assert_eq!(out.len(), 2 * 2 * 3);
//! ```

pub mod color;
pub mod dither;
pub mod palette;

pub use dither::{dither_indexed, dither_rgb, DitherAlgorithm, Kernel, ATKINSON, FLOYD_STEINBERG};
pub use palette::{Palette, SPECTRA_6};
