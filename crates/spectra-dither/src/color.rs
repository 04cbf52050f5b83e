//! sRGB to linear-light conversion.
//!
//! Distances between colors are measured in linear RGB; gamma-encoded
//! values exaggerate differences in shadows and compress highlights.

/// Convert one gamma-encoded sRGB channel (0..=255, possibly fractional
/// after error accumulation) to linear light in 0.0..=1.0.
pub fn srgb_to_linear(value: f32) -> f32 {
    let v = (value / 255.0).clamp(0.0, 1.0);
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert a linear channel back to gamma-encoded sRGB in 0..=255.
pub fn linear_to_srgb(value: f32) -> f32 {
    let v = value.clamp(0.0, 1.0);
    let encoded = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    encoded * 255.0
}
