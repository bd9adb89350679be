//! Unit conversions
//!
//! WordprocessingML mixes three length systems:
//! - TWIP (twentieth of a point, 1440 per inch) for page and paragraph geometry
//! - EMU (English Metric Unit, 914400 per inch) for drawings
//! - HIP (half-point) for font sizes
//!
//! CSS pixels are taken at 96 DPI, so 1px = 0.75pt = 15 TWIP = 9525 EMU.
//! All functions are total and round to the nearest integer unit.

/// TWIPs per inch (1440)
pub const TWIP_PER_INCH: i64 = 1440;

/// EMUs per TWIP (635)
pub const EMU_PER_TWIP: i64 = 635;

/// EMUs per pixel at 96 DPI (9525)
pub const EMU_PER_PIXEL: i64 = 9525;

/// EMUs per inch (914400)
pub const EMU_PER_INCH: i64 = 914400;

/// Convert CSS pixels to TWIP
pub fn pixel_to_twip(px: f64) -> i64 {
    (px * 15.0).round() as i64
}

/// Convert points to TWIP
pub fn point_to_twip(pt: f64) -> i64 {
    (pt * 20.0).round() as i64
}

/// Convert centimeters to TWIP
pub fn cm_to_twip(cm: f64) -> i64 {
    (cm * TWIP_PER_INCH as f64 / 2.54).round() as i64
}

/// Convert inches to TWIP
pub fn inch_to_twip(inches: f64) -> i64 {
    (inches * TWIP_PER_INCH as f64).round() as i64
}

/// Convert CSS pixels to EMU
pub fn pixel_to_emu(px: f64) -> i64 {
    (px * EMU_PER_PIXEL as f64).round() as i64
}

/// Convert EMU to CSS pixels
pub fn emu_to_pixel(emu: i64) -> f64 {
    emu as f64 / EMU_PER_PIXEL as f64
}

/// Convert TWIP to EMU
pub fn twip_to_emu(twip: i64) -> i64 {
    twip * EMU_PER_TWIP
}

/// Convert EMU to TWIP, rounding up
pub fn emu_to_twip(emu: i64) -> i64 {
    (emu as f64 / EMU_PER_TWIP as f64).ceil() as i64
}

/// Convert points to half-points
pub fn point_to_hip(pt: f64) -> u32 {
    (pt * 2.0).round().max(0.0) as u32
}

/// Convert CSS pixels to points
pub fn pixel_to_point(px: f64) -> f64 {
    px * 0.75
}

/// Convert CSS pixels to half-points
pub fn pixel_to_hip(px: f64) -> u32 {
    point_to_hip(pixel_to_point(px))
}

/// Convert half-points to TWIP
pub fn hip_to_twip(hip: u32) -> i64 {
    hip as i64 * 10
}

/// Convert TWIP to points
pub fn twip_to_point(twip: i64) -> f64 {
    twip as f64 / 20.0
}
