//! Utility functions for unit conversion and formatting

use time::{format_description, OffsetDateTime};

/// Voltage at which the tag's coin cell is considered empty.
/// RuuviTag uses a CR2450 (3.0 V nominal, 2.0 V cutoff).
pub const BATTERY_EMPTY_MV: u16 = 2000;

/// Voltage at which the tag's coin cell is considered full.
pub const BATTERY_FULL_MV: u16 = 3000;

/// Deviation from one gravity beyond which the tag counts as moving, in mG.
pub const MOVEMENT_THRESHOLD_MG: f32 = 100.0;

const GRAVITY_MG: f32 = 1000.0;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]")
        .expect("Failed to create format description");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Convert a time::Duration to seconds as u64
///
/// Helper function to work with duration calculations in the main loop.
pub fn duration_to_seconds(duration: time::Duration) -> u64 {
    duration.whole_seconds() as u64
}

/// Convert battery voltage to a 0-100 charge percentage
///
/// Linear interpolation across the coin cell's working range, clamped at
/// both ends and rounded to the nearest whole percent.
///
/// # Arguments
/// * `voltage_mv` - Battery voltage in millivolts
///
/// # Returns
/// Charge percentage in 0..=100
pub fn battery_percentage(voltage_mv: u16) -> u8 {
    if voltage_mv >= BATTERY_FULL_MV {
        return 100;
    }
    if voltage_mv <= BATTERY_EMPTY_MV {
        return 0;
    }

    let span = (BATTERY_FULL_MV - BATTERY_EMPTY_MV) as f64;
    let fraction = (voltage_mv - BATTERY_EMPTY_MV) as f64 / span;
    (fraction * 100.0).round() as u8
}

/// Check whether the tag is moving based on its acceleration vector
///
/// A stationary tag reads one gravity; the tag counts as moving when the
/// 3-axis magnitude deviates from 1000 mG by more than the threshold.
///
/// # Arguments
/// * `acceleration_x/y/z` - Axis readings in mG
/// * `threshold_mg` - Allowed deviation before the tag counts as moving
pub fn is_moving(
    acceleration_x: i16,
    acceleration_y: i16,
    acceleration_z: i16,
    threshold_mg: f32,
) -> bool {
    let x = acceleration_x as f32;
    let y = acceleration_y as f32;
    let z = acceleration_z as f32;
    let magnitude = (x * x + y * y + z * z).sqrt();
    (magnitude - GRAVITY_MG).abs() > threshold_mg
}
