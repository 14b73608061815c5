//! RuuviTag data format 5 (RAWv2) frame decoding

use thiserror::Error;
use time::OffsetDateTime;

use crate::models::Measurement;

/// RuuviTag data format version 5 (RAWv2)
pub const DATA_FORMAT_RAWV2: u8 = 5;

/// Shortest frame that carries every format 5 field up to the sequence number
pub const MIN_FRAME_LEN: usize = 18;

// Reserved "not available" bit patterns per field
const TEMPERATURE_UNAVAILABLE: u16 = 0x8000;
const HUMIDITY_UNAVAILABLE: u16 = 0xFFFF;
const PRESSURE_UNAVAILABLE: u16 = 0xFFFF;
const ACCELERATION_UNAVAILABLE: u16 = 0x8000;
const POWER_WORD_UNAVAILABLE: u16 = 0xFFFF;
const TX_POWER_UNAVAILABLE: u16 = 0x1F;

/// Frame that cannot be decoded. Local to a single frame; the caller drops
/// it, logs, and moves on to the next one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported data format {0}, expected format 5")]
    UnsupportedFormat(u8),

    #[error("truncated frame: {len} bytes, format 5 needs at least 18")]
    Truncated { len: usize },
}

/// Decode a RuuviTag data format 5 (RAWv2) frame into a measurement
///
/// Format 5 payload layout, all multi-byte fields big-endian:
/// - Byte 0: Data format (5)
/// - Bytes 1-2: Temperature (signed 16-bit, 0.005°C resolution)
/// - Bytes 3-4: Humidity (unsigned 16-bit, 0.0025% resolution)
/// - Bytes 5-6: Pressure (unsigned 16-bit, +50000 Pa offset, 1 Pa resolution)
/// - Bytes 7-8: Acceleration X (signed 16-bit, 1 mG resolution)
/// - Bytes 9-10: Acceleration Y (signed 16-bit, 1 mG resolution)
/// - Bytes 11-12: Acceleration Z (signed 16-bit, 1 mG resolution)
/// - Bytes 13-14: Battery voltage (upper 11 bits, +1600 mV offset) packed
///   with TX power (lower 5 bits, 2 dBm steps from -40 dBm)
/// - Byte 15: Movement counter (wraps at 256)
/// - Bytes 16-17: Measurement sequence number (wraps at 65536)
/// - Bytes 18-23: MAC address when present (ignored, the radio layer
///   already supplies the device identity)
///
/// Every field has a reserved "not available" pattern that decodes to
/// `None`; one unavailable field never blocks the others.
///
/// # Arguments
/// * `frame` - Raw manufacturer data bytes from a BLE advertisement
/// * `device_id` - MAC address of the broadcasting tag
/// * `rssi` - Signal strength at capture, if the radio layer reports one
///
/// # Returns
/// The decoded measurement, or which way the frame was unusable
pub fn decode_frame(
    frame: &[u8],
    device_id: &str,
    rssi: Option<i16>,
) -> Result<Measurement, DecodeError> {
    // Length first, so the format tag read below can never go out of bounds
    if frame.len() < MIN_FRAME_LEN {
        return Err(DecodeError::Truncated { len: frame.len() });
    }
    if frame[0] != DATA_FORMAT_RAWV2 {
        return Err(DecodeError::UnsupportedFormat(frame[0]));
    }

    // Temperature: signed 16-bit integer * 0.005°C
    let temp_raw = u16::from_be_bytes([frame[1], frame[2]]);
    let temperature = if temp_raw == TEMPERATURE_UNAVAILABLE {
        None
    } else {
        Some(round2(temp_raw as i16 as f64 * 0.005))
    };

    // Humidity: unsigned 16-bit integer * 0.0025%
    let humidity_raw = u16::from_be_bytes([frame[3], frame[4]]);
    let humidity = if humidity_raw == HUMIDITY_UNAVAILABLE {
        None
    } else {
        Some(round2(humidity_raw as f64 * 0.0025))
    };

    // Pressure: unsigned 16-bit integer + 50000 Pa, converted to hPa
    let pressure_raw = u16::from_be_bytes([frame[5], frame[6]]);
    let pressure = if pressure_raw == PRESSURE_UNAVAILABLE {
        None
    } else {
        Some(round2((pressure_raw as f64 + 50000.0) / 100.0))
    };

    // Acceleration: signed 16-bit integers, 1 mG units. 0x8000 is the
    // "not available" pattern, not a valid two's-complement reading.
    let acceleration_x = decode_acceleration(frame[7], frame[8]);
    let acceleration_y = decode_acceleration(frame[9], frame[10]);
    let acceleration_z = decode_acceleration(frame[11], frame[12]);

    // Battery voltage and TX power share one word: voltage in the upper
    // 11 bits above a 1600 mV floor, power in the lower 5 bits
    let power_raw = u16::from_be_bytes([frame[13], frame[14]]);
    let battery = if power_raw == POWER_WORD_UNAVAILABLE {
        None
    } else {
        Some((power_raw >> 5) + 1600)
    };
    let tx_raw = power_raw & 0x1F;
    let tx_power = if tx_raw == TX_POWER_UNAVAILABLE {
        None
    } else {
        Some(tx_raw as i8 * 2 - 40)
    };

    // Movement counter: increments when the tag detects significant motion
    let movement_counter = frame[15];

    // Measurement sequence: increments once per measurement taken
    let measurement_sequence = u16::from_be_bytes([frame[16], frame[17]]);

    Ok(Measurement {
        device_id: device_id.to_string(),
        temperature,
        humidity,
        pressure,
        acceleration_x,
        acceleration_y,
        acceleration_z,
        battery,
        tx_power,
        movement_counter,
        measurement_sequence,
        rssi,
        captured_at: OffsetDateTime::now_utc(),
    })
}

fn decode_acceleration(hi: u8, lo: u8) -> Option<i16> {
    let raw = u16::from_be_bytes([hi, lo]);
    if raw == ACCELERATION_UNAVAILABLE {
        None
    } else {
        Some(raw as i16)
    }
}

fn round2(value: f64) -> f32 {
    ((value * 100.0).round() / 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DEVICE: &str = "AA:BB:CC:DD:EE:FF";

    /// Reference vector from the Ruuvi format 5 documentation ("valid data"
    /// case), truncated to the 18 bytes ahead of the embedded MAC.
    const REFERENCE_FRAME: [u8; 18] = [
        0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C, 0xAC, 0x36,
        0x42, 0x00, 0xCD,
    ];

    /// Same documentation's "invalid values" case: every field carries its
    /// "not available" pattern.
    const ALL_UNAVAILABLE_FRAME: [u8; 18] = [
        0x05, 0x80, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0xFF, 0xFF,
        0xFF, 0xFF, 0xFF,
    ];

    fn frame_with_acceleration_x(hi: u8, lo: u8) -> [u8; 18] {
        let mut frame = REFERENCE_FRAME;
        frame[7] = hi;
        frame[8] = lo;
        frame
    }

    #[test]
    fn decodes_reference_frame() {
        let m = decode_frame(&REFERENCE_FRAME, DEVICE, Some(-68)).unwrap();

        assert_eq!(m.device_id, DEVICE);
        assert_eq!(m.temperature, Some(24.3));
        assert_eq!(m.humidity, Some(53.49));
        assert_eq!(m.pressure, Some(1000.44));
        assert_eq!(m.acceleration_x, Some(4));
        assert_eq!(m.acceleration_y, Some(-4));
        assert_eq!(m.acceleration_z, Some(1036));
        assert_eq!(m.battery, Some(2977));
        assert_eq!(m.tx_power, Some(4));
        assert_eq!(m.movement_counter, 66);
        assert_eq!(m.measurement_sequence, 205);
        assert_eq!(m.rssi, Some(-68));
    }

    #[test]
    fn unavailable_fields_decode_to_none() {
        let m = decode_frame(&ALL_UNAVAILABLE_FRAME, DEVICE, None).unwrap();

        assert_eq!(m.temperature, None);
        assert_eq!(m.humidity, None);
        assert_eq!(m.pressure, None);
        assert_eq!(m.acceleration_x, None);
        assert_eq!(m.acceleration_y, None);
        assert_eq!(m.acceleration_z, None);
        assert_eq!(m.battery, None);
        assert_eq!(m.tx_power, None);
        // Counters have no reserved pattern; the raw values stand
        assert_eq!(m.movement_counter, 255);
        assert_eq!(m.measurement_sequence, 65535);
    }

    #[test]
    fn one_unavailable_field_does_not_block_the_rest() {
        let mut frame = REFERENCE_FRAME;
        frame[1] = 0x80;
        frame[2] = 0x00;

        let m = decode_frame(&frame, DEVICE, None).unwrap();
        assert_eq!(m.temperature, None);
        assert_eq!(m.humidity, Some(53.49));
        assert_eq!(m.acceleration_z, Some(1036));
        assert_eq!(m.battery, Some(2977));
    }

    #[test]
    fn acceleration_uses_twos_complement() {
        let m = decode_frame(&frame_with_acceleration_x(0xFF, 0xFF), DEVICE, None).unwrap();
        assert_eq!(m.acceleration_x, Some(-1));

        let m = decode_frame(&frame_with_acceleration_x(0x00, 0x01), DEVICE, None).unwrap();
        assert_eq!(m.acceleration_x, Some(1));

        // 0x8000 is reserved, not the i16 minimum
        let m = decode_frame(&frame_with_acceleration_x(0x80, 0x00), DEVICE, None).unwrap();
        assert_eq!(m.acceleration_x, None);
    }

    #[test]
    fn negative_temperature_decodes() {
        // -1176 raw = -5.88°C
        let mut frame = REFERENCE_FRAME;
        frame[1] = 0xFB;
        frame[2] = 0x68;

        let m = decode_frame(&frame, DEVICE, None).unwrap();
        assert_eq!(m.temperature, Some(-5.88));
    }

    #[test]
    fn temperature_scaling_rounds_to_two_decimals() {
        // 325 raw = 1.625°C, rounded half away from zero to 1.63
        let mut frame = REFERENCE_FRAME;
        frame[1] = 0x01;
        frame[2] = 0x45;

        let m = decode_frame(&frame, DEVICE, None).unwrap();
        assert_eq!(m.temperature, Some(1.63));
    }

    #[test]
    fn tx_power_unpacks_from_shared_word() {
        // Word 0x9F76: voltage bits 0x4FB (+1600 = 2875 mV), power bits
        // 0x16 (= 4 dBm)
        let mut frame = REFERENCE_FRAME;
        frame[13] = 0x9F;
        frame[14] = 0x76;

        let m = decode_frame(&frame, DEVICE, None).unwrap();
        assert_eq!(m.battery, Some(2875));
        assert_eq!(m.tx_power, Some(4));

        // Power bits all ones means only the TX power is unavailable
        frame[14] = 0x7F;
        let m = decode_frame(&frame, DEVICE, None).unwrap();
        assert_eq!(m.battery, Some(2875));
        assert_eq!(m.tx_power, None);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert_eq!(
            decode_frame(&[], DEVICE, None),
            Err(DecodeError::Truncated { len: 0 })
        );
        assert_eq!(
            decode_frame(&REFERENCE_FRAME[..17], DEVICE, None),
            Err(DecodeError::Truncated { len: 17 })
        );
    }

    #[test]
    fn longer_frames_with_trailing_mac_are_accepted() {
        let mut frame = REFERENCE_FRAME.to_vec();
        frame.extend_from_slice(&[0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F]);

        let m = decode_frame(&frame, DEVICE, None).unwrap();
        assert_eq!(m.temperature, Some(24.3));
        assert_eq!(m.measurement_sequence, 205);
    }

    #[test]
    fn unknown_format_tag_is_rejected() {
        let mut frame = REFERENCE_FRAME;
        frame[0] = 3; // RAWv1

        assert_eq!(
            decode_frame(&frame, DEVICE, None),
            Err(DecodeError::UnsupportedFormat(3))
        );
    }
}
