//! # Telemetry Record
//!
//! The 16-byte unit that is buffered on the device and carried in queries.
//!
//! ```text
//! Byte 0      : interval[0:4] | gap << 5 | fix_valid << 6   (bit 7 reserved)
//! Bytes 1-4   : latitude,  i32 LE, degrees × 10^7
//! Bytes 5-8   : longitude, i32 LE, degrees × 10^7
//! Byte 9      : satellites in use
//! Bytes 10-11 : HDOP × 100, u16 LE (0xFFFF = unknown)
//! Bytes 12-13 : sequence number, u16 LE
//! Bytes 14-15 : altitude in metres, i16 LE
//! ```

use serde::Serialize;

use crate::config::TICK_SECONDS;
use crate::error::{Result, TowlError};

/// Packed record size in bytes
pub const RECORD_SIZE: usize = 16;

/// Largest interval the 5-bit field can carry
pub const INTERVAL_FIELD_MAX: u8 = 0x1F;

/// HDOP value meaning "not reported"
pub const HDOP_UNKNOWN: u16 = 0xFFFF;

/// Fixed-point scale for latitude/longitude
pub const COORD_SCALE: f64 = 10_000_000.0;

const FLAG_GAP: u8 = 1 << 5;
const FLAG_FIX_VALID: u8 = 1 << 6;
const FLAG_RESERVED: u8 = 1 << 7;

/// One buffered GPS fix (or synthetic gap marker)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    /// 10-second ticks since the previous record
    pub interval: u8,

    /// Synthetic record inserted to keep the timeline continuous
    pub gap: bool,

    /// Receiver reported a valid fix
    pub fix_valid: bool,

    /// Latitude in degrees × 10^7
    pub latitude_e7: i32,

    /// Longitude in degrees × 10^7
    pub longitude_e7: i32,

    /// Satellites in use
    pub satellites: u8,

    /// Horizontal dilution of precision × 100
    pub hdop_centi: u16,

    /// Store-assigned sequence number (wrapping)
    pub sequence: u16,

    /// Altitude above mean sea level in metres
    pub altitude_m: i16,
}

impl TelemetryRecord {
    /// Pack into the 16-byte wire layout
    ///
    /// The interval is clamped to the 5-bit field.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];

        let mut flags = self.interval.min(INTERVAL_FIELD_MAX);
        if self.gap {
            flags |= FLAG_GAP;
        }
        if self.fix_valid {
            flags |= FLAG_FIX_VALID;
        }

        out[0] = flags;
        out[1..5].copy_from_slice(&self.latitude_e7.to_le_bytes());
        out[5..9].copy_from_slice(&self.longitude_e7.to_le_bytes());
        out[9] = self.satellites;
        out[10..12].copy_from_slice(&self.hdop_centi.to_le_bytes());
        out[12..14].copy_from_slice(&self.sequence.to_le_bytes());
        out[14..16].copy_from_slice(&self.altitude_m.to_le_bytes());
        out
    }

    /// Unpack from the 16-byte wire layout
    ///
    /// # Errors
    ///
    /// Returns `TowlError::Decode` if the slice is not exactly 16 bytes or the
    /// reserved flag bit is set.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(TowlError::Decode(
                format!("record must be {} bytes, got {}", RECORD_SIZE, bytes.len())
            ));
        }

        let flags = bytes[0];
        if flags & FLAG_RESERVED != 0 {
            return Err(TowlError::Decode(
                format!("reserved flag bit set: 0x{:02X}", flags)
            ));
        }

        Ok(Self {
            interval: flags & INTERVAL_FIELD_MAX,
            gap: flags & FLAG_GAP != 0,
            fix_valid: flags & FLAG_FIX_VALID != 0,
            latitude_e7: i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            longitude_e7: i32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            satellites: bytes[9],
            hdop_centi: u16::from_le_bytes([bytes[10], bytes[11]]),
            sequence: u16::from_le_bytes([bytes[12], bytes[13]]),
            altitude_m: i16::from_le_bytes([bytes[14], bytes[15]]),
        })
    }

    /// Latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.latitude_e7 as f64 / COORD_SCALE
    }

    /// Longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.longitude_e7 as f64 / COORD_SCALE
    }

    /// HDOP, or `None` when the receiver did not report one
    pub fn hdop(&self) -> Option<f32> {
        (self.hdop_centi != HDOP_UNKNOWN).then(|| self.hdop_centi as f32 / 100.0)
    }

    /// Seconds represented by this record's interval
    pub fn elapsed_seconds(&self) -> i64 {
        self.interval as i64 * TICK_SECONDS
    }
}
