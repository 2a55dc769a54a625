//! # GPS Fix Sampler Module
//!
//! Boundary between the GPS receiver and the telemetry store.
//!
//! This module handles:
//! - The `GpsSource` collaborator interface (`read_fix`)
//! - Fixed-point conversion of coordinates, HDOP and altitude
//! - Deciding which fixes are stored (valid, at most one per tick period)
//! - Remembering the latest fix for the status indicator

pub mod nmea;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::config::{FIX_TIMEOUT_POLLS, TICK_SECONDS};
use crate::store::record::{COORD_SCALE, HDOP_UNKNOWN};
use crate::store::TelemetryRecord;

/// A parsed fix as supplied by the receiver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Latitude in degrees, positive north
    pub latitude: f64,

    /// Longitude in degrees, positive east
    pub longitude: f64,

    /// Receiver reports a usable position
    pub valid: bool,

    /// Satellites in use
    pub satellites: u8,

    /// Horizontal dilution of precision
    pub hdop: Option<f32>,

    /// Altitude above mean sea level in metres
    pub altitude: Option<f32>,

    /// UTC time of the fix
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// Convert into the fixed-point record representation
    ///
    /// `interval`, `gap` and `sequence` are left at zero; the store fills them.
    pub fn to_record(&self) -> TelemetryRecord {
        TelemetryRecord {
            fix_valid: self.valid,
            latitude_e7: degrees_to_e7(self.latitude),
            longitude_e7: degrees_to_e7(self.longitude),
            satellites: self.satellites,
            hdop_centi: hdop_to_centi(self.hdop),
            altitude_m: altitude_to_metres(self.altitude),
            ..Default::default()
        }
    }
}

/// GPS collaborator: non-blocking poll for the next fix
#[cfg_attr(test, mockall::automock)]
pub trait GpsSource {
    /// Return a fix if one arrived since the last call
    fn read_fix(&mut self) -> Option<Fix>;
}

/// Degrees to degrees × 10^7, rounded and saturated to `i32`
pub fn degrees_to_e7(degrees: f64) -> i32 {
    (degrees * COORD_SCALE).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// HDOP to hundredths; unknown or invalid values map to `HDOP_UNKNOWN`
pub fn hdop_to_centi(hdop: Option<f32>) -> u16 {
    match hdop {
        Some(h) if h.is_finite() && h >= 0.0 => (h * 100.0).round().min((HDOP_UNKNOWN - 1) as f32) as u16,
        _ => HDOP_UNKNOWN,
    }
}

/// Altitude to whole metres, saturated to `i16`; unknown altitude is 0
pub fn altitude_to_metres(altitude: Option<f32>) -> i16 {
    match altitude {
        Some(a) if a.is_finite() => a.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16,
        _ => 0,
    }
}

/// A fix the store should record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueFix {
    pub record: TelemetryRecord,
    pub at: DateTime<Utc>,
}

/// Polls a [`GpsSource`] and decides what gets stored
pub struct FixSampler<G> {
    source: G,
    latest: Option<Fix>,
    last_stored: Option<DateTime<Utc>>,
    min_spacing_s: i64,
    silent_polls: u32,
    timeout_polls: u32,
}

impl<G: GpsSource> FixSampler<G> {
    /// Sampler storing at most one fix per tick period
    pub fn new(source: G) -> Self {
        Self::with_spacing(source, TICK_SECONDS)
    }

    /// Sampler with a custom minimum spacing between stored fixes
    pub fn with_spacing(source: G, min_spacing_s: i64) -> Self {
        Self {
            source,
            latest: None,
            last_stored: None,
            min_spacing_s,
            silent_polls: 0,
            timeout_polls: FIX_TIMEOUT_POLLS,
        }
    }

    /// Forget the latest fix after `polls` consecutive polls without data
    pub fn with_fix_timeout(mut self, polls: u32) -> Self {
        self.timeout_polls = polls.max(1);
        self
    }

    /// Read at most one fix and return it if it should be stored
    ///
    /// Invalid fixes are never stored but still update [`latest`](Self::latest).
    /// A receiver that stays silent for the fix timeout clears `latest`.
    pub fn poll(&mut self) -> Option<DueFix> {
        let Some(fix) = self.source.read_fix() else {
            self.silent_polls = self.silent_polls.saturating_add(1);
            if self.silent_polls == self.timeout_polls && self.latest.take().is_some() {
                debug!("No GPS data for {} polls, dropping latest fix", self.timeout_polls);
            }
            return None;
        };
        self.silent_polls = 0;
        self.latest = Some(fix);

        if !fix.valid {
            trace!("Ignoring invalid fix ({} satellites)", fix.satellites);
            return None;
        }

        let due = match self.last_stored {
            None => true,
            Some(prev) => {
                let elapsed = (fix.timestamp - prev).num_seconds();
                // Receiver clock stepped back: resynchronize
                elapsed >= self.min_spacing_s || elapsed < 0
            }
        };

        if !due {
            return None;
        }

        self.last_stored = Some(fix.timestamp);
        Some(DueFix { record: fix.to_record(), at: fix.timestamp })
    }

    /// Most recent fix read, valid or not
    pub fn latest(&self) -> Option<&Fix> {
        self.latest.as_ref()
    }

    pub fn source_mut(&mut self) -> &mut G {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    const T0: i64 = 1_700_000_000;

    fn fix_at(seconds: i64, valid: bool) -> Fix {
        Fix {
            latitude: 48.1173,
            longitude: 11.516666,
            valid,
            satellites: 8,
            hdop: Some(0.9),
            altitude: Some(545.4),
            timestamp: DateTime::from_timestamp(T0 + seconds, 0).unwrap(),
        }
    }

    fn source_with(fixes: Vec<Option<Fix>>) -> MockGpsSource {
        let mut mock = MockGpsSource::new();
        let mut seq = Sequence::new();
        for fix in fixes {
            mock.expect_read_fix()
                .times(1)
                .in_sequence(&mut seq)
                .return_const(fix);
        }
        mock
    }

    #[test]
    fn test_degrees_to_e7() {
        assert_eq!(degrees_to_e7(0.0), 0);
        assert_eq!(degrees_to_e7(48.1173), 481_173_000);
        assert_eq!(degrees_to_e7(-122.4194155), -1_224_194_155);
        assert_eq!(degrees_to_e7(180.0), 1_800_000_000);
        assert_eq!(degrees_to_e7(1e12), i32::MAX);
        assert_eq!(degrees_to_e7(f64::NAN), 0);
    }

    #[test]
    fn test_hdop_to_centi() {
        assert_eq!(hdop_to_centi(Some(0.9)), 90);
        assert_eq!(hdop_to_centi(Some(99.99)), 9999);
        assert_eq!(hdop_to_centi(None), HDOP_UNKNOWN);
        assert_eq!(hdop_to_centi(Some(-1.0)), HDOP_UNKNOWN);
        assert_eq!(hdop_to_centi(Some(f32::NAN)), HDOP_UNKNOWN);
        assert_eq!(hdop_to_centi(Some(1e9)), HDOP_UNKNOWN - 1);
    }

    #[test]
    fn test_altitude_to_metres() {
        assert_eq!(altitude_to_metres(Some(545.4)), 545);
        assert_eq!(altitude_to_metres(Some(-12.6)), -13);
        assert_eq!(altitude_to_metres(Some(1e6)), i16::MAX);
        assert_eq!(altitude_to_metres(None), 0);
    }

    #[test]
    fn test_fix_to_record() {
        let record = fix_at(0, true).to_record();
        assert!(record.fix_valid);
        assert!(!record.gap);
        assert_eq!(record.latitude_e7, 481_173_000);
        assert_eq!(record.longitude_e7, 115_166_660);
        assert_eq!(record.satellites, 8);
        assert_eq!(record.hdop_centi, 90);
        assert_eq!(record.altitude_m, 545);
        assert_eq!(record.interval, 0);
        assert_eq!(record.sequence, 0);
    }

    #[test]
    fn test_first_valid_fix_is_due() {
        let mut sampler = FixSampler::new(source_with(vec![Some(fix_at(0, true))]));
        let due = sampler.poll().unwrap();
        assert_eq!(due.at, fix_at(0, true).timestamp);
        assert_eq!(due.record.latitude_e7, 481_173_000);
    }

    #[test]
    fn test_no_fix_available() {
        let mut sampler = FixSampler::new(source_with(vec![None]));
        assert!(sampler.poll().is_none());
        assert!(sampler.latest().is_none());
    }

    #[test]
    fn test_invalid_fix_not_stored_but_remembered() {
        let mut sampler = FixSampler::new(source_with(vec![Some(fix_at(0, false))]));
        assert!(sampler.poll().is_none());
        assert!(!sampler.latest().unwrap().valid);
    }

    #[test]
    fn test_fixes_spaced_by_tick_period() {
        let mut sampler = FixSampler::new(source_with(vec![
            Some(fix_at(0, true)),
            Some(fix_at(1, true)),
            Some(fix_at(9, true)),
            Some(fix_at(10, true)),
            Some(fix_at(15, true)),
            Some(fix_at(20, true)),
        ]));

        let stored: Vec<bool> = (0..6).map(|_| sampler.poll().is_some()).collect();
        assert_eq!(stored, vec![true, false, false, true, false, true]);
        assert_eq!(sampler.latest().unwrap().timestamp, fix_at(20, true).timestamp);
    }

    #[test]
    fn test_clock_step_back_resynchronizes() {
        let mut sampler = FixSampler::new(source_with(vec![
            Some(fix_at(100, true)),
            Some(fix_at(50, true)),
        ]));
        assert!(sampler.poll().is_some());
        assert!(sampler.poll().is_some());
    }

    #[test]
    fn test_silent_receiver_clears_latest() {
        let mut fixes = vec![Some(fix_at(0, true))];
        fixes.extend(std::iter::repeat(None).take(3));
        fixes.push(Some(fix_at(30, false)));
        fixes.extend(std::iter::repeat(None).take(2));
        let mut sampler = FixSampler::new(source_with(fixes)).with_fix_timeout(3);

        assert!(sampler.poll().is_some());
        sampler.poll();
        sampler.poll();
        assert!(sampler.latest().is_some());
        sampler.poll();
        assert!(sampler.latest().is_none());

        // Fresh data restarts the countdown
        sampler.poll();
        assert!(!sampler.latest().unwrap().valid);
        sampler.poll();
        sampler.poll();
        assert!(sampler.latest().is_some());
    }

    #[test]
    fn test_custom_spacing() {
        let mut sampler = FixSampler::with_spacing(
            source_with(vec![Some(fix_at(0, true)), Some(fix_at(5, true))]),
            5,
        );
        assert!(sampler.poll().is_some());
        assert!(sampler.poll().is_some());
    }
}
