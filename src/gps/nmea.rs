//! # NMEA GPS Source
//!
//! Host-side [`GpsSource`] reading `GGA` sentences from a serial receiver.
//!
//! The serial reader runs as its own task and publishes the latest fix on a
//! `watch` channel; `read_fix` only checks the channel and never blocks the
//! control loop.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use super::{Fix, GpsSource};
use crate::error::{Result, TowlError};

/// Parse a `$xxGGA` sentence
///
/// The sentence time of day is placed on the UTC date of `now`, moving one day
/// back or forward when that lands more than 12 hours away (midnight rollover).
///
/// # Returns
///
/// * `Option<Fix>` - `None` for other sentence types, non-ASCII line noise,
///   malformed fields or a checksum mismatch
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use towl::gps::nmea::parse_gga;
///
/// let fix = parse_gga(
///     "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
///     Utc::now(),
/// ).unwrap();
/// assert!(fix.valid);
/// assert_eq!(fix.satellites, 8);
/// ```
pub fn parse_gga(sentence: &str, now: DateTime<Utc>) -> Option<Fix> {
    // NMEA is 7-bit; anything else is corruption on the wire
    if !sentence.is_ascii() {
        return None;
    }

    let body = sentence.strip_prefix('$')?;
    let body = match body.split_once('*') {
        Some((data, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).ok()?;
            let actual = data.bytes().fold(0u8, |acc, b| acc ^ b);
            if actual != expected {
                debug!("NMEA checksum mismatch: expected {:02X}, got {:02X}", expected, actual);
                return None;
            }
            data
        }
        None => body,
    };

    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() < 10 || parts[0].len() != 5 || !parts[0].ends_with("GGA") {
        return None;
    }

    let quality: u8 = parts[6].parse().unwrap_or(0);
    let latitude = parse_deg_min(parts[2], parts[3]);
    let longitude = parse_deg_min(parts[4], parts[5]);
    let valid = quality > 0 && latitude.is_some() && longitude.is_some();

    Some(Fix {
        latitude: latitude.unwrap_or(0.0),
        longitude: longitude.unwrap_or(0.0),
        valid,
        satellites: parts[7].parse().unwrap_or(0),
        hdop: parts[8].parse().ok(),
        altitude: parts[9].parse().ok(),
        timestamp: fix_time(parts[1], now).unwrap_or(now),
    })
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed degrees
fn parse_deg_min(value: &str, hemisphere: &str) -> Option<f64> {
    let dot = value.find('.').unwrap_or(value.len());
    if dot < 3 {
        return None;
    }

    let degrees: f64 = value.get(..dot - 2)?.parse().ok()?;
    let minutes: f64 = value.get(dot - 2..)?.parse().ok()?;
    let unsigned = degrees + minutes / 60.0;

    match hemisphere {
        "N" | "E" => Some(unsigned),
        "S" | "W" => Some(-unsigned),
        _ => None,
    }
}

/// Place an `hhmmss[.ss]` time of day next to `now`
fn fix_time(hhmmss: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let whole = hhmmss.split('.').next()?;
    let time = NaiveTime::parse_from_str(whole, "%H%M%S").ok()?;
    let candidate = now.date_naive().and_time(time).and_utc();

    let half_day = Duration::hours(12);
    Some(if candidate - now > half_day {
        candidate - Duration::days(1)
    } else if now - candidate > half_day {
        candidate + Duration::days(1)
    } else {
        candidate
    })
}

/// Read NMEA lines until EOF, publishing every parsed GGA fix
///
/// # Returns
///
/// * `Result<u64>` - Number of fixes published
///
/// # Errors
///
/// Returns `TowlError::Io` if reading fails.
pub async fn run_nmea_reader<R>(mut reader: R, tx: watch::Sender<Option<Fix>>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(128);
    let mut published = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(published);
        }

        let text = String::from_utf8_lossy(&line);
        let Some(fix) = parse_gga(text.trim(), Utc::now()) else {
            trace!("Skipping NMEA line: {}", text.trim());
            continue;
        };

        if tx.send(Some(fix)).is_err() {
            debug!("GPS fix receiver dropped, stopping NMEA reader");
            return Ok(published);
        }
        published += 1;
    }
}

/// [`GpsSource`] fed by a `watch` channel
pub struct NmeaGpsSource {
    rx: watch::Receiver<Option<Fix>>,
}

impl NmeaGpsSource {
    pub fn new(rx: watch::Receiver<Option<Fix>>) -> Self {
        Self { rx }
    }

    /// Open the receiver's serial port and start the reader task
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `TowlError::Serial` if the port cannot be opened.
    pub fn spawn_serial(path: &str, baud_rate: u32) -> Result<Self> {
        let port = open_serial(path, baud_rate)?;
        info!("Opened GPS receiver at {} ({} baud)", path, baud_rate);

        let (tx, rx) = watch::channel(None);
        let path = path.to_string();
        tokio::spawn(async move {
            match run_nmea_reader(BufReader::new(port), tx).await {
                Ok(count) => info!("NMEA stream from {} ended after {} fixes", path, count),
                Err(e) => warn!("NMEA reader on {} failed: {}", path, e),
            }
        });

        Ok(Self::new(rx))
    }
}

impl GpsSource for NmeaGpsSource {
    fn read_fix(&mut self) -> Option<Fix> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        *self.rx.borrow_and_update()
    }
}

/// Open a serial port 8N1 for an NMEA receiver
fn open_serial(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| TowlError::Serial(format!("Failed to open {}: {}", path, e)))
}
