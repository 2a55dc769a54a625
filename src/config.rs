//! # Configuration Module
//!
//! Two layers of configuration:
//!
//! - Compile-time constants for everything that shapes the wire format and the
//!   memory footprint (device identity, store capacity, interval ceiling).
//! - A host TOML file for the plumbing around the core (GPS serial port,
//!   resolver address, loop period, cooldown).

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::dns::protocol::DeviceIdentity;
use crate::error::{Result, TowlError};

/// Device label embedded verbatim in every query
pub const DEVICE_ID: &str = "a01";

/// DNS zone served by the collection authority
pub const SUBDOMAIN: &str = "dns.example.com";

/// Maximum number of telemetry entries to backlog (16 bytes each)
pub const TSTORE_SZ: usize = 150;

/// Highest interval tracked per record, in ticks (18 ticks = 3 minutes)
pub const MAX_INTERVAL: u8 = 18;

/// Length of one interval tick in seconds
pub const TICK_SECONDS: i64 = 10;

/// Polls without receiver data before the last fix is considered gone
pub const FIX_TIMEOUT_POLLS: u32 = 50;

/// NMEA receiver baud rate
pub const GPS_BAUD: u32 = 9600;

/// Baud rates accepted for the GPS serial port
const VALID_GPS_BAUD_RATES: &[u32] = &[4800, 9600, 19200, 38400, 57600, 115200];

/// Immutable settings injected into the core once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Identity appended to every query name
    pub identity: DeviceIdentity,

    /// Interval ceiling in ticks before gap records are inserted
    pub max_interval: u8,

    /// Loop iterations to wait between two queries
    pub cooldown_ticks: u32,
}

impl CoreConfig {
    /// Build the core configuration from the compile-time constants
    ///
    /// # Errors
    ///
    /// Returns `TowlError::Identity` if `DEVICE_ID`/`SUBDOMAIN` cannot form a
    /// query name with room for at least one record.
    pub fn from_constants(cooldown_ticks: u32) -> Result<Self> {
        Ok(Self {
            identity: DeviceIdentity::new(DEVICE_ID, SUBDOMAIN)?,
            max_interval: MAX_INTERVAL,
            cooldown_ticks,
        })
    }
}

/// Host runtime configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub uplink: UplinkConfig,
    #[serde(default)]
    pub device: LoopConfig,
}

/// GPS receiver serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_gps_port")]
    pub port: String,

    #[serde(default = "default_gps_baud_rate")]
    pub baud_rate: u32,
}

/// DNS uplink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UplinkConfig {
    /// Resolver that receives the queries (usually the AP's DNS forwarder)
    #[serde(default = "default_resolver")]
    pub resolver: String,

    #[serde(default = "default_cooldown_ticks")]
    pub cooldown_ticks: u32,
}

/// Control loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoopConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self { port: default_gps_port(), baud_rate: default_gps_baud_rate() }
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self { resolver: default_resolver(), cooldown_ticks: default_cooldown_ticks() }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { tick_interval_ms: default_tick_interval_ms() }
    }
}

// Default value functions
fn default_gps_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_gps_baud_rate() -> u32 { GPS_BAUD }

fn default_resolver() -> String { "192.168.4.1:53".to_string() }
fn default_cooldown_ticks() -> u32 { 5 }

fn default_tick_interval_ms() -> u64 { 100 }

impl HostConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails or
    /// validation fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use towl::config::HostConfig;
    ///
    /// let config = HostConfig::load("config/towl.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed resolver socket address
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `uplink.resolver` is not `ip:port`.
    pub fn resolver_addr(&self) -> Result<SocketAddr> {
        self.uplink.resolver.parse().map_err(|e| {
            TowlError::Config(toml::de::Error::custom(format!(
                "resolver '{}' is not a socket address: {}",
                self.uplink.resolver, e
            )))
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.gps.port.is_empty() {
            return Err(TowlError::Config(
                toml::de::Error::custom("gps port cannot be empty")
            ));
        }

        if !VALID_GPS_BAUD_RATES.contains(&self.gps.baud_rate) {
            return Err(TowlError::Config(
                toml::de::Error::custom("gps baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200")
            ));
        }

        self.resolver_addr()?;

        if self.uplink.cooldown_ticks == 0 || self.uplink.cooldown_ticks > 600 {
            return Err(TowlError::Config(
                toml::de::Error::custom("cooldown_ticks must be between 1 and 600")
            ));
        }

        if self.device.tick_interval_ms == 0 || self.device.tick_interval_ms > 60000 {
            return Err(TowlError::Config(
                toml::de::Error::custom("tick_interval_ms must be between 1 and 60000")
            ));
        }

        Ok(())
    }
}
