//! # TOWL
//!
//! Host runtime for the TOWL tracker: reads an NMEA GPS receiver, buffers fixes
//! and sends them as DNS queries whenever the configured resolver is reachable.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use towl::config::{CoreConfig, HostConfig, TSTORE_SZ};
use towl::device::Device;
use towl::gps::nmea::NmeaGpsSource;
use towl::status::LogLed;
use towl::uplink::udp::UdpDnsLink;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/towl.toml";

/// Number of ticks between status log messages
const LOG_INTERVAL_TICKS: u64 = 600;

/// Main entry point for the TOWL host runtime
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with a non-blocking tracing subscriber
///    - Load host configuration (argument, `config/towl.toml`, or defaults)
///    - Open the GPS receiver and bind the DNS uplink socket
///
/// 2. **Main Loop**
///    - Run one device tick per `tick_interval_ms`
///    - Log store and uplink status every 600 ticks
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - The configuration file is invalid
/// - The GPS serial port cannot be opened
/// - The uplink socket cannot be bound
///
/// # Examples
///
/// ```bash
/// RUST_LOG=towl=debug cargo run --release -- config/towl.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let _guard = setup_logging();

    info!("TOWL v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(std::env::args().nth(1).map(PathBuf::from))?;
    let core = CoreConfig::from_constants(config.uplink.cooldown_ticks)
        .context("Invalid compile-time device identity")?;
    info!(
        "Device '{}' reporting to {} (batch of {} records per query)",
        core.identity.device_id(),
        core.identity.subdomain(),
        core.identity.max_batch()
    );

    let gps = NmeaGpsSource::spawn_serial(&config.gps.port, config.gps.baud_rate)
        .context("Failed to start GPS receiver")?;
    let link = UdpDnsLink::bind(config.resolver_addr()?)
        .context("Failed to bind DNS uplink socket")?;

    let mut device: Device<_, _, _, TSTORE_SZ> = Device::new(core, gps, link, LogLed);

    let mut ticker = interval(Duration::from_millis(config.device.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting control loop every {}ms", config.device.tick_interval_ms);
    info!("Press Ctrl+C to exit");

    let mut last_log_tick: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                device.tick();

                if device.ticks() - last_log_tick >= LOG_INTERVAL_TICKS {
                    let stats = device.uplink_stats();
                    info!(
                        "Buffered {}/{} records, {} evicted; {} contacts, sent {} queries ({} records), {} failures",
                        device.store().depth(),
                        device.store().capacity(),
                        device.store().evicted_count(),
                        stats.contacts,
                        stats.queries_sent,
                        stats.records_committed,
                        stats.send_failures
                    );
                    last_log_tick = device.ticks();
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("{} records still buffered after {} ticks", device.store().depth(), device.ticks());
                break;
            }
        }
    }

    Ok(())
}

/// Install the global subscriber, writing to stdout from a background thread
fn setup_logging() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();

    guard
}

/// Load the host configuration
///
/// An explicit path must exist. Without one, `config/towl.toml` is used if
/// present, otherwise built-in defaults.
fn load_config(path: Option<PathBuf>) -> Result<HostConfig> {
    let path = match path {
        Some(p) => p,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => PathBuf::from(DEFAULT_CONFIG_PATH),
        None => {
            warn!("No configuration file found, using defaults");
            return Ok(HostConfig::default());
        }
    };

    let config = HostConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_interval_constant() {
        // At the default 100ms loop period, 600 ticks = 1 minute
        assert_eq!(LOG_INTERVAL_TICKS * HostConfig::default().device.tick_interval_ms, 60_000);
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[uplink]\ncooldown_ticks = 9\n").unwrap();

        let config = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.uplink.cooldown_ticks, 9);
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let result = load_config(Some(PathBuf::from("/nonexistent/towl.toml")));
        assert!(result.is_err());
    }
}
