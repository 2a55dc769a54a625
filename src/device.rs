//! # Device Tick
//!
//! Composes the sampler, status indicator, telemetry store and uplink driver
//! into the single cooperative tick of the device.
//!
//! One call to [`Device::tick`] runs, in order:
//! 1. Poll the GPS source for at most one fix
//! 2. Update the status LED from the latest fix
//! 3. Push the fix into the store if it is due
//! 4. Step the uplink state machine once
//!
//! Nothing inside a tick blocks. All state is owned here and only mutated
//! through `&mut self`.

use tracing::debug;

use crate::config::CoreConfig;
use crate::gps::{FixSampler, GpsSource};
use crate::status::{StatusIndicator, StatusLed};
use crate::store::TelemetryStore;
use crate::uplink::{UplinkDriver, UplinkState, UplinkStats, WifiLink};

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// A fix was pushed into the store
    pub stored: bool,
    /// Duty now shown on the status LED
    pub duty: u16,
    /// Records buffered after the tick
    pub depth: usize,
    /// Uplink state after the tick
    pub uplink: UplinkState,
}

/// The whole device: collaborators plus core state
pub struct Device<G, L, S, const N: usize> {
    sampler: FixSampler<G>,
    indicator: StatusIndicator<S>,
    store: TelemetryStore<N>,
    driver: UplinkDriver,
    link: L,
    ticks: u64,
}

impl<G, L, S, const N: usize> Device<G, L, S, N>
where
    G: GpsSource,
    L: WifiLink,
    S: StatusLed,
{
    /// Assemble a device from its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Identity, interval ceiling and cooldown
    /// * `gps` - Fix source
    /// * `link` - WiFi collaborator used for reachability and queries
    /// * `led` - Status LED
    pub fn new(config: CoreConfig, gps: G, link: L, led: S) -> Self {
        Self {
            sampler: FixSampler::new(gps),
            indicator: StatusIndicator::new(led),
            store: TelemetryStore::new(config.max_interval),
            driver: UplinkDriver::new(config.identity, config.cooldown_ticks),
            link,
            ticks: 0,
        }
    }

    /// Run one tick
    pub fn tick(&mut self) -> TickReport {
        let due = self.sampler.poll();
        let duty = self.indicator.update(self.sampler.latest());

        let stored = match due {
            Some(fix) => {
                self.store.push(fix.record, fix.at);
                debug!("Stored fix at {} ({} buffered)", fix.at, self.store.depth());
                true
            }
            None => false,
        };

        let uplink = self.driver.step(&mut self.store, &mut self.link);
        self.ticks += 1;

        TickReport {
            stored,
            duty,
            depth: self.store.depth(),
            uplink,
        }
    }

    pub fn store(&self) -> &TelemetryStore<N> {
        &self.store
    }

    pub fn uplink_stats(&self) -> UplinkStats {
        self.driver.stats()
    }

    pub fn uplink_state(&self) -> UplinkState {
        self.driver.state()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn led(&self) -> &S {
        self.indicator.led()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FIX_TIMEOUT_POLLS, TSTORE_SZ};
    use crate::dns::decoder::decode_query_name;
    use crate::gps::{Fix, MockGpsSource};
    use crate::status::mocks::RecordingLed;
    use crate::status::fix_duty;
    use crate::uplink::link_trait::mocks::MockWifiLink;
    use chrono::DateTime;

    const T0: i64 = 1_700_000_000;

    fn fix_at(seconds: i64, valid: bool, satellites: u8) -> Fix {
        Fix {
            latitude: 51.5 + seconds as f64 * 1e-5,
            longitude: -0.12,
            valid,
            satellites,
            hdop: Some(1.2),
            altitude: Some(35.0),
            timestamp: DateTime::from_timestamp(T0 + seconds, 0).unwrap(),
        }
    }

    /// GPS mock replaying `fixes`, then reporting nothing
    fn scripted_gps(fixes: Vec<Fix>) -> MockGpsSource {
        let mut queue = fixes.into_iter();
        let mut mock = MockGpsSource::new();
        mock.expect_read_fix().returning(move || queue.next());
        mock
    }

    fn device<const N: usize>(
        gps: MockGpsSource,
        link: MockWifiLink,
    ) -> Device<MockGpsSource, MockWifiLink, RecordingLed, N> {
        let config = CoreConfig::from_constants(1).unwrap();
        Device::new(config, gps, link, RecordingLed::default())
    }

    #[test]
    fn test_tick_without_gps_data() {
        let mut device: Device<_, _, _, 8> = device(scripted_gps(vec![]), MockWifiLink::new());
        let report = device.tick();

        assert!(!report.stored);
        assert_eq!(report.duty, 0);
        assert_eq!(report.depth, 0);
        assert_eq!(report.uplink, UplinkState::Idle);
        assert_eq!(device.ticks(), 1);
    }

    #[test]
    fn test_valid_fix_stored_and_shown() {
        let gps = scripted_gps(vec![fix_at(0, true, 7)]);
        let mut device: Device<_, _, _, 8> = device(gps, MockWifiLink::new());

        let report = device.tick();
        assert!(report.stored);
        assert_eq!(report.depth, 1);
        assert_eq!(report.duty, fix_duty(7));
        assert_eq!(device.led().writes, vec![fix_duty(7)]);
    }

    #[test]
    fn test_led_off_when_receiver_goes_silent() {
        let gps = scripted_gps(vec![fix_at(0, true, 10)]);
        let mut device: Device<_, _, _, 8> = device(gps, MockWifiLink::new());

        assert_eq!(device.tick().duty, fix_duty(10));
        for _ in 1..FIX_TIMEOUT_POLLS {
            assert_eq!(device.tick().duty, fix_duty(10));
        }
        assert_eq!(device.tick().duty, 0);
        assert_eq!(device.led().writes, vec![fix_duty(10), 0]);
    }

    #[test]
    fn test_invalid_fix_only_reaches_indicator() {
        let gps = scripted_gps(vec![fix_at(0, false, 2)]);
        let mut device: Device<_, _, _, 8> = device(gps, MockWifiLink::new());

        let report = device.tick();
        assert!(!report.stored);
        assert_eq!(report.depth, 0);
        assert_eq!(report.duty, crate::status::DUTY_SEARCHING);
    }

    #[test]
    fn test_fix_pushed_before_uplink_step() {
        // Network already up: the fix from this tick is visible to the driver
        let gps = scripted_gps(vec![fix_at(0, true, 9)]);
        let mut device: Device<_, _, _, 8> = device(gps, MockWifiLink::reachable());

        assert_eq!(device.tick().uplink, UplinkState::NetworkDetected);
        assert_eq!(device.tick().uplink, UplinkState::Transmitting);
        let report = device.tick();
        assert_eq!(report.uplink, UplinkState::Cooldown { remaining: 1 });
        assert_eq!(report.depth, 0);
        assert_eq!(device.link().get_sent().len(), 1);
    }

    #[test]
    fn test_buffer_offline_then_drain_on_contact() {
        let fixes: Vec<Fix> = (0..TSTORE_SZ as i64 + 10).map(|i| fix_at(i * 10, true, 8)).collect();
        let link = MockWifiLink::new();
        let mut device: Device<_, _, _, TSTORE_SZ> = device(scripted_gps(fixes), link.clone());

        for _ in 0..TSTORE_SZ + 10 {
            device.tick();
        }
        assert_eq!(device.store().depth(), TSTORE_SZ);
        assert_eq!(device.store().evicted_count(), 10);

        link.set_reachable(true);
        for _ in 0..400 {
            device.tick();
        }
        assert_eq!(device.store().depth(), 0);
        assert_eq!(device.uplink_stats().records_committed, TSTORE_SZ as u64);

        // Oldest surviving record is the 11th fix, sequences stay contiguous
        let sequences: Vec<u16> = link
            .get_sent()
            .iter()
            .flat_map(|name| decode_query_name(name, "dns.example.com").unwrap().records)
            .map(|r| r.sequence)
            .collect();
        assert_eq!(sequences.len(), TSTORE_SZ);
        assert_eq!(sequences[0], 10);
        assert!(sequences.windows(2).all(|w| w[1] == w[0].wrapping_add(1)));
    }
}
