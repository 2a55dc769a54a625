//! # Opportunistic Uplink Module
//!
//! Drains the telemetry backlog whenever a network happens to be reachable.
//!
//! This module handles:
//! - The uplink state machine (idle, network detected, transmitting, cooldown)
//! - Batching backlog through the DNS encoder
//! - Committing drained records only after a query was dispatched
//! - The WiFi collaborator interface and a host UDP implementation
//!
//! Each call to [`UplinkDriver::step`] performs at most one transition, so the
//! driver never blocks the control loop. Delivery is at-least-once: a record
//! leaves the store only after its query was handed to the transport without
//! error, and a lost network never commits anything.

pub mod link_trait;
pub mod udp;

use tracing::{debug, info, warn};

pub use link_trait::{TransportError, WifiLink};

use crate::dns::encoder::encode;
use crate::dns::protocol::DeviceIdentity;
use crate::store::TelemetryStore;

/// Uplink state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkState {
    /// No known reachable network
    Idle,
    /// Access point in range, backlog not yet checked
    NetworkDetected,
    /// Next step encodes and sends one batch
    Transmitting,
    /// Waiting before the next query
    Cooldown { remaining: u32 },
}

/// Running uplink counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UplinkStats {
    /// Times the network came into reach after being unreachable
    pub contacts: u64,
    /// Queries dispatched without transport error
    pub queries_sent: u64,
    /// Records removed from the store after dispatch
    pub records_committed: u64,
    /// Dispatch attempts that failed
    pub send_failures: u64,
    /// Network lost between detection and dispatch
    pub contacts_lost: u64,
}

/// Opportunistic uplink state machine
#[derive(Debug, Clone)]
pub struct UplinkDriver {
    identity: DeviceIdentity,
    cooldown_ticks: u32,
    state: UplinkState,
    stats: UplinkStats,
    in_contact: bool,
}

impl UplinkDriver {
    /// Create an idle driver
    ///
    /// # Arguments
    ///
    /// * `identity` - Identity appended to every query
    /// * `cooldown_ticks` - Steps to wait after each query (0 = none)
    pub fn new(identity: DeviceIdentity, cooldown_ticks: u32) -> Self {
        Self {
            identity,
            cooldown_ticks,
            state: UplinkState::Idle,
            stats: UplinkStats::default(),
            in_contact: false,
        }
    }

    /// Advance the state machine by one transition
    ///
    /// # Returns
    ///
    /// * `UplinkState` - State after this step
    pub fn step<const N: usize, L: WifiLink>(
        &mut self,
        store: &mut TelemetryStore<N>,
        link: &mut L,
    ) -> UplinkState {
        self.state = match self.state {
            UplinkState::Idle => {
                if self.observe(link) {
                    UplinkState::NetworkDetected
                } else {
                    UplinkState::Idle
                }
            }

            UplinkState::NetworkDetected => {
                if store.is_empty() {
                    UplinkState::Idle
                } else if !self.observe(link) {
                    self.stats.contacts_lost += 1;
                    UplinkState::Idle
                } else {
                    UplinkState::Transmitting
                }
            }

            UplinkState::Transmitting => self.transmit(store, link),

            UplinkState::Cooldown { remaining } if remaining > 1 => {
                UplinkState::Cooldown { remaining: remaining - 1 }
            }

            UplinkState::Cooldown { .. } => UplinkState::Idle,
        };

        self.state
    }

    /// Query reachability, logging only when it changes
    fn observe<L: WifiLink>(&mut self, link: &mut L) -> bool {
        let reachable = link.network_reachable();

        if reachable && !self.in_contact {
            self.stats.contacts += 1;
            debug!("Network detected (contact {})", self.stats.contacts);
        } else if !reachable && self.in_contact {
            debug!("Network lost");
        }

        self.in_contact = reachable;
        reachable
    }

    /// Encode, send and commit one batch within a single step
    fn transmit<const N: usize, L: WifiLink>(
        &mut self,
        store: &mut TelemetryStore<N>,
        link: &mut L,
    ) -> UplinkState {
        if !self.observe(link) {
            debug!("Backlog kept for the next contact");
            self.stats.contacts_lost += 1;
            return UplinkState::Idle;
        }

        let Some(query) = encode(store.peek_backlog(self.identity.max_batch()), &self.identity) else {
            return UplinkState::Idle;
        };

        match link.send_query(&query.name) {
            Ok(()) => {
                let committed = store.commit_drain(query.consumed);
                self.stats.queries_sent += 1;
                self.stats.records_committed += committed as u64;
                debug!("Sent {} ({} records, {} remaining)", query.name, committed, store.depth());

                if store.is_empty() {
                    info!("Backlog drained after {} queries", self.stats.queries_sent);
                }

                if self.cooldown_ticks == 0 {
                    UplinkState::Idle
                } else {
                    UplinkState::Cooldown { remaining: self.cooldown_ticks }
                }
            }
            Err(e) => {
                warn!("Query dispatch failed: {}", e);
                self.stats.send_failures += 1;
                UplinkState::Idle
            }
        }
    }

    pub fn state(&self) -> UplinkState {
        self.state
    }

    pub fn stats(&self) -> UplinkStats {
        self.stats
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}
