//! # TOWL Library
//!
//! Telemetry over Opportunistic WiFi Links.
//!
//! A GPS tracker buffers fixes in a fixed-size ring of 16-byte records and,
//! whenever any WiFi network comes into range, drains the backlog as DNS
//! lookups of the form `S-{BASE32}.{DEVICE_ID}.{SUBDOMAIN}`. The collection
//! authority serving `SUBDOMAIN` reconstructs the track from the query names
//! it sees.

pub mod config;
pub mod device;
pub mod dns;
pub mod error;
pub mod gps;
pub mod status;
pub mod store;
pub mod uplink;
