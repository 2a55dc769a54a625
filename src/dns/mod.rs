//! # DNS Exfiltration Protocol Module
//!
//! Carries telemetry records inside DNS query names.
//!
//! This module handles:
//! - DNS name/label length limits and device identity validation
//! - Base32 encoding (case-insensitive alphabet safe in DNS labels)
//! - Batching records into `S-{BASE32}.{DEVICE_ID}.{SUBDOMAIN}` names
//! - Decoding names back into records on the collection side

pub mod protocol;
pub mod base32;
pub mod encoder;
pub mod decoder;
