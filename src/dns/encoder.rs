//! # Backlog Encoder
//!
//! Serializes buffered records into a DNS query name:
//! `S-{BASE32}.{DEVICE_ID}.{SUBDOMAIN}`.

use super::base32;
use super::protocol::*;
use crate::store::{TelemetryRecord, RECORD_SIZE};

/// A query name ready to be sent, plus how many records it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedQuery {
    /// Complete query name
    pub name: String,

    /// Records consumed from the front of the input
    pub consumed: usize,
}

/// Encode as many records as fit into one query name
///
/// Takes records in order from the front of `records` until the identity's
/// batch limit is reached; the rest are left for the next query.
///
/// # Arguments
///
/// * `records` - Oldest-first records (typically a store backlog view)
/// * `identity` - Validated device identity
///
/// # Returns
///
/// * `Option<EncodedQuery>` - `None` when there is nothing to send
///
/// # Examples
///
/// ```
/// use towl::dns::encoder::encode;
/// use towl::dns::protocol::DeviceIdentity;
/// use towl::store::TelemetryRecord;
///
/// let identity = DeviceIdentity::new("a01", "dns.example.com")?;
/// let records = [TelemetryRecord::default(); 3];
///
/// let query = encode(&records, &identity).unwrap();
/// assert_eq!(query.consumed, 2);
/// assert!(query.name.starts_with("S-"));
/// assert!(query.name.ends_with(".a01.dns.example.com"));
/// # Ok::<(), towl::error::TowlError>(())
/// ```
pub fn encode<'a, I>(records: I, identity: &DeviceIdentity) -> Option<EncodedQuery>
where
    I: IntoIterator<Item = &'a TelemetryRecord>,
{
    let mut payload = [0u8; MAX_RECORDS_PER_LABEL * RECORD_SIZE];
    let mut consumed = 0;

    for record in records.into_iter().take(identity.max_batch()) {
        payload[consumed * RECORD_SIZE..(consumed + 1) * RECORD_SIZE]
            .copy_from_slice(&record.to_bytes());
        consumed += 1;
    }

    if consumed == 0 {
        return None;
    }

    let mut name = String::with_capacity(DNS_MAX_NAME_LENGTH);
    name.push_str(PAYLOAD_PREFIX);
    base32::encode_into(&payload[..consumed * RECORD_SIZE], &mut name);
    name.push_str(&identity.suffix());

    debug_assert!(name.len() <= DNS_MAX_NAME_LENGTH);
    debug_assert!(name.split('.').all(|label| label.len() <= DNS_MAX_LABEL_LENGTH));

    Some(EncodedQuery { name, consumed })
}

/// Base32 payload for a batch of records, without prefix or suffix
///
/// No length limit is applied.
pub fn encode_payload(records: &[TelemetryRecord]) -> String {
    let bytes: Vec<u8> = records.iter().flat_map(|r| r.to_bytes()).collect();
    base32::encode(&bytes)
}
