//! # Query Name Decoder
//!
//! Collection-authority side: recovers device id and records from the query
//! names seen by the authoritative resolver.

use super::base32;
use super::protocol::*;
use crate::error::{Result, TowlError};
use crate::store::{TelemetryRecord, RECORD_SIZE};

/// Records carried by one query name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedQuery {
    /// Device label, lowercased
    pub device_id: String,

    /// Records in transmission order
    pub records: Vec<TelemetryRecord>,
}

/// Decode a full query name
///
/// # Arguments
///
/// * `name` - Query name, case-insensitive, with or without trailing dot
/// * `subdomain` - Zone the collection authority serves
///
/// # Errors
///
/// Returns `TowlError::Decode` if the name exceeds DNS limits, is outside
/// `subdomain`, lacks the `S-` payload label or a device label, or if the
/// payload is not a whole number of valid records.
///
/// # Examples
///
/// ```
/// use towl::dns::decoder::decode_query_name;
/// use towl::dns::encoder::encode;
/// use towl::dns::protocol::DeviceIdentity;
/// use towl::store::TelemetryRecord;
///
/// let identity = DeviceIdentity::new("a01", "dns.example.com")?;
/// let records = [TelemetryRecord { satellites: 5, ..Default::default() }];
/// let query = encode(&records, &identity).unwrap();
///
/// let decoded = decode_query_name(&query.name, "dns.example.com")?;
/// assert_eq!(decoded.device_id, "a01");
/// assert_eq!(decoded.records, records);
/// # Ok::<(), towl::error::TowlError>(())
/// ```
pub fn decode_query_name(name: &str, subdomain: &str) -> Result<DecodedQuery> {
    let name = name.strip_suffix('.').unwrap_or(name);
    let subdomain = subdomain.strip_suffix('.').unwrap_or(subdomain);

    if name.len() > DNS_MAX_NAME_LENGTH {
        return Err(TowlError::Decode(
            format!("name length {} exceeds {}", name.len(), DNS_MAX_NAME_LENGTH)
        ));
    }

    if let Some(label) = name.split('.').find(|l| l.len() > DNS_MAX_LABEL_LENGTH) {
        return Err(TowlError::Decode(
            format!("label of {} characters exceeds {}", label.len(), DNS_MAX_LABEL_LENGTH)
        ));
    }

    let name = name.to_ascii_lowercase();
    let zone = format!(".{}", subdomain.to_ascii_lowercase());
    let head = name.strip_suffix(zone.as_str()).ok_or_else(|| {
        TowlError::Decode(format!("'{}' is not under {}", name, subdomain))
    })?;

    let (payload_label, device_id) = head.split_once('.').ok_or_else(|| {
        TowlError::Decode(format!("'{}' has no device label", name))
    })?;

    if device_id.is_empty() || device_id.contains('.') {
        return Err(TowlError::Decode(
            format!("invalid device label '{}'", device_id)
        ));
    }

    let prefix = PAYLOAD_PREFIX.to_ascii_lowercase();
    let payload = payload_label.strip_prefix(prefix.as_str()).ok_or_else(|| {
        TowlError::Decode(format!("payload label '{}' lacks {} prefix", payload_label, PAYLOAD_PREFIX))
    })?;

    Ok(DecodedQuery {
        device_id: device_id.to_string(),
        records: decode_payload(payload)?,
    })
}

/// Decode a base32 payload into records
///
/// # Errors
///
/// Returns `TowlError::Base32` for invalid base32 and `TowlError::Decode` for
/// an empty payload, a length that is not a multiple of 16 bytes, or a record
/// with reserved bits set.
pub fn decode_payload(payload: &str) -> Result<Vec<TelemetryRecord>> {
    let bytes = base32::decode(payload)?;

    if bytes.is_empty() || bytes.len() % RECORD_SIZE != 0 {
        return Err(TowlError::Decode(
            format!("payload of {} bytes is not a whole number of records", bytes.len())
        ));
    }

    bytes.chunks_exact(RECORD_SIZE).map(TelemetryRecord::from_bytes).collect()
}

/// Find TOWL query names for `subdomain` in a free-form log line
///
/// Tokens are split on whitespace and common log punctuation; a token is a
/// candidate when it starts with the payload prefix and ends in `subdomain`.
pub fn find_query_names<'a>(line: &'a str, subdomain: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let zone = subdomain.strip_suffix('.').unwrap_or(subdomain);

    line.split(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | ';' | '(' | ')' | '[' | ']' | '/'))
        .map(move |token| {
            let token = token.strip_suffix('.').unwrap_or(token);
            // Resolver logs often append "#port" or ":" to names
            token.split(['#', ':']).next().unwrap_or(token)
        })
        .filter(move |token| {
            let lower = token.to_ascii_lowercase();
            lower.starts_with("s-") && lower.ends_with(&format!(".{}", zone.to_ascii_lowercase()))
        })
}
