//! # DNS Query Name Constants and Types
//!
//! Length limits of DNS names and the device identity that is appended to
//! every query: `S-{BASE32}.{DEVICE_ID}.{SUBDOMAIN}`.

use crate::error::{Result, TowlError};
use crate::store::RECORD_SIZE;

/// Maximum length of a full domain name in presentation form (RFC 1035)
pub const DNS_MAX_NAME_LENGTH: usize = 253;

/// Maximum length of a single label (RFC 1035)
pub const DNS_MAX_LABEL_LENGTH: usize = 63;

/// Prefix of the payload label
pub const PAYLOAD_PREFIX: &str = "S-";

/// Number of base32 characters needed for `bytes` input bytes (no padding)
///
/// Base32 expands 5 input bytes into 8 characters.
pub const fn base32_len(bytes: usize) -> usize {
    (bytes * 8).div_ceil(5)
}

/// Length of the payload label carrying `records` records
pub const fn payload_label_len(records: usize) -> usize {
    PAYLOAD_PREFIX.len() + base32_len(records * RECORD_SIZE)
}

/// Largest record count whose payload fits into one label
const fn max_records_per_label() -> usize {
    let mut n = 0;
    while payload_label_len(n + 1) <= DNS_MAX_LABEL_LENGTH {
        n += 1;
    }
    n
}

/// Records that fit into the payload label (2 for 16-byte records)
pub const MAX_RECORDS_PER_LABEL: usize = max_records_per_label();

// A single record must always fit into one label
const _: () = assert!(MAX_RECORDS_PER_LABEL >= 1);

/// Device identity within the collection authority's zone
///
/// Validated once at startup; every query built afterwards is guaranteed to
/// respect the DNS length limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    device_id: String,
    subdomain: String,
    max_batch: usize,
}

impl DeviceIdentity {
    /// Validate and build an identity
    ///
    /// # Arguments
    ///
    /// * `device_id` - Single DNS label identifying this device
    /// * `subdomain` - Zone served by the collection authority
    ///
    /// # Errors
    ///
    /// Returns `TowlError::Identity` if any label is empty, longer than 63
    /// characters, contains characters other than letters, digits and hyphen,
    /// starts or ends with a hyphen, or if the resulting suffix leaves no room
    /// for a single record within 253 characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use towl::dns::protocol::DeviceIdentity;
    ///
    /// let identity = DeviceIdentity::new("a01", "dns.example.com")?;
    /// assert_eq!(identity.suffix(), ".a01.dns.example.com");
    /// # Ok::<(), towl::error::TowlError>(())
    /// ```
    pub fn new(device_id: &str, subdomain: &str) -> Result<Self> {
        if device_id.contains('.') {
            return Err(TowlError::Identity(
                format!("device id '{}' must be a single label", device_id)
            ));
        }
        validate_label(device_id)?;

        let subdomain = subdomain.strip_suffix('.').unwrap_or(subdomain);
        for label in subdomain.split('.') {
            validate_label(label)?;
        }

        let suffix_len = 1 + device_id.len() + 1 + subdomain.len();
        let max_batch = (1..=MAX_RECORDS_PER_LABEL)
            .rev()
            .find(|&n| payload_label_len(n) + suffix_len <= DNS_MAX_NAME_LENGTH)
            .ok_or_else(|| TowlError::Identity(format!(
                "suffix of {} characters leaves no room for a record",
                suffix_len
            )))?;

        Ok(Self {
            device_id: device_id.to_string(),
            subdomain: subdomain.to_string(),
            max_batch,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    /// `.{DEVICE_ID}.{SUBDOMAIN}` appended after the payload label
    pub fn suffix(&self) -> String {
        format!(".{}.{}", self.device_id, self.subdomain)
    }

    /// Largest number of records one query can carry with this identity
    pub fn max_batch(&self) -> usize {
        self.max_batch
    }
}

/// Check one label against the letter-digit-hyphen rule and the length limit
fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > DNS_MAX_LABEL_LENGTH {
        return Err(TowlError::Identity(
            format!("label '{}' must be 1 to {} characters", label, DNS_MAX_LABEL_LENGTH)
        ));
    }

    if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(TowlError::Identity(
            format!("label '{}' may only contain letters, digits and hyphens", label)
        ));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(TowlError::Identity(
            format!("label '{}' must not start or end with a hyphen", label)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_limits() {
        assert_eq!(DNS_MAX_NAME_LENGTH, 253);
        assert_eq!(DNS_MAX_LABEL_LENGTH, 63);
        assert_eq!(PAYLOAD_PREFIX, "S-");
    }

    #[test]
    fn test_base32_len() {
        assert_eq!(base32_len(0), 0);
        assert_eq!(base32_len(5), 8);
        assert_eq!(base32_len(16), 26);
        assert_eq!(base32_len(32), 52);
        assert_eq!(base32_len(48), 77);
    }

    #[test]
    fn test_max_records_per_label_for_sixteen_byte_records() {
        // 2 + 52 = 54 fits, 2 + 77 = 79 does not
        assert_eq!(MAX_RECORDS_PER_LABEL, 2);
        assert!(payload_label_len(MAX_RECORDS_PER_LABEL) <= DNS_MAX_LABEL_LENGTH);
        assert!(payload_label_len(MAX_RECORDS_PER_LABEL + 1) > DNS_MAX_LABEL_LENGTH);
    }

    #[test]
    fn test_identity_default_constants() {
        let identity = DeviceIdentity::new("a01", "dns.example.com").unwrap();
        assert_eq!(identity.device_id(), "a01");
        assert_eq!(identity.subdomain(), "dns.example.com");
        assert_eq!(identity.suffix(), ".a01.dns.example.com");
        assert_eq!(identity.max_batch(), 2);
    }

    #[test]
    fn test_identity_strips_trailing_dot() {
        let identity = DeviceIdentity::new("a01", "dns.example.com.").unwrap();
        assert_eq!(identity.subdomain(), "dns.example.com");
    }

    #[test]
    fn test_identity_rejects_bad_labels() {
        assert!(DeviceIdentity::new("", "dns.example.com").is_err());
        assert!(DeviceIdentity::new("a.01", "dns.example.com").is_err());
        assert!(DeviceIdentity::new("a_01", "dns.example.com").is_err());
        assert!(DeviceIdentity::new("-a01", "dns.example.com").is_err());
        assert!(DeviceIdentity::new("a01", "dns..example.com").is_err());
        assert!(DeviceIdentity::new("a01", "").is_err());
        assert!(DeviceIdentity::new(&"x".repeat(64), "dns.example.com").is_err());
    }

    #[test]
    fn test_identity_long_suffix_shrinks_batch() {
        // Suffix long enough that two records no longer fit but one does
        let label = "z".repeat(63);
        let subdomain = format!("{0}.{0}.{0}.{1}", label, "z".repeat(5));
        let identity = DeviceIdentity::new("a01", &subdomain).unwrap();
        let suffix_len = identity.suffix().len();
        assert!(payload_label_len(2) + suffix_len > DNS_MAX_NAME_LENGTH);
        assert!(payload_label_len(1) + suffix_len <= DNS_MAX_NAME_LENGTH);
        assert_eq!(identity.max_batch(), 1);
    }

    #[test]
    fn test_identity_without_room_for_a_record() {
        let label = "z".repeat(63);
        let subdomain = format!("{0}.{0}.{0}.{1}", label, "z".repeat(30));
        assert!(DeviceIdentity::new("a01", &subdomain).is_err());
    }
}
