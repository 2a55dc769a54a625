//! # Base32 Codec
//!
//! RFC 4648 base32 without padding, as used in the payload label.
//!
//! **Alphabet**: `A-Z2-7` (encoding emits uppercase, decoding is case-insensitive)
//!
//! Base32 instead of base64 because DNS labels are case-insensitive and only
//! letters, digits and hyphens survive every resolver.

use thiserror::Error;

/// RFC 4648 base32 alphabet
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Marker for bytes outside the alphabet
const INVALID: u8 = 0xFF;

/// Reverse lookup table, generated at compile time
const DECODE_TABLE: [u8; 256] = generate_decode_table();

const fn generate_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;

    while i < 32 {
        let c = ALPHABET[i];
        table[c as usize] = i as u8;
        // Lowercase letters decode like uppercase
        if c.is_ascii_uppercase() {
            table[c.to_ascii_lowercase() as usize] = i as u8;
        }
        i += 1;
    }

    table
}

/// Base32 decoding failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Base32Error {
    /// Byte at the given offset is not in the alphabet
    #[error("invalid base32 character at offset {0}")]
    InvalidCharacter(usize),

    /// Length cannot result from encoding whole bytes
    #[error("invalid base32 length {0}")]
    InvalidLength(usize),

    /// Unused trailing bits are not zero
    #[error("non-zero trailing bits")]
    NonCanonical,
}

/// Append the base32 encoding of `data` to `out`
///
/// Bits are consumed MSB first, 5 at a time; the final group is zero-padded
/// on the right.
///
/// # Examples
///
/// ```
/// use towl::dns::base32::encode_into;
///
/// let mut out = String::new();
/// encode_into(b"foobar", &mut out);
/// assert_eq!(out, "MZXW6YTBOI");
/// ```
pub fn encode_into(data: &[u8], out: &mut String) {
    out.reserve((data.len() * 8).div_ceil(5));

    let mut buffer: u16 = 0;
    let mut bits = 0;

    for &byte in data {
        buffer = (buffer << 8) | byte as u16;
        bits += 8;

        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }

    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
}

/// Base32-encode `data` into a new string
pub fn encode(data: &[u8]) -> String {
    let mut out = String::new();
    encode_into(data, &mut out);
    out
}

/// Decode unpadded base32 text
///
/// # Errors
///
/// Returns `Base32Error` for characters outside the alphabet, lengths that no
/// byte string encodes to (1, 3 or 6 modulo 8), or non-zero padding bits.
pub fn decode(text: &str) -> Result<Vec<u8>, Base32Error> {
    if matches!(text.len() % 8, 1 | 3 | 6) {
        return Err(Base32Error::InvalidLength(text.len()));
    }

    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u16 = 0;
    let mut bits = 0;

    for (offset, byte) in text.bytes().enumerate() {
        let value = DECODE_TABLE[byte as usize];
        if value == INVALID {
            return Err(Base32Error::InvalidCharacter(offset));
        }

        buffer = ((buffer << 5) | value as u16) & 0x1FFF;
        bits += 5;

        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }

    if buffer & ((1 << bits) - 1) != 0 {
        return Err(Base32Error::NonCanonical);
    }

    Ok(out)
}
