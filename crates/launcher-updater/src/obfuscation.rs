//! Decoding of the obfuscated server blob shipped next to the launcher.
//!
//! The blob is a 19-byte header followed by a payload encoded with a rolling
//! additive key. Byte 10 of the header seeds the key; after each payload byte
//! is decoded the key advances by the *encoded* byte value. All arithmetic
//! wraps at 8 bits.

use std::fs;
use std::path::Path;

use crate::error::{Result, UpdateError};

/// Length of the blob header.
pub const HEADER_LEN: usize = 19;

/// Index of the key seed within the header.
pub const SEED_INDEX: usize = 10;

/// A blob split into its header and still-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscatedBlob {
    header: [u8; HEADER_LEN],
    payload: Vec<u8>,
}

impl ObfuscatedBlob {
    /// Split raw blob bytes into header and payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(UpdateError::Config(format!(
                "server blob is {} bytes, expected at least {HEADER_LEN}",
                bytes.len()
            )));
        }
        let (head, payload) = bytes.split_at(HEADER_LEN);
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(head);
        Ok(Self {
            header,
            payload: payload.to_vec(),
        })
    }

    /// Read a blob from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            UpdateError::Config(format!("cannot read server blob {}: {e}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    /// The header bytes, kept apart from the decoded payload.
    #[must_use]
    pub fn header(&self) -> &[u8; HEADER_LEN] {
        &self.header
    }

    /// Decode the payload to text.
    ///
    /// Bytes outside the ASCII range decode to `?`.
    #[must_use]
    pub fn decode(&self) -> String {
        let mut key = self.header[SEED_INDEX];
        let decoded: Vec<u8> = self
            .payload
            .iter()
            .map(|&byte| {
                let plain = byte.wrapping_sub(key);
                key = key.wrapping_add(byte);
                plain
            })
            .collect();

        if !decoded.is_ascii() {
            tracing::warn!("server blob decoded to non-ASCII bytes");
        }
        decoded
            .into_iter()
            .map(|b| if b.is_ascii() { char::from(b) } else { '?' })
            .collect()
    }
}

/// Decode a raw blob into its text payload.
pub fn decode(bytes: &[u8]) -> Result<String> {
    Ok(ObfuscatedBlob::from_bytes(bytes)?.decode())
}

/// Encode text into a blob with the given header.
#[must_use]
pub fn encode(text: &str, header: &[u8; HEADER_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + text.len());
    out.extend_from_slice(header);

    let mut key = header[SEED_INDEX];
    for &plain in text.as_bytes() {
        let byte = plain.wrapping_add(key);
        key = key.wrapping_add(byte);
        out.push(byte);
    }
    out
}

/// Build a header whose only meaningful byte is the key seed.
#[must_use]
pub fn header_with_seed(seed: u8) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[SEED_INDEX] = seed;
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://203.0.113.7/Launcher/";

    #[test]
    fn test_round_trip_with_seed() {
        let mut header = header_with_seed(0xA7);
        header[0] = 0x13;
        header[18] = 0xFE;

        let blob = encode(URL, &header);
        assert_eq!(blob.len(), HEADER_LEN + URL.len());
        assert_eq!(decode(&blob).unwrap(), URL);
        assert_eq!(ObfuscatedBlob::from_bytes(&blob).unwrap().header(), &header);
    }

    #[test]
    fn test_key_advances_by_encoded_byte() {
        // seed 5: 'A'(65) -> 70, key 75; 'B'(66) -> 141, key 216
        let mut blob = header_with_seed(5).to_vec();
        blob.extend_from_slice(&[70, 141]);
        assert_eq!(decode(&blob).unwrap(), "AB");

        // Advancing by the decoded byte instead gives a different second char.
        let wrong_key = 5u8.wrapping_add(65);
        assert_ne!(141u8.wrapping_sub(wrong_key), b'B');
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let header = header_with_seed(0xFF);
        let text = "~~~~~~~~";
        assert_eq!(decode(&encode(text, &header)).unwrap(), text);
    }

    #[test]
    fn test_short_blob_is_config_error() {
        let err = decode(&[0u8; HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(err, UpdateError::Config(_)));
    }

    #[test]
    fn test_header_only_decodes_empty() {
        assert_eq!(decode(&header_with_seed(9)).unwrap(), "");
    }
}
