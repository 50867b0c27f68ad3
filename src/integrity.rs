// CLASSIFICATION: COMMUNITY
// Filename: integrity.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! CRC32 tamper detection over the EARS namespace record.
//!
//! The checksum is the reflected IEEE CRC32 (polynomial `0xEDB88320`),
//! computed one bit at a time. The record checksum covers `VERSION`,
//! `ZAPNUMBER` and `PASSWORD_HASH` in that order; the order and the
//! byte encoding are part of the on-flash format and must not change.

/// Reflected IEEE polynomial.
pub const CRC32_POLY: u32 = 0xEDB8_8320;
const CRC32_INIT: u32 = 0xFFFF_FFFF;

/// Incremental CRC32 accumulator.
#[derive(Clone, Copy, Debug)]
pub struct Crc32 {
    register: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            register: CRC32_INIT,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let mut crc = self.register;
        for &byte in bytes {
            crc ^= u32::from(byte);
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ CRC32_POLY;
                } else {
                    crc >>= 1;
                }
            }
        }
        self.register = crc;
    }

    #[must_use]
    pub const fn finalize(self) -> u32 {
        !self.register
    }
}

/// CRC32 of `bytes`.
#[must_use]
pub fn compute(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finalize()
}

/// Exact comparison of a stored checksum against a recomputed one.
#[must_use]
pub const fn verify(stored: u32, recomputed: u32) -> bool {
    stored == recomputed
}

/// Canonical byte image of the tracked fields.
///
/// `version` is little-endian, absent strings contribute no bytes.
#[must_use]
pub fn canonical_bytes(version: u32, zap_number: &str, password_hash: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + zap_number.len() + password_hash.len());
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(zap_number.as_bytes());
    out.extend_from_slice(password_hash.as_bytes());
    out
}

/// Checksum over the canonical record without building the concatenation.
#[must_use]
pub fn record_checksum(version: u32, zap_number: &str, password_hash: &str) -> u32 {
    let mut crc = Crc32::new();
    crc.update(&version.to_le_bytes());
    crc.update(zap_number.as_bytes());
    crc.update(password_hash.as_bytes());
    crc.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value_matches_ieee() {
        assert_eq!(compute(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(compute(&[]), 0);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut crc = Crc32::new();
        crc.update(b"1234");
        crc.update(b"56789");
        assert_eq!(crc.finalize(), compute(b"123456789"));
    }

    #[test]
    fn record_checksum_matches_canonical_bytes() {
        let bytes = canonical_bytes(2, "AB1234", "deadbeef");
        assert_eq!(bytes.len(), 4 + 6 + 8);
        assert_eq!(record_checksum(2, "AB1234", "deadbeef"), compute(&bytes));
    }

    #[test]
    fn field_order_is_significant() {
        let forward = record_checksum(2, "AB1234", "deadbeef");
        let swapped = compute(&[&2u32.to_le_bytes()[..], b"deadbeef", b"AB1234"].concat());
        assert_ne!(forward, swapped);
        assert!(!verify(forward, swapped));
        assert!(verify(forward, forward));
    }
}
