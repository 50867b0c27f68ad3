// CLASSIFICATION: COMMUNITY
// Filename: credential.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Password hashing for the login screen.
//!
//! The hash is the record CRC32 rendered as eight lower-case hex digits.
//! It is NOT a password hash in the cryptographic sense: there is no salt,
//! no work factor, and collisions are trivial to construct for anyone who
//! can compute CRC32. It only guards against accidental corruption and
//! casual edits of the stored value.

use crate::integrity;

/// Length of a rendered hash.
pub const HASH_LEN: usize = 8;

/// Hash `data` into its eight hex digit form.
#[must_use]
pub fn hash(data: &[u8]) -> String {
    hex::encode(integrity::compute(data).to_be_bytes())
}

/// True when `hash(data)` is exactly `stored_hash`.
#[must_use]
pub fn compare(data: &[u8], stored_hash: &str) -> bool {
    hash(data) == stored_hash
}

/// Shape check for a stored hash: eight hex digits, either case.
#[must_use]
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == HASH_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_hex() {
        let a = hash(b"MySecurePassword123");
        assert_eq!(a, hash(b"MySecurePassword123"));
        assert_eq!(a.len(), HASH_LEN);
        assert!(is_well_formed(&a));
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn known_value_renders_big_endian() {
        assert_eq!(hash(b"123456789"), "cbf43926");
        assert_eq!(hash(b""), "00000000");
    }

    #[test]
    fn compare_accepts_own_hash_only() {
        let stored = hash(b"MySecurePassword123");
        assert!(compare(b"MySecurePassword123", &stored));
        assert!(!compare(b"WrongPassword", &stored));
    }

    #[test]
    fn compare_is_case_exact() {
        let stored = hash(b"123456789").to_uppercase();
        assert!(!compare(b"123456789", &stored));
    }

    #[test]
    fn well_formed_rejects_bad_shapes() {
        assert!(is_well_formed("DEADBEEF"));
        assert!(!is_well_formed("deadbee"));
        assert!(!is_well_formed("deadbeefa"));
        assert!(!is_well_formed("deadbeeg"));
        assert!(!is_well_formed(""));
    }
}
