//! Salted, iterated SHA-256 password hashes.
//!
//! Encoded as `sha256$<iterations>$<salt-hex>$<digest-hex>` so the work
//! factor can be raised without invalidating stored hashes.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    encode(ITERATIONS, &salt, &derive(password, &salt, ITERATIONS))
}

/// Check a password against an encoded hash. Malformed hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(digest), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), hex::decode(salt), hex::decode(digest))
    else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    constant_time_eq(&derive(password, &salt, iterations), &expected)
}

/// Well-formed hash no password maps to in practice. Checked against when
/// the account does not exist so lookups cost the same either way.
const UNKNOWN_ACCOUNT_HASH: &str = concat!(
    "sha256$10000$",
    "00000000000000000000000000000000",
    "$",
    "0000000000000000000000000000000000000000000000000000000000000000",
);

/// Spend the same work as a real check, then reject.
pub fn reject_unknown_account(password: &str) -> bool {
    let _ = verify_password(password, UNKNOWN_ACCOUNT_HASH);
    false
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new().chain_update(digest).chain_update(salt).finalize();
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn encode(iterations: u32, salt: &[u8], digest: &[u8]) -> String {
    format!("{SCHEME}${iterations}${}${}", hex::encode(salt), hex::encode(digest))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("correct h0rse", &hash));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn encoded_form_carries_the_work_factor() {
        let hash = hash_password("pw");
        assert!(hash.starts_with("sha256$10000$"));
        assert_eq!(hash.split('$').count(), 4);
        assert_eq!(hash.split('$').nth(2).map(str::len), Some(SALT_LEN * 2));
    }

    #[test]
    fn unknown_account_hash_is_well_formed() {
        let parts = UNKNOWN_ACCOUNT_HASH.split('$').collect::<Vec<_>>();
        assert_eq!(parts[0], SCHEME);
        assert_eq!(parts[1].parse::<u32>().unwrap(), ITERATIONS);
        assert_eq!(hex::decode(parts[2]).unwrap().len(), SALT_LEN);
        assert_eq!(hex::decode(parts[3]).unwrap().len(), 32);
        assert!(!reject_unknown_account("anything"));
    }

    #[test]
    fn malformed_hashes_never_match() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "md5$1$00$00"));
        assert!(!verify_password("pw", "sha256$0$00$00"));
        assert!(!verify_password("pw", "sha256$10$zz$00"));
        assert!(!verify_password("pw", "sha256$10$00$00$extra"));
    }
}
