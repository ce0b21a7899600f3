//! Salted password digests for account storage.
//! Stored form is `<salt-hex>$<sha256(salt || password)-hex>`; plaintext
//! passwords never touch the database.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Hash a password with a fresh random 128-bit salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

/// Check a password against a stored digest. A malformed stored value
/// never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    digest(&salt, password) == expected
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
