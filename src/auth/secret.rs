//! Comparing supplied passwords against stored secrets, and sealing new ones.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ftpgate_core::account::PasswordSecret;
use ring::{
    digest::{self, SHA512, SHA512_OUTPUT_LEN},
    pbkdf2::{self, PBKDF2_HMAC_SHA512},
};
use std::{fmt::Debug, num::NonZeroU32};
use thiserror::Error;

const SALT_LEN: usize = 16;
const DECOY_SALT: &str = "ftpgate-unknown-user";

/// Sealing a secret failed.
#[derive(Debug, Error)]
#[error("could not seal password: {0}")]
pub struct SealError(String);

/// Compares passwords against stored secrets and turns new passwords into storable secrets.
///
/// Both operations are CPU bound; the account store runs them on the blocking thread pool.
pub trait SecretVerifier: Send + Sync + Debug {
    /// Whether `password` matches `secret`.
    fn compare(&self, password: &[u8], secret: &PasswordSecret) -> bool;

    /// Derives the secret to store for `password`.
    fn seal(&self, password: &str) -> Result<PasswordSecret, SealError>;

    /// A secret no password matches, costing as much to compare against as a sealed one. Logins
    /// for unknown users are compared against it.
    fn decoy(&self) -> PasswordSecret;
}

/// Verifies PBKDF2-HMAC-SHA512 secrets and seals new passwords as such. Legacy plaintext secrets
/// are compared in constant time.
#[derive(Debug, Clone)]
pub struct Pbkdf2Verifier {
    iterations: NonZeroU32,
}

impl Pbkdf2Verifier {
    /// A verifier that seals with `iterations` rounds.
    pub fn with_iterations(iterations: NonZeroU32) -> Self {
        Pbkdf2Verifier { iterations }
    }
}

impl Default for Pbkdf2Verifier {
    fn default() -> Self {
        Pbkdf2Verifier {
            iterations: NonZeroU32::new(100_000).unwrap_or(NonZeroU32::MIN),
        }
    }
}

// Hashing first makes the comparison independent of both lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = digest::digest(&SHA512, a);
    let b = digest::digest(&SHA512, b);
    a.as_ref().iter().zip(b.as_ref()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl SecretVerifier for Pbkdf2Verifier {
    fn compare(&self, password: &[u8], secret: &PasswordSecret) -> bool {
        match secret {
            PasswordSecret::Pbkdf2 {
                pbkdf2_salt,
                pbkdf2_key,
                pbkdf2_iter,
            } => match BASE64.decode(pbkdf2_key) {
                Ok(key) => pbkdf2::verify(PBKDF2_HMAC_SHA512, *pbkdf2_iter, pbkdf2_salt.as_bytes(), password, &key).is_ok(),
                Err(_) => false,
            },
            PasswordSecret::Plaintext { password: stored } => constant_time_eq(password, stored.as_bytes()),
        }
    }

    fn seal(&self, password: &str) -> Result<PasswordSecret, SealError> {
        let mut salt = [0u8; SALT_LEN];
        getrandom::fill(&mut salt).map_err(|e| SealError(e.to_string()))?;
        let salt = BASE64.encode(salt);

        let mut key = [0u8; SHA512_OUTPUT_LEN];
        pbkdf2::derive(PBKDF2_HMAC_SHA512, self.iterations, salt.as_bytes(), password.as_bytes(), &mut key);

        Ok(PasswordSecret::Pbkdf2 {
            pbkdf2_salt: salt,
            pbkdf2_key: BASE64.encode(key),
            pbkdf2_iter: self.iterations,
        })
    }

    fn decoy(&self) -> PasswordSecret {
        PasswordSecret::Pbkdf2 {
            pbkdf2_salt: DECOY_SALT.to_string(),
            pbkdf2_key: BASE64.encode([0u8; SHA512_OUTPUT_LEN]),
            pbkdf2_iter: self.iterations,
        }
    }
}
