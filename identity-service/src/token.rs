//! Bearer token generation and classification.

use std::sync::Mutex;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Prefix that marks a service-account token.
pub const SERVICE_ACCOUNT_MARKER: &str = "SA:";

const RANDOM_LEN: usize = 16;
const SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    User,
    ServiceAccount,
}

impl TokenKind {
    /// Decided by the prefix alone; never fails.
    pub fn classify(token: &str) -> Self {
        if token.as_bytes().starts_with(SERVICE_ACCOUNT_MARKER.as_bytes()) {
            TokenKind::ServiceAccount
        } else {
            TokenKind::User
        }
    }
}

pub trait TokenGenerator: Send + Sync {
    fn generate_token(&self) -> String;
}

/// SHA-256 over 16 random alphanumerics and the current unix time,
/// URL-safe base64 without padding.
pub struct DefaultTokenGenerator {
    seeded: Option<Mutex<StdRng>>,
}

impl DefaultTokenGenerator {
    /// Draws from the OS-seeded thread RNG.
    pub fn new() -> Self {
        Self { seeded: None }
    }

    /// Reproducible sequence for tests and local runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn random_part(&self) -> String {
        match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                sample_alphanumeric(&mut *rng)
            }
            None => sample_alphanumeric(&mut rand::thread_rng()),
        }
    }
}

impl Default for DefaultTokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_alphanumeric<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(RANDOM_LEN)
        .map(char::from)
        .collect()
}

impl TokenGenerator for DefaultTokenGenerator {
    fn generate_token(&self) -> String {
        let material = format!(
            "{}{}{}",
            self.random_part(),
            SEPARATOR,
            Utc::now().timestamp()
        );
        let digest = Sha256::digest(material.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

/// Wraps a generator and tags its output with [`SERVICE_ACCOUNT_MARKER`].
pub struct ServiceAccountTokenGenerator<G = DefaultTokenGenerator> {
    inner: G,
}

impl<G: TokenGenerator> ServiceAccountTokenGenerator<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

impl<G: TokenGenerator> TokenGenerator for ServiceAccountTokenGenerator<G> {
    fn generate_token(&self) -> String {
        format!("{}{}", SERVICE_ACCOUNT_MARKER, self.inner.generate_token())
    }
}
