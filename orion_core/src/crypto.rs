//! AEAD codec for confidential intents.
//!
//! Wire form of a sealed intent:
//!
//! ```text
//! ┌──────────────┬─────────────────────────────────────┐
//! │ nonce (12 B) │ AES-256-GCM ciphertext ‖ tag (16 B) │
//! └──────────────┴─────────────────────────────────────┘
//! ```
//!
//! The plaintext is the intent's deterministic JSON encoding. Every call to
//! [`encrypt`] draws a fresh nonce from the OS RNG.

use crate::error::CodecError;
use crate::intent::Intent;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use orion_env::KEY_LEN;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Nonce length prepended to every blob.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// A submitter's symmetric key.
///
/// Shared only between a submitter and the aggregator at topology build;
/// never sent in a message.
#[derive(Clone, PartialEq, Eq)]
pub struct IntentKey([u8; KEY_LEN]);

impl IntentKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh key from OS entropy.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> Result<Aes256Gcm, CodecError> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CodecError::Encoding(format!("Failed to create cipher: {}", e)))
    }
}

impl fmt::Debug for IntentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntentKey(..)")
    }
}

/// Seals an intent under `key`, returning `nonce ‖ ciphertext`.
pub fn encrypt(key: &IntentKey, intent: &Intent) -> Result<Vec<u8>, CodecError> {
    let plaintext = serde_json::to_vec(intent).map_err(|e| CodecError::Encoding(e.to_string()))?;
    seal(key, &plaintext)
}

/// Opens a blob produced by [`encrypt`].
///
/// # Errors
/// * `CodecError::Authentication` - wrong key, tampered or truncated blob
/// * `CodecError::MalformedPayload` - tag verified but the plaintext is not
///   a valid intent
pub fn decrypt(key: &IntentKey, blob: &[u8]) -> Result<Intent, CodecError> {
    let plaintext = open(key, blob)?;
    serde_json::from_slice(&plaintext).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}

fn seal(key: &IntentKey, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
    let cipher = key.cipher()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CodecError::Encoding(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

fn open(key: &IntentKey, blob: &[u8]) -> Result<Vec<u8>, CodecError> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CodecError::Authentication);
    }

    let cipher = key.cipher()?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CodecError::Authentication)
}
