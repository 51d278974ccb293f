//! Client-side AES-256-GCM encryption of artifacts.
//!
//! Encrypted artifacts use a small binary envelope:
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────────────┐
//! │ "TSE1"   │ nonce (12 B) │ ciphertext + tag (16 B)  │
//! └──────────┴──────────────┴──────────────────────────┘
//! ```

use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::SnapshotError;

/// Leading bytes of every encrypted artifact.
pub const ENVELOPE_MAGIC: &[u8; 4] = b"TSE1";

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Whether `data` starts with the encryption envelope.
pub fn is_encrypted(data: &[u8]) -> bool {
  data.starts_with(ENVELOPE_MAGIC)
}

/// An AES-256-GCM key for client-side encryption.
pub struct Cipher {
  key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for Cipher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Cipher").finish_non_exhaustive()
  }
}

impl Cipher {
  pub fn new(key: [u8; KEY_SIZE]) -> Self {
    Self { key }
  }

  /// Load a key from a file holding the base64 encoding of 32 random bytes.
  pub fn from_key_file(path: &Path) -> Result<Self, SnapshotError> {
    let text = std::fs::read_to_string(path)?;
    let decoded = STANDARD.decode(text.trim()).map_err(|e| {
      SnapshotError::Encryption(format!(
        "invalid key encoding in {}: {}",
        path.display(),
        e
      ))
    })?;

    let key: [u8; KEY_SIZE] = decoded.try_into().map_err(|bytes: Vec<u8>| {
      SnapshotError::Encryption(format!(
        "key in {} is {} bytes, expected {}",
        path.display(),
        bytes.len(),
        KEY_SIZE
      ))
    })?;

    Ok(Self::new(key))
  }

  fn aead(&self) -> Result<Aes256Gcm, SnapshotError> {
    Aes256Gcm::new_from_slice(&self.key)
      .map_err(|e| SnapshotError::Encryption(format!("failed to create cipher: {}", e)))
  }

  /// Encrypt `plaintext` into an envelope with a fresh random nonce.
  pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = self
      .aead()?
      .encrypt(nonce, plaintext)
      .map_err(|e| SnapshotError::Encryption(format!("encryption failed: {}", e)))?;

    let mut envelope = Vec::with_capacity(ENVELOPE_MAGIC.len() + NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(ENVELOPE_MAGIC);
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
  }

  /// Decrypt an envelope produced by [`Cipher::encrypt`].
  pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    if !is_encrypted(envelope) {
      return Err(SnapshotError::Encryption(
        "data is not an encrypted artifact".to_string(),
      ));
    }

    let body = &envelope[ENVELOPE_MAGIC.len()..];
    if body.len() < NONCE_SIZE {
      return Err(SnapshotError::Encryption(
        "truncated encrypted artifact".to_string(),
      ));
    }
    let (nonce_bytes, ciphertext) = body.split_at(NONCE_SIZE);

    self
      .aead()?
      .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
      .map_err(|_| {
        SnapshotError::Encryption("decryption failed: invalid key or corrupted data".to_string())
      })
  }
}
