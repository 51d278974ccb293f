//! Tiersnap Snapshot
//!
//! This crate produces new base artifacts. A [`SnapshotProducer`] is asked to
//! run once and either leaves a new key in the hourly tier or fails.
//!
//! [`DumpProducer`] is the production implementation:
//!
//! ```text
//! dump command ──► temp file ──► compress ──► encrypt (optional) ──► hourly/{now}.{ext}
//! ```
//!
//! The temporary file is removed when the producer returns, whether the
//! upload succeeded or not.

mod compress;
mod crypto;
mod dump;
mod fetch;

pub use compress::{compress, decompress};
pub use crypto::{Cipher, ENVELOPE_MAGIC, is_encrypted};
pub use dump::{DumpProducer, DumpSettings};
pub use fetch::fetch_artifact;

use async_trait::async_trait;

/// Error type for snapshot production.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
  /// The dump command could not be started.
  #[error("failed to run dump command '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  /// The dump command exited unsuccessfully.
  #[error("dump command exited with {status}: {stderr}")]
  DumpFailed { status: String, stderr: String },

  /// Compressing or decompressing the dump failed.
  #[error("compression failed: {0}")]
  Compression(String),

  /// Encrypting or decrypting the dump failed.
  #[error("encryption failed: {0}")]
  Encryption(String),

  /// An artifact with the same key already exists.
  #[error("artifact already exists: {0}")]
  KeyExists(String),

  /// The object store rejected the upload or download.
  #[error("object store error: {0}")]
  Store(#[from] tiersnap_store::Error),

  /// A local I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Produces a new artifact in the hourly tier.
#[async_trait]
pub trait SnapshotProducer: Send + Sync {
  /// Create a new backup and upload it. Returns the new key.
  async fn produce_and_upload(&self) -> Result<String, SnapshotError>;
}
