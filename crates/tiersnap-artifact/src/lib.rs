//! Tiersnap Artifact
//!
//! This crate provides the naming rules for backup artifacts. An artifact is
//! an immutable object stored under one of four tier namespaces, and its key
//! is the only durable record of it:
//!
//! ```text
//! {tier}/{YYYY-MM-DD_HH-MM-SS}.{extension}
//! ```
//!
//! The timestamp format is zero-padded, so lexicographic order over keys in a
//! single tier is chronological order. Everything else in tiersnap relies on
//! that property.

mod extension;
mod naming;
mod tier;

pub use extension::Compression;
pub use naming::{
  TIMESTAMP_FORMAT, age_seconds, build_key, extension_of, file_name, format_timestamp, newest_key,
  oldest_key, parse_timestamp, promoted_key, tier_of,
};
pub use tier::Tier;

/// Error type for artifact naming operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  /// A key does not have the `{tier}/{timestamp}.{extension}` shape.
  #[error("malformed artifact key '{key}': {reason}")]
  MalformedKey { key: String, reason: String },

  /// A tier name is not one of hourly, daily, monthly or yearly.
  #[error("unknown tier: {0}")]
  UnknownTier(String),
}

impl Error {
  pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
    Self::MalformedKey {
      key: key.to_string(),
      reason: reason.into(),
    }
  }
}
