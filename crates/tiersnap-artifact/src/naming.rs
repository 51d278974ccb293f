//! Mapping between object keys and (tier, timestamp) pairs.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Tier};

/// The fixed, zero-padded timestamp format embedded in every artifact key.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Format a timestamp the way it appears in artifact keys.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
  timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Build the key of an artifact: `{tier}/{timestamp}.{extension}`.
///
/// Sub-second precision is dropped.
pub fn build_key(tier: Tier, timestamp: DateTime<Utc>, extension: &str) -> String {
  format!("{}/{}.{}", tier, format_timestamp(timestamp), extension)
}

/// The part of a key after the tier prefix (everything after the first `/`).
pub fn file_name(key: &str) -> Result<&str, Error> {
  match key.split_once('/') {
    Some((_, name)) if !name.is_empty() => Ok(name),
    Some(_) => Err(Error::malformed(key, "empty file name")),
    None => Err(Error::malformed(key, "missing tier prefix")),
  }
}

/// The tier named by the prefix of a key.
pub fn tier_of(key: &str) -> Result<Tier, Error> {
  match key.split_once('/') {
    Some((tier, _)) => tier.parse(),
    None => Err(Error::malformed(key, "missing tier prefix")),
  }
}

/// The extension of a key (everything after the first `.` of the file name).
pub fn extension_of(key: &str) -> Result<&str, Error> {
  let name = file_name(key)?;
  match name.split_once('.') {
    Some((_, ext)) if !ext.is_empty() => Ok(ext),
    _ => Err(Error::malformed(key, "missing extension")),
  }
}

/// The key an artifact gets when promoted into `tier`.
///
/// Timestamp and extension are preserved; only the tier prefix changes.
pub fn promoted_key(key: &str, tier: Tier) -> Result<String, Error> {
  Ok(format!("{}/{}", tier, file_name(key)?))
}

/// Parse the creation timestamp encoded in a key.
///
/// The literal must round-trip through [`TIMESTAMP_FORMAT`] exactly. A key
/// that parses but is not zero-padded would break lexicographic ordering, so
/// it is rejected as malformed too.
pub fn parse_timestamp(key: &str) -> Result<DateTime<Utc>, Error> {
  let name = file_name(key)?;
  let literal = match name.split_once('.') {
    Some((literal, _)) => literal,
    None => return Err(Error::malformed(key, "missing extension")),
  };

  let timestamp = NaiveDateTime::parse_from_str(literal, TIMESTAMP_FORMAT)
    .map_err(|e| Error::malformed(key, format!("invalid timestamp '{}': {}", literal, e)))?
    .and_utc();

  if format_timestamp(timestamp) != literal {
    return Err(Error::malformed(
      key,
      format!("timestamp '{}' is not in canonical form", literal),
    ));
  }

  Ok(timestamp)
}

/// Age of an artifact in whole seconds relative to `now`.
///
/// The result is negative when the key is dated in the future (clock skew or
/// a hand-written key). It is returned as-is so callers can report it.
pub fn age_seconds(key: &str, now: DateTime<Utc>) -> Result<i64, Error> {
  let created_at = parse_timestamp(key)?;
  Ok((now - created_at).num_seconds())
}

/// The newest key of a single tier (lexicographic maximum).
pub fn newest_key<S: AsRef<str>>(keys: &[S]) -> Option<&str> {
  keys.iter().map(|k| k.as_ref()).max()
}

/// The oldest key of a single tier (lexicographic minimum).
pub fn oldest_key<S: AsRef<str>>(keys: &[S]) -> Option<&str> {
  keys.iter().map(|k| k.as_ref()).min()
}
