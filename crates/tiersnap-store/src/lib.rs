//! Tiersnap Store
//!
//! This crate provides the object store gateway used by tiersnap. A bucket is
//! a flat namespace of keys; "folders" are marker keys ending in `/` with an
//! empty body.
//!
//! The [`ObjectStore`] trait is the only way the retention manager touches
//! storage. Implementations:
//! - [`FsStore`]: a local directory stands in for the bucket
//! - [`MemoryStore`]: in-process map that records every call, for tests
//! - `S3Store` (feature `s3`): Amazon S3 or any S3-compatible endpoint

mod fs;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use fs::FsStore;
pub use memory::{FailPoint, MemoryStore, Operation};
#[cfg(feature = "s3")]
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of bytes for object data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for object store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested object was not found.
  #[error("object not found: {0}")]
  NotFound(String),

  /// The key cannot be mapped onto the backend.
  #[error("invalid key '{key}': {reason}")]
  InvalidKey { key: String, reason: String },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The remote backend rejected or failed the request.
  #[error("{operation} failed: {message}")]
  Backend { operation: String, message: String },
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
  pub key: String,
  pub size: u64,
  pub last_modified: DateTime<Utc>,
}

impl ObjectInfo {
  /// Whether this entry is a folder marker rather than an object.
  pub fn is_marker(&self) -> bool {
    self.key.ends_with('/')
  }
}

/// Object store gateway.
///
/// Every call is independent; none of them retries. Copies and puts only
/// ever create keys, and deleting a key that does not exist succeeds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// List every key starting with `prefix`, folder markers included.
  ///
  /// Returns an empty list when nothing matches.
  async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, Error>;

  /// Retrieve an object by key.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Store an object. A key ending in `/` creates a folder marker and the
  /// data is ignored.
  async fn put(&self, key: &str, data: ByteStream) -> Result<(), Error>;

  /// Copy an object to a new key within the same bucket.
  async fn copy(&self, source: &str, destination: &str) -> Result<(), Error>;

  /// Delete an object. Deleting a missing key is not an error.
  async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`].
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
  let data = data.into();
  Box::pin(futures::stream::once(async move { Ok::<_, Error>(data) }))
}

/// An empty [`ByteStream`], used for folder markers.
pub fn empty_stream() -> ByteStream {
  Box::pin(futures::stream::empty::<Result<Bytes, Error>>())
}

/// Drain a [`ByteStream`] into a single buffer.
pub async fn collect(mut stream: ByteStream) -> Result<Bytes, Error> {
  let mut buffer = BytesMut::new();
  while let Some(chunk) = stream.next().await {
    buffer.extend_from_slice(&chunk?);
  }
  Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_collect_concatenates_chunks() {
    let chunks: Vec<Result<Bytes, Error>> = vec![
      Ok(Bytes::from_static(b"abc")),
      Ok(Bytes::from_static(b"")),
      Ok(Bytes::from_static(b"def")),
    ];
    let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
    let data = collect(stream).await.unwrap();
    assert_eq!(&data[..], b"abcdef");
  }

  #[tokio::test]
  async fn test_collect_propagates_errors() {
    let chunks: Vec<Result<Bytes, Error>> = vec![
      Ok(Bytes::from_static(b"abc")),
      Err(Error::NotFound("x".to_string())),
    ];
    let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
    assert!(matches!(collect(stream).await, Err(Error::NotFound(_))));
  }

  #[test]
  fn test_marker_detection() {
    let marker = ObjectInfo {
      key: "daily/".to_string(),
      size: 0,
      last_modified: Utc::now(),
    };
    assert!(marker.is_marker());
  }
}
