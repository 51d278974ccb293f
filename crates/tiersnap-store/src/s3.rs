use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use chrono::DateTime;
use tracing::debug;

use crate::{ByteStream, Error, ObjectInfo, ObjectStore, bytes_stream, collect};

/// Amazon S3 object store.
///
/// Works against any S3-compatible endpoint. Folder markers are zero-byte
/// objects whose key ends in `/`, the same convention the S3 console uses.
pub struct S3Store {
  client: Client,
  bucket: String,
}

impl S3Store {
  /// Create a store from an existing client.
  pub fn new(client: Client, bucket: impl Into<String>) -> Self {
    Self {
      client,
      bucket: bucket.into(),
    }
  }

  /// Create a store using the default AWS credential chain.
  ///
  /// A custom `endpoint` switches the client to path-style addressing, which
  /// S3-compatible servers such as MinIO expect.
  pub async fn from_env(
    bucket: impl Into<String>,
    region: Option<String>,
    endpoint: Option<String>,
  ) -> Self {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
      loader = loader.region(aws_config::Region::new(region));
    }
    if let Some(endpoint) = &endpoint {
      loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let config = aws_sdk_s3::config::Builder::from(&shared)
      .force_path_style(endpoint.is_some())
      .build();

    Self::new(Client::from_conf(config), bucket)
  }
}

fn backend<E: std::error::Error>(operation: &str, e: E) -> Error {
  Error::Backend {
    operation: operation.to_string(),
    message: DisplayErrorContext(e).to_string(),
  }
}

#[async_trait]
impl ObjectStore for S3Store {
  async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, Error> {
    let mut objects = Vec::new();
    let mut pages = self
      .client
      .list_objects_v2()
      .bucket(&self.bucket)
      .prefix(prefix)
      .into_paginator()
      .send();

    while let Some(page) = pages.next().await {
      let page = page.map_err(|e| backend("list", e))?;
      for object in page.contents() {
        let Some(key) = object.key() else {
          continue;
        };
        let last_modified = object
          .last_modified()
          .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
          .unwrap_or_default();
        objects.push(ObjectInfo {
          key: key.to_string(),
          size: object.size().unwrap_or(0).max(0) as u64,
          last_modified,
        });
      }
    }

    debug!(bucket = %self.bucket, prefix, count = objects.len(), "listed objects");
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
  }

  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let output = self
      .client
      .get_object()
      .bucket(&self.bucket)
      .key(key)
      .send()
      .await
      .map_err(|e| {
        let service_error = e.into_service_error();
        if service_error.is_no_such_key() {
          Error::NotFound(key.to_string())
        } else {
          backend("get", service_error)
        }
      })?;

    let data = output
      .body
      .collect()
      .await
      .map_err(|e| backend("get", e))?
      .into_bytes();
    Ok(bytes_stream(data))
  }

  async fn put(&self, key: &str, data: ByteStream) -> Result<(), Error> {
    let body = if key.ends_with('/') {
      Vec::new()
    } else {
      collect(data).await?.to_vec()
    };

    self
      .client
      .put_object()
      .bucket(&self.bucket)
      .key(key)
      .body(S3ByteStream::from(body))
      .send()
      .await
      .map_err(|e| backend("put", e))?;
    Ok(())
  }

  async fn copy(&self, source: &str, destination: &str) -> Result<(), Error> {
    self
      .client
      .copy_object()
      .bucket(&self.bucket)
      .key(destination)
      .copy_source(format!("{}/{}", self.bucket, source))
      .send()
      .await
      .map_err(|e| backend("copy", e))?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    // S3 reports success for keys that do not exist.
    self
      .client
      .delete_object()
      .bucket(&self.bucket)
      .key(key)
      .send()
      .await
      .map_err(|e| backend("delete", e))?;
    Ok(())
  }
}
