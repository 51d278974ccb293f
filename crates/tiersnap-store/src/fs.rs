use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{ByteStream, Error, ObjectInfo, ObjectStore};

/// Filesystem-based object store.
///
/// A directory stands in for the bucket. Each object is stored at
/// `{base_path}/{key}` and each folder marker is a directory. Parent
/// directories are created automatically.
pub struct FsStore {
  base_path: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store rooted at the given directory.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn key_to_path(&self, key: &str) -> Result<PathBuf, Error> {
    let invalid = |reason: &str| Error::InvalidKey {
      key: key.to_string(),
      reason: reason.to_string(),
    };

    if key.is_empty() {
      return Err(invalid("empty key"));
    }
    if key.starts_with('/') {
      return Err(invalid("absolute key"));
    }

    let trimmed = key.strip_suffix('/').unwrap_or(key);
    for segment in trimmed.split('/') {
      if segment.is_empty() || segment == "." || segment == ".." {
        return Err(invalid("empty or relative path segment"));
      }
    }

    Ok(self.base_path.join(trimmed))
  }
}

fn not_found_or_io(key: &str, e: std::io::Error) -> Error {
  if e.kind() == std::io::ErrorKind::NotFound {
    Error::NotFound(key.to_string())
  } else {
    Error::Io(e)
  }
}

#[async_trait]
impl ObjectStore for FsStore {
  async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, Error> {
    let mut objects = Vec::new();

    if !fs::try_exists(&self.base_path).await? {
      return Ok(objects);
    }

    // (directory, key prefix of its entries)
    let mut pending = vec![(self.base_path.clone(), String::new())];
    while let Some((dir, parent_key)) = pending.pop() {
      let mut entries = fs::read_dir(&dir).await?;
      while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
          return Err(Error::InvalidKey {
            key: format!("{}{}", parent_key, file_name.to_string_lossy()),
            reason: "non-UTF-8 object name".to_string(),
          });
        };

        let key = format!("{}{}", parent_key, name);
        let metadata = entry.metadata().await?;
        let last_modified = DateTime::<Utc>::from(metadata.modified()?);

        if metadata.is_dir() {
          let marker = format!("{}/", key);
          if marker.starts_with(prefix) {
            objects.push(ObjectInfo {
              key: marker.clone(),
              size: 0,
              last_modified,
            });
          }
          if marker.starts_with(prefix) || prefix.starts_with(&marker) {
            pending.push((entry.path(), marker));
          }
        } else if key.starts_with(prefix) {
          objects.push(ObjectInfo {
            key,
            size: metadata.len(),
            last_modified,
          });
        }
      }
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key));
    debug!(root = %self.base_path.display(), prefix, count = objects.len(), "listed objects");
    Ok(objects)
  }

  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let path = self.key_to_path(key)?;
    let file = File::open(&path)
      .await
      .map_err(|e| not_found_or_io(key, e))?;
    let stream = ReaderStream::new(file).map(|r| r.map_err(Error::Io));
    Ok(Box::pin(stream))
  }

  async fn put(&self, key: &str, data: ByteStream) -> Result<(), Error> {
    let path = self.key_to_path(key)?;

    if key.ends_with('/') {
      fs::create_dir_all(&path).await?;
      debug!(key, "created marker");
      return Ok(());
    }

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut file = File::create(path).await?;
    let mut stream = std::pin::pin!(data);

    while let Some(chunk) = stream.next().await {
      let bytes = chunk?;
      file.write_all(&bytes).await?;
    }

    file.flush().await?;
    debug!(key, "stored object");
    Ok(())
  }

  async fn copy(&self, source: &str, destination: &str) -> Result<(), Error> {
    let from = self.key_to_path(source)?;
    let to = self.key_to_path(destination)?;

    if let Some(parent) = to.parent() {
      fs::create_dir_all(parent).await?;
    }

    fs::copy(&from, &to)
      .await
      .map_err(|e| not_found_or_io(source, e))?;
    debug!(source, destination, "copied object");
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    let path = self.key_to_path(key)?;
    let result = if key.ends_with('/') {
      fs::remove_dir(&path).await
    } else {
      fs::remove_file(&path).await
    };

    match result {
      Ok(()) => {
        debug!(key, "deleted object");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(Error::Io(e)),
    }
  }
}
