use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tiersnap_artifact::{Compression, Tier, build_key};
use tiersnap_store::{ObjectStore, bytes_stream};
use tracing::{debug, info};

use crate::{Cipher, SnapshotError, SnapshotProducer, compress};

/// How to invoke the database dump command.
#[derive(Debug, Clone)]
pub struct DumpSettings {
  /// Executable to run, `mysqldump` unless overridden.
  pub command: String,
  pub host: String,
  pub port: u16,
  pub dbname: String,
  pub username: String,
  pub password: String,
  /// Emit `DROP TABLE` before each `CREATE TABLE`.
  pub add_drop_table: bool,
}

impl DumpSettings {
  fn args(&self) -> Vec<String> {
    let mut args = vec![
      format!("--host={}", self.host),
      format!("--port={}", self.port),
      format!("--user={}", self.username),
      "--single-transaction".to_string(),
    ];
    if self.add_drop_table {
      args.push("--add-drop-table".to_string());
    }
    args.push(self.dbname.clone());
    args
  }
}

/// Snapshot producer backed by an external dump command.
pub struct DumpProducer {
  store: Arc<dyn ObjectStore>,
  settings: DumpSettings,
  compression: Compression,
  add_sql_extension: bool,
  cipher: Option<Cipher>,
}

impl DumpProducer {
  pub fn new(
    store: Arc<dyn ObjectStore>,
    settings: DumpSettings,
    compression: Compression,
    add_sql_extension: bool,
  ) -> Self {
    Self {
      store,
      settings,
      compression,
      add_sql_extension,
      cipher: None,
    }
  }

  /// Encrypt artifacts client-side before upload.
  pub fn with_cipher(mut self, cipher: Cipher) -> Self {
    self.cipher = Some(cipher);
    self
  }

  /// Run the dump command into a temporary file and return its contents.
  async fn dump(&self) -> Result<Vec<u8>, SnapshotError> {
    info!(database = %self.settings.dbname, "creating dump");

    // Removed on drop, whichever way this function exits.
    let temp = tempfile::NamedTempFile::new()?;
    let stdout = temp.reopen()?;

    let child = tokio::process::Command::new(&self.settings.command)
      .args(self.settings.args())
      .env("MYSQL_PWD", &self.settings.password)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|source| SnapshotError::Spawn {
        command: self.settings.command.clone(),
        source,
      })?;
    let output = child.wait_with_output().await?;

    if !output.status.success() {
      return Err(SnapshotError::DumpFailed {
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    let data = tokio::fs::read(temp.path()).await?;
    debug!(bytes = data.len(), "dump created");
    Ok(data)
  }
}

#[async_trait]
impl SnapshotProducer for DumpProducer {
  async fn produce_and_upload(&self) -> Result<String, SnapshotError> {
    let raw = self.dump().await?;

    let compression = self.compression;
    let mut body = tokio::task::spawn_blocking(move || compress(&raw, compression))
      .await
      .map_err(|e| SnapshotError::Compression(e.to_string()))??;

    if let Some(cipher) = &self.cipher {
      body = cipher.encrypt(&body)?;
    }

    let extension = self.compression.extension(self.add_sql_extension);
    let key = build_key(Tier::Hourly, Utc::now(), extension);

    let existing = self.store.list(&key).await?;
    if existing.iter().any(|o| o.key == key) {
      return Err(SnapshotError::KeyExists(key));
    }

    info!(key = %key, bytes = body.len(), encrypted = self.cipher.is_some(), "uploading dump");
    self.store.put(&key, bytes_stream(body)).await?;
    info!(key = %key, "dump uploaded");

    Ok(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tiersnap_artifact::parse_timestamp;
  use tiersnap_store::{MemoryStore, Operation};

  fn settings(command: &str) -> DumpSettings {
    DumpSettings {
      command: command.to_string(),
      host: "db.internal".to_string(),
      port: 3306,
      dbname: "app".to_string(),
      username: "backup".to_string(),
      password: "secret".to_string(),
      add_drop_table: true,
    }
  }

  #[test]
  fn test_dump_args() {
    assert_eq!(
      settings("mysqldump").args(),
      vec![
        "--host=db.internal",
        "--port=3306",
        "--user=backup",
        "--single-transaction",
        "--add-drop-table",
        "app",
      ]
    );

    let mut without_drop = settings("mysqldump");
    without_drop.add_drop_table = false;
    assert!(!without_drop.args().contains(&"--add-drop-table".to_string()));
  }

  // `echo` stands in for the dump tool: it prints its arguments to stdout.
  #[cfg(unix)]
  #[tokio::test]
  async fn test_produce_uploads_compressed_dump() {
    let store = Arc::new(MemoryStore::new());
    let producer = DumpProducer::new(store.clone(), settings("echo"), Compression::Gzip, true);

    let key = producer.produce_and_upload().await.unwrap();

    assert!(key.starts_with("hourly/"));
    assert!(key.ends_with(".sql.gz"));
    assert!(parse_timestamp(&key).is_ok());

    let stored = store.data(&key).await.unwrap();
    let dump = crate::decompress(&stored, Compression::Gzip).unwrap();
    let text = String::from_utf8(dump).unwrap();
    assert!(text.contains("--add-drop-table app"));
    assert!(!text.contains("secret"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_produce_encrypts_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let producer = DumpProducer::new(store.clone(), settings("echo"), Compression::None, false)
      .with_cipher(Cipher::new([3u8; 32]));

    let key = producer.produce_and_upload().await.unwrap();
    assert!(key.ends_with(".sql"));

    let stored = store.data(&key).await.unwrap();
    assert!(crate::is_encrypted(&stored));
    let plain = Cipher::new([3u8; 32]).decrypt(&stored).unwrap();
    assert!(String::from_utf8(plain).unwrap().contains("app"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn test_failing_dump_uploads_nothing() {
    let store = Arc::new(MemoryStore::new());
    let producer = DumpProducer::new(store.clone(), settings("false"), Compression::None, false);

    let result = producer.produce_and_upload().await;
    assert!(matches!(result, Err(SnapshotError::DumpFailed { .. })));
    assert!(store.writes().await.is_empty());
  }

  #[tokio::test]
  async fn test_missing_command() {
    let store = Arc::new(MemoryStore::new());
    let producer = DumpProducer::new(
      store.clone(),
      settings("tiersnap-no-such-dump-command"),
      Compression::None,
      false,
    );

    let result = producer.produce_and_upload().await;
    assert!(matches!(result, Err(SnapshotError::Spawn { .. })));
    assert!(!store
      .operations()
      .await
      .iter()
      .any(|op| matches!(op, Operation::Put(_))));
  }
}
