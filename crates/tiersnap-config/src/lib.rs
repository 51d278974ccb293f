//! Tiersnap Config
//!
//! Serializable configuration for a tiersnap run, loaded from a YAML file.
//! Validation happens once, up front, so that no object-store call is made
//! with a configuration that cannot complete a run.

mod sections;

pub use sections::{
  AppConfig, ClientEncryptionConfig, MaxCounts, MysqlConfig, NotifyConfig, StoreBackend,
  StoreConfig,
};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("invalid config value for '{field}': {message}")]
  Invalid { field: String, message: String },
}

impl ConfigError {
  pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
    Self::Invalid {
      field: field.to_string(),
      message: message.into(),
    }
  }
}

/// Top level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  pub app: AppConfig,
  pub store: StoreConfig,
  pub mysql: MysqlConfig,
  #[serde(default)]
  pub client_encryption: ClientEncryptionConfig,
  #[serde(default)]
  pub notify: NotifyConfig,
}

impl Config {
  /// Read, parse and validate a configuration file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Check invariants that serde cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.app.validate()?;
    self.store.validate()?;
    self.mysql.validate()?;
    self.client_encryption.validate()?;
    self.notify.validate()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  use tiersnap_artifact::{Compression, Tier};

  const FULL: &str = r#"
app:
  bucket: my-backups
  output: true
  compression: gzip
  add_sql_extension: true
  mirror_default_opt: true
  maximum_backup_counts:
    hourly: 24
    daily: 7
    monthly: 12
    yearly: 5
store:
  backend: fs
  root: /var/lib/tiersnap
mysql:
  host: localhost
  port: 3307
  dbname: app
  username: backup
  password: secret
client_encryption:
  enabled: true
  key_file: /etc/tiersnap/key
notify:
  webhook_url: https://hooks.example.com/tiersnap
"#;

  fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
  }

  #[test]
  fn test_load_full_config() {
    let file = write_config(FULL);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.app.bucket, "my-backups");
    assert_eq!(config.app.compression, Compression::Gzip);
    assert!(config.app.add_sql_extension);
    assert_eq!(config.app.maximum_backup_counts.get(Tier::Hourly), 24);
    assert_eq!(config.app.maximum_backup_counts.get(Tier::Yearly), 5);
    assert_eq!(config.store.backend, StoreBackend::Fs);
    assert_eq!(config.mysql.port, 3307);
    assert_eq!(config.mysql.dump_command, "mysqldump");
    assert!(config.client_encryption.enabled);
    assert_eq!(
      config.notify.webhook_url.as_deref(),
      Some("https://hooks.example.com/tiersnap")
    );
    assert!(config.notify.sns_topic_arn.is_none());
  }

  #[test]
  fn test_optional_sections_default() {
    let text = FULL
      .split("client_encryption:")
      .next()
      .unwrap()
      .to_string();
    let file = write_config(&text);
    let config = Config::load(file.path()).unwrap();

    assert!(!config.client_encryption.enabled);
    assert!(config.notify.webhook_url.is_none());
  }

  #[test]
  fn test_zero_count_rejected() {
    let file = write_config(&FULL.replace("daily: 7", "daily: 0"));
    match Config::load(file.path()) {
      Err(ConfigError::Invalid { field, .. }) => {
        assert_eq!(field, "app.maximum_backup_counts.daily")
      }
      other => panic!("expected invalid config, got {:?}", other),
    }
  }

  #[test]
  fn test_missing_count_is_parse_error() {
    let file = write_config(&FULL.replace("    yearly: 5\n", ""));
    assert!(matches!(
      Config::load(file.path()),
      Err(ConfigError::Parse { .. })
    ));
  }

  #[test]
  fn test_empty_bucket_rejected() {
    let file = write_config(&FULL.replace("bucket: my-backups", "bucket: \"\""));
    assert!(matches!(
      Config::load(file.path()),
      Err(ConfigError::Invalid { field, .. }) if field == "app.bucket"
    ));
  }

  #[test]
  fn test_fs_backend_requires_root() {
    let file = write_config(&FULL.replace("  root: /var/lib/tiersnap\n", ""));
    assert!(matches!(
      Config::load(file.path()),
      Err(ConfigError::Invalid { field, .. }) if field == "store.root"
    ));
  }

  #[test]
  fn test_encryption_requires_key_file() {
    let file = write_config(&FULL.replace("  key_file: /etc/tiersnap/key\n", ""));
    assert!(matches!(
      Config::load(file.path()),
      Err(ConfigError::Invalid { field, .. }) if field == "client_encryption.key_file"
    ));
  }

  #[test]
  fn test_unknown_compression_rejected() {
    let file = write_config(&FULL.replace("compression: gzip", "compression: zstd"));
    assert!(matches!(
      Config::load(file.path()),
      Err(ConfigError::Parse { .. })
    ));
  }

  #[test]
  fn test_missing_file() {
    assert!(matches!(
      Config::load("/nonexistent/tiersnap.yaml"),
      Err(ConfigError::Read { .. })
    ));
  }
}
