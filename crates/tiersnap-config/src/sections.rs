use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tiersnap_artifact::{Compression, Tier};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
  pub bucket: String,
  /// Log at info level when true, warn otherwise.
  #[serde(default = "default_true")]
  pub output: bool,
  #[serde(default)]
  pub compression: Compression,
  #[serde(default)]
  pub add_sql_extension: bool,
  /// Pass `--add-drop-table` to the dump tool.
  #[serde(default)]
  pub mirror_default_opt: bool,
  pub maximum_backup_counts: MaxCounts,
}

impl AppConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.bucket.trim().is_empty() {
      return Err(ConfigError::invalid("app.bucket", "must not be empty"));
    }
    self.maximum_backup_counts.validate()
  }
}

/// Retention cap per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxCounts {
  pub hourly: usize,
  pub daily: usize,
  pub monthly: usize,
  pub yearly: usize,
}

impl MaxCounts {
  pub fn get(&self, tier: Tier) -> usize {
    match tier {
      Tier::Hourly => self.hourly,
      Tier::Daily => self.daily,
      Tier::Monthly => self.monthly,
      Tier::Yearly => self.yearly,
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    for tier in Tier::ALL {
      if self.get(tier) == 0 {
        return Err(ConfigError::invalid(
          &format!("app.maximum_backup_counts.{}", tier),
          "must be at least 1",
        ));
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
  Fs,
  S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
  pub backend: StoreBackend,
  /// Directory standing in for the bucket (fs backend).
  #[serde(default)]
  pub root: Option<PathBuf>,
  #[serde(default)]
  pub region: Option<String>,
  /// Custom endpoint, e.g. a MinIO deployment.
  #[serde(default)]
  pub endpoint: Option<String>,
}

impl StoreConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.backend == StoreBackend::Fs && self.root.is_none() {
      return Err(ConfigError::invalid(
        "store.root",
        "required for the fs backend",
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  pub dbname: String,
  pub username: String,
  #[serde(default)]
  pub password: String,
  #[serde(default = "default_dump_command")]
  pub dump_command: String,
}

impl MysqlConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.dbname.trim().is_empty() {
      return Err(ConfigError::invalid("mysql.dbname", "must not be empty"));
    }
    if self.dump_command.trim().is_empty() {
      return Err(ConfigError::invalid(
        "mysql.dump_command",
        "must not be empty",
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientEncryptionConfig {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub key_file: Option<PathBuf>,
}

impl ClientEncryptionConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if self.enabled && self.key_file.is_none() {
      return Err(ConfigError::invalid(
        "client_encryption.key_file",
        "required when encryption is enabled",
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
  #[serde(default)]
  pub webhook_url: Option<String>,
  #[serde(default)]
  pub sns_topic_arn: Option<String>,
}

impl NotifyConfig {
  pub(crate) fn validate(&self) -> Result<(), ConfigError> {
    if let Some(url) = &self.webhook_url
      && !(url.starts_with("http://") || url.starts_with("https://"))
    {
      return Err(ConfigError::invalid(
        "notify.webhook_url",
        "must be an http or https URL",
      ));
    }
    Ok(())
  }
}

fn default_true() -> bool {
  true
}

fn default_port() -> u16 {
  3306
}

fn default_dump_command() -> String {
  "mysqldump".to_string()
}
