use tiersnap_config::ConfigError;
use tiersnap_snapshot::SnapshotError;

/// Error type for retention runs.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
  /// A listed key does not parse as an artifact key.
  #[error("malformed key: {0}")]
  MalformedKey(#[from] tiersnap_artifact::Error),

  /// A list, put, copy or delete call failed.
  #[error("object store error: {0}")]
  ObjectStore(#[from] tiersnap_store::Error),

  /// The snapshot producer failed.
  #[error("snapshot production failed: {0}")]
  Production(#[from] SnapshotError),

  /// The manager was given settings it cannot run with.
  #[error("configuration error: {0}")]
  Configuration(#[from] ConfigError),

  /// A deleted key was still listed on the next pass.
  #[error("prune made no progress: '{0}' is still listed after delete")]
  PruneStalled(String),
}
