use tiersnap_store::{ObjectStore, collect};
use tracing::info;

use crate::{Cipher, SnapshotError, is_encrypted};

/// Download an artifact, decrypting it if it was encrypted client-side.
///
/// Plain artifacts are returned unchanged. An encrypted artifact without a
/// `cipher` is an error.
pub async fn fetch_artifact(
  store: &dyn ObjectStore,
  key: &str,
  cipher: Option<&Cipher>,
) -> Result<Vec<u8>, SnapshotError> {
  let data = collect(store.get(key).await?).await?;

  if !is_encrypted(&data) {
    info!(key, bytes = data.len(), "downloaded artifact");
    return Ok(data.to_vec());
  }

  let Some(cipher) = cipher else {
    return Err(SnapshotError::Encryption(format!(
      "artifact {} is encrypted but client encryption is not enabled",
      key
    )));
  };

  let plain = cipher.decrypt(&data)?;
  info!(key, bytes = plain.len(), "downloaded and decrypted artifact");
  Ok(plain)
}
