use std::io::{Read, Write};

use tiersnap_artifact::Compression;

use crate::SnapshotError;

/// Compress a dump according to the configured mode.
pub fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>, SnapshotError> {
  let err = |e: std::io::Error| SnapshotError::Compression(e.to_string());
  match compression {
    Compression::None => Ok(data.to_vec()),
    Compression::Gzip => {
      let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
      encoder.write_all(data).map_err(err)?;
      encoder.finish().map_err(err)
    }
    Compression::Bzip2 => {
      let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
      encoder.write_all(data).map_err(err)?;
      encoder.finish().map_err(err)
    }
  }
}

/// Reverse [`compress`].
pub fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>, SnapshotError> {
  let err = |e: std::io::Error| SnapshotError::Compression(e.to_string());
  let mut output = Vec::new();
  match compression {
    Compression::None => output.extend_from_slice(data),
    Compression::Gzip => {
      flate2::read::GzDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(err)?;
    }
    Compression::Bzip2 => {
      bzip2::read::BzDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(err)?;
    }
  }
  Ok(output)
}
