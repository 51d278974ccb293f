use serde::{Deserialize, Serialize};

/// Compression applied to a dump before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
  #[default]
  None,
  Gzip,
  Bzip2,
}

impl Compression {
  /// The artifact extension for this compression mode.
  ///
  /// With `add_sql_extension`, compressed dumps are named `sql.gz` or
  /// `sql.bz2` instead of `gz` or `bz2`. Uncompressed dumps are always `sql`.
  pub fn extension(&self, add_sql_extension: bool) -> &'static str {
    match (self, add_sql_extension) {
      (Compression::None, _) => "sql",
      (Compression::Gzip, true) => "sql.gz",
      (Compression::Gzip, false) => "gz",
      (Compression::Bzip2, true) => "sql.bz2",
      (Compression::Bzip2, false) => "bz2",
    }
  }
}
