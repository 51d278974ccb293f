use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A retention granularity.
///
/// Tiers are ordered from finest to coarsest. Every tier except `Hourly` is
/// fed only by promotion from the tier immediately finer than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
  Hourly,
  Daily,
  Monthly,
  Yearly,
}

impl Tier {
  /// All tiers in processing order, finest first.
  pub const ALL: [Tier; 4] = [Tier::Hourly, Tier::Daily, Tier::Monthly, Tier::Yearly];

  /// The namespace name of this tier.
  pub fn as_str(&self) -> &'static str {
    match self {
      Tier::Hourly => "hourly",
      Tier::Daily => "daily",
      Tier::Monthly => "monthly",
      Tier::Yearly => "yearly",
    }
  }

  /// The key prefix of this tier, which is also its folder marker key.
  pub fn prefix(&self) -> String {
    format!("{}/", self.as_str())
  }

  /// Maximum age in seconds the newest artifact may reach before the tier
  /// needs a new one.
  ///
  /// Hourly is 59 minutes so that a run scheduled every hour is not skipped
  /// because of scheduler or processing lag.
  pub fn freshness_threshold(&self) -> i64 {
    match self {
      Tier::Hourly => 3_540,
      Tier::Daily => 86_400,
      // 30.4 days
      Tier::Monthly => 2_626_560,
      // 365.25 days
      Tier::Yearly => 31_557_600,
    }
  }

  /// The tier this one is promoted from, or `None` for the source tier.
  pub fn source(&self) -> Option<Tier> {
    match self {
      Tier::Hourly => None,
      Tier::Daily => Some(Tier::Hourly),
      Tier::Monthly => Some(Tier::Daily),
      Tier::Yearly => Some(Tier::Monthly),
    }
  }
}

impl fmt::Display for Tier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Tier {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Tier::ALL
      .into_iter()
      .find(|tier| tier.as_str() == s)
      .ok_or_else(|| Error::UnknownTier(s.to_string()))
  }
}
