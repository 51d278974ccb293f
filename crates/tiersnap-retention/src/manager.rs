//! Tier bootstrap, refresh and pruning.

use std::sync::Arc;

use tiersnap_artifact::{Tier, age_seconds, newest_key, oldest_key, parse_timestamp, promoted_key};
use tiersnap_config::MaxCounts;
use tiersnap_snapshot::SnapshotProducer;
use tiersnap_store::{ObjectStore, empty_stream};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::RetentionError;

/// What a refresh did to a single tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
  /// The newest artifact is younger than the tier threshold.
  Fresh { newest: String, age_seconds: i64 },
  /// A new hourly snapshot was uploaded.
  Produced { key: String },
  /// The newest artifact of the source tier was copied in.
  Promoted { source: String, key: String },
  /// The source tier had nothing to promote.
  SourceEmpty { source_tier: Tier },
}

/// Summary of a full [`RetentionManager::manage`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManageReport {
  /// Tier markers created during bootstrap.
  pub created_markers: Vec<String>,
  /// Refresh outcome per tier, in processing order.
  pub refreshed: Vec<(Tier, RefreshOutcome)>,
  /// Keys deleted while pruning, in deletion order.
  pub pruned: Vec<String>,
}

/// Keeps the four backup tiers fresh and bounded.
///
/// Generic over `C: Clock` so tests can pin the current time. Use
/// [`RetentionManager::new`] for wall-clock time or
/// [`RetentionManager::with_clock`] to supply a different clock.
pub struct RetentionManager<C: Clock = SystemClock> {
  store: Arc<dyn ObjectStore>,
  producer: Arc<dyn SnapshotProducer>,
  max_counts: MaxCounts,
  clock: C,
}

impl RetentionManager<SystemClock> {
  pub fn new(
    store: Arc<dyn ObjectStore>,
    producer: Arc<dyn SnapshotProducer>,
    max_counts: MaxCounts,
  ) -> Result<Self, RetentionError> {
    Self::with_clock(store, producer, max_counts, SystemClock)
  }
}

impl<C: Clock> RetentionManager<C> {
  pub fn with_clock(
    store: Arc<dyn ObjectStore>,
    producer: Arc<dyn SnapshotProducer>,
    max_counts: MaxCounts,
    clock: C,
  ) -> Result<Self, RetentionError> {
    max_counts.validate()?;
    Ok(Self {
      store,
      producer,
      max_counts,
      clock,
    })
  }

  /// Run the full pipeline: bootstrap, refresh every tier, prune every tier.
  ///
  /// The first failure stops the run. Nothing is retried.
  pub async fn manage(&self) -> Result<ManageReport, RetentionError> {
    let mut report = ManageReport {
      created_markers: self.bootstrap().await?,
      ..Default::default()
    };

    for tier in Tier::ALL {
      let outcome = self.refresh(tier).await?;
      report.refreshed.push((tier, outcome));
    }

    for tier in Tier::ALL {
      let deleted = self.prune(tier).await?;
      report.pruned.extend(deleted);
    }

    info!(
      markers = report.created_markers.len(),
      pruned = report.pruned.len(),
      "retention run finished"
    );
    Ok(report)
  }

  /// Create the marker of every tier missing from the bucket.
  ///
  /// Issues one list call and one put per missing marker. Returns the
  /// markers that were created.
  pub async fn bootstrap(&self) -> Result<Vec<String>, RetentionError> {
    let existing = self.store.list("").await?;
    let mut created = Vec::new();

    for tier in Tier::ALL {
      let marker = tier.prefix();
      if existing.iter().any(|object| object.key == marker) {
        continue;
      }
      self.store.put(&marker, empty_stream()).await?;
      info!(tier = %tier, marker = %marker, "created tier marker");
      created.push(marker);
    }

    Ok(created)
  }

  /// Make sure `tier` holds an artifact younger than its threshold.
  pub async fn refresh(&self, tier: Tier) -> Result<RefreshOutcome, RetentionError> {
    let keys = self.list_tier(tier).await?;

    if let Some(newest) = newest_key(&keys) {
      let age = age_seconds(newest, self.clock.now())?;
      if age < 0 {
        warn!(tier = %tier, key = %newest, age, "newest artifact is dated in the future");
      }
      if age < tier.freshness_threshold() {
        debug!(tier = %tier, key = %newest, age, "tier is fresh");
        return Ok(RefreshOutcome::Fresh {
          newest: newest.to_string(),
          age_seconds: age,
        });
      }
      debug!(tier = %tier, key = %newest, age, "tier is stale");
    } else {
      debug!(tier = %tier, "tier is empty");
    }

    match tier.source() {
      None => {
        let key = self.producer.produce_and_upload().await?;
        info!(tier = %tier, key = %key, "produced snapshot");
        Ok(RefreshOutcome::Produced { key })
      }
      Some(source_tier) => self.promote(source_tier, tier).await,
    }
  }

  async fn promote(&self, source_tier: Tier, tier: Tier) -> Result<RefreshOutcome, RetentionError> {
    let source_keys = self.list_tier(source_tier).await?;
    let Some(source) = newest_key(&source_keys) else {
      warn!(tier = %tier, source_tier = %source_tier, "source tier is empty, skipping promotion");
      return Ok(RefreshOutcome::SourceEmpty { source_tier });
    };

    let key = promoted_key(source, tier)?;
    self.store.copy(source, &key).await?;
    info!(tier = %tier, source = %source, key = %key, "promoted artifact");

    Ok(RefreshOutcome::Promoted {
      source: source.to_string(),
      key,
    })
  }

  /// Delete the oldest artifacts of `tier` until it holds at most its
  /// configured maximum. The tier is listed again after every delete.
  pub async fn prune(&self, tier: Tier) -> Result<Vec<String>, RetentionError> {
    let max = self.max_counts.get(tier);
    let mut deleted: Vec<String> = Vec::new();

    loop {
      let keys = self.list_tier(tier).await?;
      if let Some(last) = deleted.last()
        && keys.contains(last)
      {
        return Err(RetentionError::PruneStalled(last.clone()));
      }
      if keys.len() <= max {
        break;
      }
      let Some(oldest) = oldest_key(&keys) else {
        break;
      };

      self.store.delete(oldest).await?;
      info!(tier = %tier, key = %oldest, count = keys.len(), max, "pruned artifact");
      deleted.push(oldest.to_string());
    }

    Ok(deleted)
  }

  /// List the artifact keys of a tier, excluding folder markers.
  ///
  /// Fails on the first key that does not carry a valid timestamp.
  async fn list_tier(&self, tier: Tier) -> Result<Vec<String>, RetentionError> {
    let objects = self.store.list(&tier.prefix()).await?;

    let mut keys = Vec::with_capacity(objects.len());
    for object in objects {
      if object.is_marker() {
        continue;
      }
      parse_timestamp(&object.key)?;
      keys.push(object.key);
    }
    Ok(keys)
  }
}
