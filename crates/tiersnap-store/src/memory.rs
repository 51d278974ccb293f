use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{ByteStream, Error, ObjectInfo, ObjectStore, bytes_stream, collect};

/// A call made against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  List(String),
  Get(String),
  Put(String),
  Copy { source: String, destination: String },
  Delete(String),
}

/// An operation kind that a [`MemoryStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
  List,
  Get,
  Put,
  Copy,
  Delete,
}

#[derive(Debug, Clone)]
struct Entry {
  data: Bytes,
  last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
  objects: BTreeMap<String, Entry>,
  operations: Vec<Operation>,
  fail_points: HashSet<FailPoint>,
}

/// In-memory object store.
///
/// Every call is appended to an operation log, which tests use to assert
/// exactly which writes a run issued. Individual operation kinds can be made
/// to fail with [`MemoryStore::fail_on`].
#[derive(Debug, Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed an object without recording an operation.
  pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
    let mut state = self.state.lock().await;
    state.objects.insert(
      key.into(),
      Entry {
        data: data.into(),
        last_modified: Utc::now(),
      },
    );
  }

  /// All keys currently stored, sorted.
  pub async fn keys(&self) -> Vec<String> {
    self.state.lock().await.objects.keys().cloned().collect()
  }

  /// Stored data for a key, without recording an operation.
  pub async fn data(&self, key: &str) -> Option<Bytes> {
    self
      .state
      .lock()
      .await
      .objects
      .get(key)
      .map(|e| e.data.clone())
  }

  /// Every operation issued so far, in order.
  pub async fn operations(&self) -> Vec<Operation> {
    self.state.lock().await.operations.clone()
  }

  /// Operations that create or remove keys.
  pub async fn writes(&self) -> Vec<Operation> {
    self
      .operations()
      .await
      .into_iter()
      .filter(|op| {
        matches!(
          op,
          Operation::Put(_) | Operation::Copy { .. } | Operation::Delete(_)
        )
      })
      .collect()
  }

  /// Forget the operation log.
  pub async fn clear_operations(&self) {
    self.state.lock().await.operations.clear();
  }

  /// Make every subsequent operation of this kind fail.
  pub async fn fail_on(&self, point: FailPoint) {
    self.state.lock().await.fail_points.insert(point);
  }

  fn check(state: &State, point: FailPoint, operation: &str) -> Result<(), Error> {
    if state.fail_points.contains(&point) {
      return Err(Error::Backend {
        operation: operation.to_string(),
        message: "injected failure".to_string(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl ObjectStore for MemoryStore {
  async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, Error> {
    let mut state = self.state.lock().await;
    state.operations.push(Operation::List(prefix.to_string()));
    Self::check(&state, FailPoint::List, "list")?;

    Ok(
      state
        .objects
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, entry)| ObjectInfo {
          key: key.clone(),
          size: entry.data.len() as u64,
          last_modified: entry.last_modified,
        })
        .collect(),
    )
  }

  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let mut state = self.state.lock().await;
    state.operations.push(Operation::Get(key.to_string()));
    Self::check(&state, FailPoint::Get, "get")?;

    match state.objects.get(key) {
      Some(entry) => Ok(bytes_stream(entry.data.clone())),
      None => Err(Error::NotFound(key.to_string())),
    }
  }

  async fn put(&self, key: &str, data: ByteStream) -> Result<(), Error> {
    {
      let mut state = self.state.lock().await;
      state.operations.push(Operation::Put(key.to_string()));
      Self::check(&state, FailPoint::Put, "put")?;
    }

    let data = if key.ends_with('/') {
      Bytes::new()
    } else {
      collect(data).await?
    };

    let mut state = self.state.lock().await;
    state.objects.insert(
      key.to_string(),
      Entry {
        data,
        last_modified: Utc::now(),
      },
    );
    Ok(())
  }

  async fn copy(&self, source: &str, destination: &str) -> Result<(), Error> {
    let mut state = self.state.lock().await;
    state.operations.push(Operation::Copy {
      source: source.to_string(),
      destination: destination.to_string(),
    });
    Self::check(&state, FailPoint::Copy, "copy")?;

    let data = match state.objects.get(source) {
      Some(entry) => entry.data.clone(),
      None => return Err(Error::NotFound(source.to_string())),
    };
    state.objects.insert(
      destination.to_string(),
      Entry {
        data,
        last_modified: Utc::now(),
      },
    );
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    let mut state = self.state.lock().await;
    state.operations.push(Operation::Delete(key.to_string()));
    Self::check(&state, FailPoint::Delete, "delete")?;

    state.objects.remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::empty_stream;

  #[tokio::test]
  async fn test_list_by_prefix() {
    let store = MemoryStore::new();
    store.insert("daily/", "").await;
    store.insert("daily/2024-01-01_00-00-00.sql", "a").await;
    store.insert("hourly/2024-01-01_00-00-00.sql", "b").await;
    store.insert("hourlyish/2024-01-01_00-00-00.sql", "c").await;

    let listed: Vec<String> = store
      .list("hourly/")
      .await
      .unwrap()
      .into_iter()
      .map(|o| o.key)
      .collect();
    assert_eq!(listed, vec!["hourly/2024-01-01_00-00-00.sql"]);

    assert_eq!(store.list("").await.unwrap().len(), 4);
  }

  #[tokio::test]
  async fn test_records_operations() {
    let store = MemoryStore::new();
    store.put("hourly/", empty_stream()).await.unwrap();
    store
      .put("hourly/a.sql", bytes_stream("x"))
      .await
      .unwrap();
    store.copy("hourly/a.sql", "daily/a.sql").await.unwrap();
    store.delete("hourly/a.sql").await.unwrap();
    store.list("daily/").await.unwrap();

    assert_eq!(
      store.operations().await,
      vec![
        Operation::Put("hourly/".to_string()),
        Operation::Put("hourly/a.sql".to_string()),
        Operation::Copy {
          source: "hourly/a.sql".to_string(),
          destination: "daily/a.sql".to_string(),
        },
        Operation::Delete("hourly/a.sql".to_string()),
        Operation::List("daily/".to_string()),
      ]
    );
    assert_eq!(store.writes().await.len(), 4);
    assert_eq!(store.keys().await, vec!["daily/a.sql", "hourly/"]);
    assert_eq!(store.data("daily/a.sql").await, Some(Bytes::from("x")));
  }

  #[tokio::test]
  async fn test_delete_missing_key_succeeds() {
    let store = MemoryStore::new();
    assert!(store.delete("hourly/missing.sql").await.is_ok());
  }

  #[tokio::test]
  async fn test_copy_missing_source() {
    let store = MemoryStore::new();
    let result = store.copy("hourly/missing.sql", "daily/missing.sql").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(store.keys().await.is_empty());
  }

  #[tokio::test]
  async fn test_fail_points() {
    let store = MemoryStore::new();
    store.fail_on(FailPoint::Copy).await;
    store.insert("hourly/a.sql", "x").await;

    let result = store.copy("hourly/a.sql", "daily/a.sql").await;
    assert!(matches!(result, Err(Error::Backend { .. })));
    assert!(store.list("").await.is_ok());
  }
}
