//! In-memory log storage.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LogEntry, LogStore, NewLogEntry, Result, StorageError, UpdateOutcome};

/// Log store that keeps entries in process memory.
#[derive(Default)]
pub struct MemoryLogStore {
    entries: RwLock<Vec<LogEntry>>,
    fail_on_insert: RwLock<bool>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_insert(&self, fail: bool) {
        *self.fail_on_insert.write().await = fail;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn insert(&self, entry: NewLogEntry) -> Result<String> {
        if *self.fail_on_insert.read().await {
            return Err(StorageError::Backend("Mock insert failure".to_string()));
        }

        let now = Utc::now();
        let id = Uuid::new_v4().simple().to_string();
        self.entries.write().await.push(LogEntry {
            id: id.clone(),
            name: entry.name,
            data: entry.data,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn all(&self) -> Result<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self.entries.read().await.iter().rev().cloned().collect();
        // Stable sort keeps later inserts first among equal timestamps
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn get_one(&self, id: &str) -> Result<LogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn update(&self, entry: &LogEntry) -> Result<UpdateOutcome> {
        let mut entries = self.entries.write().await;
        let Some(stored) = entries.iter_mut().find(|e| e.id == entry.id) else {
            return Ok(UpdateOutcome::default());
        };

        let modified = stored.name != entry.name || stored.data != entry.data;
        stored.name = entry.name.clone();
        stored.data = entry.data.clone();
        stored.updated_at = Utc::now();

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn drop_collection(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_stamps_timestamps() {
        let store = MemoryLogStore::new();
        let id = store
            .insert(NewLogEntry::new("authentication", "x logged in"))
            .await
            .unwrap();

        let entry = store.get_one(&id).await.unwrap();
        assert_eq!(entry.name, "authentication");
        assert_eq!(entry.data, "x logged in");
        assert!(entry.created_at.timestamp() > 0);
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[tokio::test]
    async fn test_all_newest_first() {
        let store = MemoryLogStore::new();
        for name in ["first", "second", "third"] {
            store.insert(NewLogEntry::new(name, "")).await.unwrap();
        }

        let names: Vec<String> = store.all().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_get_one_missing() {
        let store = MemoryLogStore::new();
        let result = store.get_one("nope").await;
        assert!(matches!(result, Err(StorageError::NotFound(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn test_update_existing_and_missing() {
        let store = MemoryLogStore::new();
        let id = store.insert(NewLogEntry::new("a", "1")).await.unwrap();

        let mut entry = store.get_one(&id).await.unwrap();
        entry.data = "2".to_string();
        let outcome = store.update(&entry).await.unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });
        assert_eq!(store.get_one(&id).await.unwrap().data, "2");

        entry.id = "missing".to_string();
        let outcome = store.update(&entry).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn test_drop_collection() {
        let store = MemoryLogStore::new();
        store.insert(NewLogEntry::new("a", "1")).await.unwrap();
        store.drop_collection().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fail_on_insert() {
        let store = MemoryLogStore::new();
        store.set_fail_on_insert(true).await;
        assert!(store.insert(NewLogEntry::new("a", "1")).await.is_err());
        assert_eq!(store.len().await, 0);
    }
}
