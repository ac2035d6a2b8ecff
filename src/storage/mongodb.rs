//! MongoDB log storage.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Collection};
use tracing::{debug, error, info};

use super::{
    with_timeout, LogEntry, LogStore, NewLogEntry, Result, StorageConfig, StorageError,
    UpdateOutcome,
};

/// MongoDB implementation of LogStore.
///
/// Every call runs under the configured per-call timeout.
pub struct MongoLogStore {
    logs: Collection<Document>,
    timeout: Duration,
}

impl MongoLogStore {
    /// Connect using the storage configuration.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(password.clone())
                    .build(),
            );
        }

        let client = Client::with_options(options)?;

        info!(
            database = %config.database,
            collection = %config.collection,
            "Connected to MongoDB"
        );

        Ok(Self::new(
            &client,
            &config.database,
            &config.collection,
            config.timeout(),
        ))
    }

    pub fn new(client: &Client, database: &str, collection: &str, timeout: Duration) -> Self {
        Self {
            logs: client.database(database).collection(collection),
            timeout,
        }
    }
}

fn parse_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| StorageError::InvalidId(id.to_string()))
}

fn to_bson_time(t: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(t.timestamp_millis())
}

fn from_bson_time(t: &BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or_default()
}

fn entry_from_document(document: &Document) -> Result<LogEntry> {
    let id = document
        .get_object_id("_id")
        .map_err(|e| StorageError::Backend(format!("Document without _id: {}", e)))?;

    Ok(LogEntry {
        id: id.to_hex(),
        name: document.get_str("name").unwrap_or_default().to_string(),
        data: document.get_str("data").unwrap_or_default().to_string(),
        created_at: document
            .get_datetime("created_at")
            .map(from_bson_time)
            .unwrap_or_default(),
        updated_at: document
            .get_datetime("updated_at")
            .map(from_bson_time)
            .unwrap_or_default(),
    })
}

#[async_trait]
impl LogStore for MongoLogStore {
    async fn insert(&self, entry: NewLogEntry) -> Result<String> {
        let now = to_bson_time(Utc::now());
        let document = doc! {
            "name": &entry.name,
            "data": &entry.data,
            "created_at": now,
            "updated_at": now,
        };

        with_timeout(self.timeout, async {
            let result = self.logs.insert_one(document).await.map_err(|e| {
                error!(error = %e, "Error inserting into logs");
                StorageError::from(e)
            })?;
            Ok(result
                .inserted_id
                .as_object_id()
                .map(|id| id.to_hex())
                .unwrap_or_default())
        })
        .await
    }

    async fn all(&self) -> Result<Vec<LogEntry>> {
        with_timeout(self.timeout, async {
            let cursor = self
                .logs
                .find(doc! {})
                .sort(doc! { "created_at": -1 })
                .await?;
            let documents: Vec<Document> = cursor.try_collect().await?;
            documents.iter().map(entry_from_document).collect()
        })
        .await
    }

    async fn get_one(&self, id: &str) -> Result<LogEntry> {
        let oid = parse_id(id)?;

        with_timeout(self.timeout, async {
            match self.logs.find_one(doc! { "_id": oid }).await? {
                Some(document) => entry_from_document(&document),
                None => Err(StorageError::NotFound(id.to_string())),
            }
        })
        .await
    }

    async fn update(&self, entry: &LogEntry) -> Result<UpdateOutcome> {
        let oid = parse_id(&entry.id)?;
        let update = doc! {
            "$set": {
                "name": &entry.name,
                "data": &entry.data,
                "updated_at": to_bson_time(Utc::now()),
            }
        };

        with_timeout(self.timeout, async {
            let result = self.logs.update_one(doc! { "_id": oid }, update).await?;
            debug!(
                id = %entry.id,
                matched = result.matched_count,
                modified = result.modified_count,
                "Updated log entry"
            );
            Ok(UpdateOutcome {
                matched: result.matched_count,
                modified: result.modified_count,
            })
        })
        .await
    }

    async fn drop_collection(&self) -> Result<()> {
        with_timeout(self.timeout, async {
            self.logs.drop().await?;
            Ok(())
        })
        .await
    }
}
