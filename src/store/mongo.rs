//! MongoDB-backed record store
//!
//! Submissions and forms live in two collections of the same database.
//! Cursors are plain driver cursors; dropping one makes the driver kill the
//! server-side cursor, so closing is a matter of letting go of it.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Cursor, Database};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{Result, StoreError};
use crate::form::Form;
use crate::query::{Query, coerce_id};

use super::{FormResolver, RecordCursor, RecordSource};

/// Connect and verify the server answers a ping.
pub async fn connect(config: &ConnectionConfig) -> Result<Database> {
    let mut options = ClientOptions::parse(&config.uri).await?;
    let timeout = config.connect_timeout();
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    options.app_name = Some("submission-export".to_string());

    let client = Client::with_options(options)?;
    let database = client.database(&config.database);
    database.run_command(doc! { "ping": 1 }).await?;
    info!("Connected to database {}", config.database);
    Ok(database)
}

/// Record cursor over a MongoDB find
pub struct MongoRecordCursor {
    cursor: Option<Cursor<Document>>,
    fetched: u64,
    closed: bool,
}

impl MongoRecordCursor {
    pub fn new(cursor: Cursor<Document>) -> Self {
        Self {
            cursor: Some(cursor),
            fetched: 0,
            closed: false,
        }
    }
}

#[async_trait]
impl RecordCursor for MongoRecordCursor {
    async fn next(&mut self) -> Result<Option<Document>> {
        if self.closed {
            return Ok(None);
        }

        let cursor = match self.cursor.as_mut() {
            Some(c) => c,
            None => return Ok(None),
        };

        match cursor.try_next().await {
            Ok(Some(doc)) => {
                self.fetched += 1;
                Ok(Some(doc))
            }
            Ok(None) => {
                debug!("Record cursor exhausted after {} records", self.fetched);
                self.cursor = None;
                self.closed = true;
                Ok(None)
            }
            Err(e) => {
                // On error, close cursor to release resources
                self.cursor = None;
                self.closed = true;
                Err(StoreError::Driver(e).into())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            // Explicitly drop cursor to release server resources
            self.cursor = None;
            self.closed = true;
            info!("Closed record cursor after fetching {} records", self.fetched);
        }
        Ok(())
    }

    fn fetched(&self) -> u64 {
        self.fetched
    }
}

impl Drop for MongoRecordCursor {
    fn drop(&mut self) {
        if !self.closed {
            debug!("MongoRecordCursor dropped without explicit close");
            self.cursor = None;
        }
    }
}

/// Opens find cursors over the submissions collection
#[derive(Clone)]
pub struct MongoSource {
    collection: Collection<Document>,
    batch_size: u32,
}

impl MongoSource {
    /// # Arguments
    /// * `database` - Database holding submissions
    /// * `collection` - Submissions collection name
    /// * `batch_size` - Documents per server round trip
    pub fn new(database: &Database, collection: &str, batch_size: u32) -> Self {
        Self {
            collection: database.collection(collection),
            batch_size,
        }
    }
}

#[async_trait]
impl RecordSource for MongoSource {
    async fn open(&self, query: &Query) -> Result<Box<dyn RecordCursor>> {
        debug!(
            "Opening cursor on {} (batch size {})",
            self.collection.name(),
            self.batch_size
        );
        let cursor = self
            .collection
            .find(query.filter().clone())
            .batch_size(self.batch_size)
            .await?;
        Ok(Box::new(MongoRecordCursor::new(cursor)))
    }
}

/// Reads form definitions from the forms collection
#[derive(Clone)]
pub struct MongoFormStore {
    collection: Collection<Document>,
}

impl MongoFormStore {
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }
}

#[async_trait]
impl FormResolver for MongoFormStore {
    async fn load_form(&self, form_id: &str) -> Result<Option<Form>> {
        let filter = doc! { "_id": coerce_id(form_id), "deleted": { "$eq": Bson::Null } };
        let Some(doc) = self.collection.find_one(filter).await? else {
            return Ok(None);
        };

        mongodb::bson::from_document(doc)
            .map(Some)
            .map_err(|e| StoreError::Decode(e.to_string()).into())
    }
}
