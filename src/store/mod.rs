mod couch;
mod memory;

pub use couch::CouchStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// The document collections the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Teams,
    Games,
    Results,
    Players,
    Processed,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Teams,
        Collection::Games,
        Collection::Results,
        Collection::Players,
        Collection::Processed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Teams => "teams",
            Collection::Games => "games",
            Collection::Results => "results",
            Collection::Players => "players",
            Collection::Processed => "processed",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document as read back from the store, with its current revision token.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub id: String,
    pub rev: String,
    pub body: Value,
}

impl StoredDoc {
    pub fn decode<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<T> {
        serde_json::from_value(self.body.clone()).map_err(|source| StoreError::Malformed {
            collection,
            id: self.id.clone(),
            source,
        })
    }
}

/// One entry of a collection listing; `doc` is only set when bodies were asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub rev: String,
    pub doc: Option<Value>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The supplied revision is not the document's current one (or the
    /// document exists and no revision was supplied).
    #[error("Document update conflict: {collection}/{id}")]
    Conflict { collection: Collection, id: String },
    #[error("Store request failed for {0}: {1}")]
    Transport(String, #[source] reqwest::Error),
    #[error("Store returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("Malformed document {collection}/{id}: {source}")]
    Malformed {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Minimal document-store contract: keyed reads, ordered listings, and
/// revision-checked writes. Nothing is ever deleted through it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<StoredDoc>>;

    /// All documents ordered by id.
    async fn list(&self, collection: Collection, include_docs: bool) -> StoreResult<Vec<Row>>;

    /// Create `id` (no `rev`) or replace it (`rev` = current revision).
    /// Returns the new revision.
    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        rev: Option<&str>,
    ) -> StoreResult<String>;
}

pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Decode every listed body. Rows without a body, or whose body doesn't
/// decode, are skipped.
pub fn decode_rows<T: DeserializeOwned>(collection: Collection, rows: Vec<Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let body = row.doc?;
            match serde_json::from_value(body) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("skipping malformed {collection}/{}: {e}", row.id);
                    None
                }
            }
        })
        .collect()
}
