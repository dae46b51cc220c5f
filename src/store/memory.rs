use super::{Collection, DocumentStore, Row, StoreError, StoreResult, StoredDoc};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Entry {
    generation: u64,
    rev: String,
    body: Value,
}

/// Process-local store with CouchDB-style revision checks.
///
/// Used for dry runs and tests. Counts successful writes so callers can
/// assert that a re-run wrote nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Entry>>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful inserts and updates since creation.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .lock()
            .map(|c| c.get(&collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<StoredDoc>> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|entry| StoredDoc {
                id: id.to_owned(),
                rev: entry.rev.clone(),
                body: entry.body.clone(),
            }))
    }

    async fn list(&self, collection: Collection, include_docs: bool) -> StoreResult<Vec<Row>> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, entry)| Row {
                        id: id.clone(),
                        rev: entry.rev.clone(),
                        doc: include_docs.then(|| entry.body.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        rev: Option<&str>,
    ) -> StoreResult<String> {
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let docs = collections.entry(collection).or_default();

        let generation = match (docs.get(id), rev) {
            (None, None) => 1,
            (Some(current), Some(rev)) if current.rev == rev => current.generation + 1,
            _ => {
                return Err(StoreError::Conflict { collection, id: id.to_owned() });
            }
        };

        let rev = format!("{generation}-{:016x}", revision_salt(id, generation));
        docs.insert(
            id.to_owned(),
            Entry { generation, rev: rev.clone(), body: doc.clone() },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(rev)
    }
}

/// Cheap FNV-1a over id and generation, just so revisions look opaque.
fn revision_salt(id: &str, generation: u64) -> u64 {
    id.bytes()
        .chain(generation.to_le_bytes())
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_update_with_current_rev() {
        let store = MemoryStore::new();
        let first = store
            .insert(Collection::Players, "Ben Simmons", &json!({"birthplace": "Melbourne, Australia"}), None)
            .await
            .unwrap();
        assert!(first.starts_with("1-"));

        let second = store
            .insert(Collection::Players, "Ben Simmons", &json!({"birthplace": "Melbourne, Australia", "team_id": "philadelphia-76ers"}), Some(&first))
            .await
            .unwrap();
        assert!(second.starts_with("2-"));

        let stored = store.get(Collection::Players, "Ben Simmons").await.unwrap().unwrap();
        assert_eq!(stored.rev, second);
        assert_eq!(stored.body["team_id"], "philadelphia-76ers");
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn create_over_existing_and_stale_rev_conflict() {
        let store = MemoryStore::new();
        let rev = store.insert(Collection::Games, "g1", &json!({}), None).await.unwrap();
        store.insert(Collection::Games, "g1", &json!({"v": 2}), Some(&rev)).await.unwrap();

        let again = store.insert(Collection::Games, "g1", &json!({}), None).await;
        assert!(matches!(again, Err(StoreError::Conflict { .. })));

        let stale = store.insert(Collection::Games, "g1", &json!({}), Some(&rev)).await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));

        let phantom = store.insert(Collection::Games, "g2", &json!({}), Some("1-abc")).await;
        assert!(matches!(phantom, Err(StoreError::Conflict { .. })));
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id_and_bodies_are_optional() {
        let store = MemoryStore::new();
        for id in ["utah-jazz", "atlanta-hawks", "miami-heat"] {
            store.insert(Collection::Teams, id, &json!({"team_id": id}), None).await.unwrap();
        }

        let ids: Vec<String> = store
            .list(Collection::Teams, false)
            .await
            .unwrap()
            .into_iter()
            .map(|row| {
                assert!(row.doc.is_none());
                row.id
            })
            .collect();
        assert_eq!(ids, vec!["atlanta-hawks", "miami-heat", "utah-jazz"]);

        let rows = store.list(Collection::Teams, true).await.unwrap();
        assert_eq!(rows[0].doc.as_ref().unwrap()["team_id"], "atlanta-hawks");
        assert!(store.list(Collection::Results, true).await.unwrap().is_empty());
    }
}
