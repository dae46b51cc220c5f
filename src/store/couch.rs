use super::{Collection, DocumentStore, Row, StoreError, StoreResult, StoredDoc};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// CouchDB (or Cloudant) over its HTTP document API.
///
/// Each collection is a database named `{prefix}{collection}`. Databases
/// and their security documents are expected to exist already.
#[derive(Debug, Clone)]
pub struct CouchStore {
    client: Client,
    base_url: String,
    prefix: String,
    credentials: Option<(String, Option<String>)>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct AllDocs {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
    value: AllDocsValue,
    #[serde(default)]
    doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AllDocsValue {
    rev: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    rev: String,
}

impl CouchStore {
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            prefix: prefix.into(),
            credentials: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    pub fn database(&self, collection: Collection) -> String {
        format!("{}{}", self.prefix, collection.name())
    }

    fn doc_url(&self, collection: Collection, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.database(collection),
            urlencoding::encode(id)
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, pass.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, url: &str, builder: RequestBuilder) -> StoreResult<reqwest::Response> {
        self.authed(builder)
            .send()
            .await
            .map_err(|e| StoreError::Transport(url.to_owned(), e))
    }

    async fn read_json<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> StoreResult<T> {
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(url.to_owned(), e))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn unexpected(url: &str, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::Status { status, url: url.to_owned(), body }
    }
}

/// Split CouchDB's `_id`/`_rev` bookkeeping out of a document body.
fn strip_meta(mut body: Value) -> (Option<String>, Value) {
    let rev = body.as_object_mut().and_then(|obj| {
        obj.remove("_id");
        obj.remove("_rev").and_then(|rev| rev.as_str().map(str::to_owned))
    });
    (rev, body)
}

#[async_trait]
impl DocumentStore for CouchStore {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<StoredDoc>> {
        let url = self.doc_url(collection, id);
        let response = self.send(&url, self.client.get(&url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => {
                let body: Value = Self::read_json(&url, response).await?;
                let (rev, body) = strip_meta(body);
                Ok(Some(StoredDoc {
                    id: id.to_owned(),
                    rev: rev.unwrap_or_default(),
                    body,
                }))
            }
            _ => Err(Self::unexpected(&url, response).await),
        }
    }

    async fn list(&self, collection: Collection, include_docs: bool) -> StoreResult<Vec<Row>> {
        let mut url = format!("{}/{}/_all_docs", self.base_url, self.database(collection));
        if include_docs {
            url.push_str("?include_docs=true");
        }
        let response = self.send(&url, self.client.get(&url)).await?;
        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(&url, response).await);
        }

        let all: AllDocs = Self::read_json(&url, response).await?;
        Ok(all
            .rows
            .into_iter()
            // Design documents aren't pipeline data.
            .filter(|row| !row.id.starts_with("_design/"))
            .map(|row| Row {
                id: row.id,
                rev: row.value.rev,
                doc: row.doc.map(|doc| strip_meta(doc).1),
            })
            .collect())
    }

    async fn insert(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        rev: Option<&str>,
    ) -> StoreResult<String> {
        let url = self.doc_url(collection, id);
        let mut body = doc.clone();
        if let (Some(rev), Some(obj)) = (rev, body.as_object_mut()) {
            obj.insert("_rev".into(), Value::String(rev.to_owned()));
        }

        debug!("PUT {url} (rev {rev:?})");
        let response = self.send(&url, self.client.put(&url).json(&body)).await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let put: PutResponse = Self::read_json(&url, response).await?;
                Ok(put.rev)
            }
            StatusCode::CONFLICT => Err(StoreError::Conflict { collection, id: id.to_owned() }),
            _ => Err(Self::unexpected(&url, response).await),
        }
    }
}
