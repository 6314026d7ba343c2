use crate::diagnostics::{DiagnosticSink, NoopSink, TracingSink};
use crate::request::Outcome;
use crate::Result;
use couchlet_core::{
    encode_id, revision_from_etag, ClientConfig, ConnectionDescriptor, Document, Existence,
    UuidsResponse, WriteResponse,
};
use reqwest::header::ETAG;
use reqwest::Client as HttpClient;
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Document database REST API Client
#[derive(Clone)]
pub struct Client {
    pub(crate) descriptor: Arc<ConnectionDescriptor>,
    pub(crate) http: HttpClient,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
    default_uuid_count: usize,
}

/// Options for `save` and `delete`
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Fetch the current revision right before writing and overwrite with it.
    /// Last write wins; a concurrent writer can still cause a conflict.
    pub force: bool,
}

impl WriteOptions {
    pub fn force() -> Self {
        Self { force: true }
    }
}

/// What `ensure_db` found
#[derive(Debug, Clone)]
pub enum EnsureDb {
    Existing,
    Created(Outcome),
}

impl Client {
    /// Create a new client for the database at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&ClientConfig::new(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let descriptor = config.descriptor()?;
        let sink: Arc<dyn DiagnosticSink> = if config.trace_requests {
            Arc::new(TracingSink)
        } else {
            Arc::new(NoopSink)
        };

        // 3xx responses are failures, never followed
        let http = HttpClient::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            descriptor: Arc::new(descriptor),
            http,
            sink,
            default_uuid_count: config.default_uuid_count,
        })
    }

    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Swap in a pre-built transport. It should not follow redirects.
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Create the database unless it already exists
    pub async fn ensure_db(&self) -> Result<EnsureDb> {
        if self.exists("").await?.exists {
            return Ok(EnsureDb::Existing);
        }
        let outcome = self.create_db().await?;
        Ok(EnsureDb::Created(outcome))
    }

    pub async fn create_db(&self) -> Result<Outcome> {
        self.request(Method::PUT, "", None).await
    }

    /// Database metadata (`GET` on the database root)
    pub async fn info(&self) -> Result<Outcome> {
        self.request(Method::GET, "", None).await
    }

    /// `HEAD` the document. A 404 means "does not exist", not an error.
    ///
    /// An empty id checks the database itself.
    pub async fn exists(&self, id: &str) -> Result<Existence> {
        match self.request(Method::HEAD, &encode_id(id), None).await {
            Ok(outcome) => Ok(Existence {
                exists: outcome.status() == 200,
                rev: outcome.response.header(ETAG.as_str()).map(revision_from_etag),
            }),
            Err(e) if e.is_not_found() && e.response().is_some() => Ok(Existence::missing()),
            Err(e) => Err(e),
        }
    }

    /// Fetch a document; `query` entries become query parameters
    pub async fn get(&self, id: &str, query: Option<Map<String, Value>>) -> Result<Outcome> {
        self.request(Method::GET, &encode_id(id), query.map(Value::Object))
            .await
    }

    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.get(id, None).await?.json()
    }

    /// Write a document. `PUT` when a non-empty `id` is given, `POST` otherwise.
    ///
    /// Without `force` the caller supplies the right `_rev` and `doc` is left
    /// untouched. With `force` (and an id) the current revision is looked up
    /// first and written into `doc`, then `_id`/`_rev` from the response are
    /// written back.
    pub async fn save(&self, id: Option<&str>, doc: &mut Document, options: WriteOptions) -> Result<Outcome> {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            let body = serde_json::to_value(&*doc)?;
            return self.request(Method::POST, "", Some(body)).await;
        };

        let path = encode_id(id);
        if !options.force {
            let body = serde_json::to_value(&*doc)?;
            return self.request(Method::PUT, &path, Some(body)).await;
        }

        let current = self.exists(id).await?;
        if let (true, Some(rev)) = (current.exists, current.rev) {
            tracing::debug!("Forcing save of {} over revision {}", id, rev);
            doc.set_rev(rev);
        }

        let body = serde_json::to_value(&*doc)?;
        let outcome = self.request(Method::PUT, &path, Some(body)).await?;
        let written: WriteResponse = outcome.json()?;
        doc.set_id(written.id);
        doc.set_rev(written.rev);
        Ok(outcome)
    }

    /// Delete a document at `rev`; with `force` the current revision is used instead
    pub async fn delete(&self, id: &str, rev: Option<&str>, options: WriteOptions) -> Result<Outcome> {
        let mut args = Map::new();
        if let Some(rev) = rev {
            args.insert("rev".to_string(), Value::String(rev.to_string()));
        }

        if options.force {
            let current = self.exists(id).await?;
            if let (true, Some(rev)) = (current.exists, current.rev) {
                tracing::debug!("Forcing delete of {} at revision {}", id, rev);
                args.insert("rev".to_string(), Value::String(rev));
            }
        }

        self.request(Method::DELETE, &encode_id(id), Some(Value::Object(args)))
            .await
    }

    /// Allocate `count` ids from the server (configured default when `None`)
    pub async fn uuids(&self, count: Option<usize>) -> Result<Vec<String>> {
        let count = count.unwrap_or(self.default_uuid_count);
        let mut args = Map::new();
        args.insert("count".to_string(), Value::from(count));

        let outcome = self
            .request_at_root(Method::GET, "_uuids", Some(Value::Object(args)))
            .await?;
        let response: UuidsResponse = outcome.json()?;
        Ok(response.uuids)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("descriptor", &self.descriptor)
            .field("default_uuid_count", &self.default_uuid_count)
            .finish()
    }
}
