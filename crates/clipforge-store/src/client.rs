//! Firestore REST API client.
//!
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter for idempotent calls
//! - Tracing spans and request metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::{record_documents_returned, record_request};
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::{Document, ListDocumentsResponse, RunQueryRequest, RunQueryResponse, StructuredQuery};

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
const LIST_PAGE_SIZE: u32 = 300;

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// API root, e.g. `https://firestore.googleapis.com/v1`
    pub endpoint: String,
    /// Talk to the emulator with a fixed `owner` token instead of a service account
    pub use_emulator: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                StoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;
        if project_id.is_empty() {
            return Err(StoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let emulator_host = std::env::var("FIRESTORE_EMULATOR_HOST")
            .ok()
            .filter(|h| !h.is_empty());
        let endpoint = match &emulator_host {
            Some(host) => format!("http://{}/v1", host),
            None => DEFAULT_ENDPOINT.to_string(),
        };

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            endpoint,
            use_emulator: emulator_host.is_some(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }

    pub fn new(project_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            endpoint: endpoint.into(),
            use_emulator: false,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Create a client authenticated from `GOOGLE_APPLICATION_CREDENTIALS`
    /// (or a fixed token when targeting the emulator).
    pub async fn new(config: FirestoreConfig) -> StoreResult<Self> {
        let token_cache = if config.use_emulator {
            TokenCache::fixed("owner")
        } else {
            TokenCache::new(Self::create_auth_provider()?)
        };
        Self::with_token_cache(config, token_cache)
    }

    /// Create a client with an explicit token cache.
    pub fn with_token_cache(config: FirestoreConfig, token_cache: TokenCache) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("clipforge-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let base_url = format!(
            "{}/projects/{}/databases/{}/documents",
            config.endpoint.trim_end_matches('/'),
            config.project_id,
            config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(token_cache),
        })
    }

    fn create_auth_provider() -> StoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            StoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(StoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    pub async fn from_env() -> StoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, urlencoding::encode(doc_id))
    }

    /// Send a request, refreshing the token once if it expired.
    async fn send_authorized<F>(&self, url: &str, build: F) -> StoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(StoreError::from_http_status(401, format!("{} failed: {}", url, body)));
        }
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(&token).send().await?)
    }

    /// Get a document.
    pub async fn get_document(&self, collection: &str, doc_id: &str) -> StoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);
        let url = url.as_str();
        with_retry(&self.config.retry, "get_document", move || async move {
            self.execute_request("get_document", collection, Some(doc_id), async move {
                let response = self
                    .send_authorized(url, |token| self.http.get(url).bearer_auth(token))
                    .await?;
                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Create a document; fails with `AlreadyExists` if the id is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        document: &Document,
    ) -> StoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.post(&url).bearer_auth(token).json(document))
                .await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json::<Document>().await?),
                StatusCode::CONFLICT => Err(StoreError::already_exists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Overwrite a document with exactly `document`'s fields (upsert).
    pub async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        document: &Document,
    ) -> StoreResult<Document> {
        let url = self.document_url(collection, doc_id);
        let url = url.as_str();
        with_retry(&self.config.retry, "set_document", move || async move {
            self.execute_request("set_document", collection, Some(doc_id), async move {
                let response = self
                    .send_authorized(url, |token| {
                        self.http.patch(url).bearer_auth(token).json(document)
                    })
                    .await?;
                match response.status() {
                    StatusCode::OK => Ok(response.json::<Document>().await?),
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Overwrite a document only if it was last written at `update_time`.
    ///
    /// Not retried: a retry after a lost response would fail its own
    /// precondition.
    pub async fn update_document_with_precondition(
        &self,
        collection: &str,
        doc_id: &str,
        document: &Document,
        update_time: &str,
    ) -> StoreResult<Document> {
        let url = format!(
            "{}?currentDocument.updateTime={}",
            self.document_url(collection, doc_id),
            urlencoding::encode(update_time)
        );

        self.execute_request("update_document_precondition", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.patch(&url).bearer_auth(token).json(document))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Document>().await?),
                StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                    let body = response.text().await.unwrap_or_default();
                    Err(StoreError::PreconditionFailed(format!("{}/{}: {}", collection, doc_id, body)))
                }
                StatusCode::BAD_REQUEST => {
                    let body = response.text().await.unwrap_or_default();
                    if body.contains("FAILED_PRECONDITION") {
                        Err(StoreError::PreconditionFailed(format!("{}/{}: {}", collection, doc_id, body)))
                    } else {
                        Err(StoreError::from_http_status(400, format!("{} failed: {}", url, body)))
                    }
                }
                StatusCode::NOT_FOUND => Err(StoreError::not_found(format!("{}/{}", collection, doc_id))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Missing documents count as deleted.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> StoreResult<()> {
        let url = self.document_url(collection, doc_id);
        let url = url.as_str();
        with_retry(&self.config.retry, "delete_document", move || async move {
            self.execute_request("delete_document", collection, Some(doc_id), async move {
                let response = self
                    .send_authorized(url, |token| self.http.delete(url).bearer_auth(token))
                    .await?;
                match response.status() {
                    StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                    StatusCode::NOT_FOUND => {
                        debug!("Document {}/{} already deleted", collection, doc_id);
                        Ok(())
                    }
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// List one page of documents in a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> StoreResult<ListDocumentsResponse> {
        let mut url = format!("{}/{}", self.base_url, collection);
        let mut params = Vec::new();
        if let Some(size) = page_size {
            params.push(format!("pageSize={}", size));
        }
        if let Some(token) = page_token {
            params.push(format!("pageToken={}", urlencoding::encode(token)));
        }
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }

        let url = url.as_str();
        with_retry(&self.config.retry, "list_documents", move || async move {
            self.execute_request("list_documents", collection, None, async move {
                let response = self
                    .send_authorized(url, |token| self.http.get(url).bearer_auth(token))
                    .await?;
                match response.status() {
                    StatusCode::OK => {
                        let list: ListDocumentsResponse = response.json().await?;
                        record_documents_returned(
                            collection,
                            list.documents.as_ref().map(|d| d.len()).unwrap_or(0),
                        );
                        Ok(list)
                    }
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// List every document in a collection, following page tokens.
    pub async fn list_all_documents(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_documents(collection, Some(LIST_PAGE_SIZE), page_token.as_deref())
                .await?;
            documents.extend(page.documents.unwrap_or_default());
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(documents),
            }
        }
    }

    /// Run a structured query.
    ///
    /// `parent_path` is the document containing the queried collection, or
    /// empty for a root collection.
    pub async fn run_query(&self, parent_path: &str, query: StructuredQuery) -> StoreResult<Vec<Document>> {
        let url = if parent_path.is_empty() {
            format!("{}:runQuery", self.base_url)
        } else {
            format!("{}/{}:runQuery", self.base_url, parent_path)
        };
        let collection = query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();
        let request = RunQueryRequest {
            structured_query: query,
        };
        let (url, collection, request) = (url.as_str(), collection.as_str(), &request);

        with_retry(&self.config.retry, "run_query", move || async move {
            self.execute_request("run_query", collection, None, async move {
                let response = self
                    .send_authorized(url, |token| self.http.post(url).bearer_auth(token).json(request))
                    .await?;
                match response.status() {
                    StatusCode::OK => {
                        let body = response.text().await.unwrap_or_default();
                        // runQuery returns a JSON array of RunQueryResponse objects
                        let responses: Vec<RunQueryResponse> = serde_json::from_str(&body).map_err(|e| {
                            StoreError::invalid_response(format!(
                                "Failed to parse runQuery response: {} (body prefix: {})",
                                e,
                                body.chars().take(200).collect::<String>()
                            ))
                        })?;
                        let docs: Vec<Document> = responses.into_iter().filter_map(|r| r.document).collect();
                        record_documents_returned(collection, docs.len());
                        Ok(docs)
                    }
                    status => Err(Self::handle_error_response(status, url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = match doc_id {
            Some(id) => info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id),
            None => info_span!("firestore_request", operation = %operation, collection = %collection),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, start.elapsed().as_millis() as f64);
        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> StoreError {
        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}
