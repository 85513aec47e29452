//! HTTP client for a Meilisearch server.
//!
//! Meilisearch applies writes asynchronously: index creation, settings and
//! document additions answer with an enqueued task. Every write here waits
//! for its task to finish so that a configured index really is configured.

use super::{IndexInfo, IndexSettings, SearchBackend, SearchHits, SearchQuery};
use crate::document::Document;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Deserialize)]
struct Task {
    status: TaskStatus,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    results: Vec<IndexInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndex<'a> {
    uid: &'a str,
    primary_key: &'a str,
}

#[derive(Serialize)]
struct WireDocument<'a> {
    id: String,
    title: &'a str,
    description: &'a str,
    content: &'a str,
    path: &'a str,
    slug: &'a str,
}

impl<'a> From<&'a Document> for WireDocument<'a> {
    fn from(doc: &'a Document) -> Self {
        Self {
            id: encode_document_id(&doc.id),
            title: &doc.title,
            description: &doc.description,
            content: &doc.content,
            path: &doc.path,
            slug: &doc.slug,
        }
    }
}

/// Map a document id onto Meilisearch's `[A-Za-z0-9_-]` alphabet.
///
/// ASCII letters, digits and `_` pass through; every other byte becomes `-`
/// followed by two lower-case hex digits. Since `-` itself is always escaped,
/// distinct ids never share an encoding. The readable form travels in `slug`.
pub fn encode_document_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("-{byte:02x}"));
        }
    }
    out
}

pub struct MeiliBackend {
    client: Client,
    host: String,
    api_key: Option<String>,
    task_timeout: Duration,
    poll_interval: Duration,
}

impl MeiliBackend {
    pub fn new(host: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
            task_timeout: DEFAULT_TASK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How long to wait for enqueued tasks, and how often to ask
    pub fn with_task_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.task_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.host, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(err) => BackendError::rejected(status.as_u16(), &err.code, err.message),
                Err(_) => BackendError::rejected(
                    status.as_u16(),
                    "unknown",
                    String::from_utf8_lossy(&body),
                ),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Send a write and wait until the task it enqueued has finished
    async fn run_task(&self, builder: RequestBuilder) -> Result<(), BackendError> {
        let task: EnqueuedTask = self.send(builder).await?;
        tracing::debug!("Waiting for Meilisearch task {}", task.task_uid);
        self.wait_for_task(task.task_uid).await
    }

    async fn wait_for_task(&self, task_uid: u64) -> Result<(), BackendError> {
        let deadline = Instant::now() + self.task_timeout;

        loop {
            let task: Task = self
                .send(self.request(Method::GET, &format!("/tasks/{task_uid}")))
                .await?;

            match task.status {
                TaskStatus::Succeeded => return Ok(()),
                TaskStatus::Failed | TaskStatus::Canceled => {
                    let (code, message) = match task.error {
                        Some(err) => (err.code, err.message),
                        None => ("task_canceled".to_string(), "task was canceled".to_string()),
                    };
                    return Err(BackendError::TaskFailed {
                        task_uid,
                        code,
                        message,
                    });
                }
                TaskStatus::Enqueued | TaskStatus::Processing => {}
            }

            if Instant::now() >= deadline {
                return Err(BackendError::TaskTimeout {
                    task_uid,
                    timeout: self.task_timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn index_not_found(uid: &str, err: BackendError) -> BackendError {
    match err {
        BackendError::Rejected { code, .. } | BackendError::TaskFailed { code, .. }
            if code == "index_not_found" =>
        {
            BackendError::IndexNotFound(uid.to_string())
        }
        other => other,
    }
}

#[async_trait]
impl SearchBackend for MeiliBackend {
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>, BackendError> {
        let list: IndexList = self
            .send(self.request(Method::GET, "/indexes?limit=1000"))
            .await?;
        Ok(list.results)
    }

    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, "/indexes")
            .json(&CreateIndex { uid, primary_key });

        match self.run_task(request).await {
            // Someone else created it between our listing and this call
            Err(BackendError::TaskFailed { code, .. }) if code == "index_already_exists" => {
                tracing::debug!("Index {} already exists", uid);
                Ok(())
            }
            result => result,
        }
    }

    async fn update_settings(
        &self,
        uid: &str,
        settings: &IndexSettings,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, &format!("/indexes/{uid}/settings"))
            .json(settings);
        self.run_task(request)
            .await
            .map_err(|err| index_not_found(uid, err))
    }

    async fn add_documents(&self, uid: &str, documents: &[Document]) -> Result<(), BackendError> {
        let wire: Vec<WireDocument<'_>> = documents.iter().map(WireDocument::from).collect();
        let request = self
            .request(Method::POST, &format!("/indexes/{uid}/documents?primaryKey=id"))
            .json(&wire);
        self.run_task(request)
            .await
            .map_err(|err| index_not_found(uid, err))
    }

    async fn search(&self, uid: &str, query: &SearchQuery) -> Result<SearchHits, BackendError> {
        let request = self
            .request(Method::POST, &format!("/indexes/{uid}/search"))
            .json(query);
        self.send(request)
            .await
            .map_err(|err| index_not_found(uid, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::Arc;

    const KEY: &str = "test-key";

    /// Just enough of Meilisearch to drive the client
    #[derive(Default)]
    struct Fake {
        indexes: Vec<String>,
        settings: Vec<Value>,
        documents: Vec<Value>,
        tasks: Vec<(&'static str, Option<Value>)>,
        stall: bool,
    }

    type Shared = Arc<Mutex<Fake>>;
    type Reply = (StatusCode, Json<Value>);

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer test-key")
    }

    fn unauthorized() -> Reply {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "The Authorization header is missing.", "code": "missing_authorization_header"})),
        )
    }

    fn enqueue(fake: &mut Fake, error: Option<Value>) -> Reply {
        let status = match (&error, fake.stall) {
            (_, true) => "processing",
            (Some(_), false) => "failed",
            (None, false) => "succeeded",
        };
        fake.tasks.push((status, error));
        (
            StatusCode::ACCEPTED,
            Json(json!({"taskUid": fake.tasks.len() - 1, "status": "enqueued"})),
        )
    }

    async fn list_indexes(State(fake): State<Shared>, headers: HeaderMap) -> Reply {
        if !authorized(&headers) {
            return unauthorized();
        }
        let fake = fake.lock();
        let results: Vec<Value> = fake
            .indexes
            .iter()
            .map(|uid| json!({"uid": uid, "primaryKey": "id"}))
            .collect();
        (StatusCode::OK, Json(json!({ "results": results })))
    }

    async fn create_index(
        State(fake): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Reply {
        if !authorized(&headers) {
            return unauthorized();
        }
        let mut fake = fake.lock();
        let uid = body["uid"].as_str().unwrap_or_default().to_string();
        let error = if fake.indexes.contains(&uid) {
            Some(json!({"message": "Index already exists.", "code": "index_already_exists"}))
        } else {
            fake.indexes.push(uid);
            None
        };
        enqueue(&mut fake, error)
    }

    async fn update_settings(
        State(fake): State<Shared>,
        Path(uid): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Reply {
        if !authorized(&headers) {
            return unauthorized();
        }
        let mut fake = fake.lock();
        if !fake.indexes.contains(&uid) {
            let error = json!({"message": "Index not found.", "code": "index_not_found"});
            return enqueue(&mut fake, Some(error));
        }
        fake.settings.push(body);
        enqueue(&mut fake, None)
    }

    async fn add_documents(
        State(fake): State<Shared>,
        Path(uid): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Vec<Value>>,
    ) -> Reply {
        if !authorized(&headers) {
            return unauthorized();
        }
        let mut fake = fake.lock();
        if !fake.indexes.contains(&uid) {
            let error = json!({"message": "Index not found.", "code": "index_not_found"});
            return enqueue(&mut fake, Some(error));
        }
        fake.documents.extend(body);
        enqueue(&mut fake, None)
    }

    async fn search(
        State(fake): State<Shared>,
        Path(uid): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Reply {
        if !authorized(&headers) {
            return unauthorized();
        }
        let fake = fake.lock();
        if !fake.indexes.contains(&uid) {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"message": "Index not found.", "code": "index_not_found"})),
            );
        }
        let q = body["q"].as_str().unwrap_or_default();
        let pre = body["highlightPreTag"].as_str().unwrap_or("<em>");
        let post = body["highlightPostTag"].as_str().unwrap_or("</em>");
        let hits: Vec<Value> = fake
            .documents
            .iter()
            .filter(|doc| doc["content"].as_str().unwrap_or_default().contains(q))
            .map(|doc| {
                let content = doc["content"].as_str().unwrap_or_default();
                let mut hit = doc.clone();
                hit["_formatted"] = json!({
                    "content": content.replace(q, &format!("{pre}{q}{post}")),
                });
                hit
            })
            .collect();
        let total = hits.len();
        (
            StatusCode::OK,
            Json(json!({"hits": hits, "estimatedTotalHits": total, "processingTimeMs": 1})),
        )
    }

    async fn task(State(fake): State<Shared>, Path(uid): Path<usize>) -> Reply {
        let fake = fake.lock();
        match fake.tasks.get(uid) {
            Some((status, error)) => (
                StatusCode::OK,
                Json(json!({"uid": uid, "status": status, "error": error})),
            ),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({"message": "Task not found.", "code": "task_not_found"})),
            ),
        }
    }

    async fn serve(fake: Shared) -> std::io::Result<String> {
        let app = Router::new()
            .route("/indexes", get(list_indexes).post(create_index))
            .route("/indexes/:uid/settings", patch(update_settings))
            .route("/indexes/:uid/documents", post(add_documents))
            .route("/indexes/:uid/search", post(search))
            .route("/tasks/:uid", get(task))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(format!("http://{addr}/"))
    }

    fn client(host: &str) -> MeiliBackend {
        MeiliBackend::new(host, Some(KEY.to_string()))
            .with_task_timeout(Duration::from_secs(5), Duration::from_millis(5))
    }

    #[test]
    fn test_encode_document_id() {
        assert_eq!(encode_document_id("/docs/intro"), "-2fdocs-2fintro");
        assert_eq!(encode_document_id("plain_id42"), "plain_id42");
        assert_eq!(encode_document_id("a-b"), "a-2db");
        assert_eq!(encode_document_id("é"), "-c3-a9");
    }

    #[test]
    fn test_encoded_ids_are_distinct_and_legal() {
        let ids = ["/a-b", "/a/b", "/a_b", "/a-2fb", "-2fa-2fb"];
        let encoded: HashSet<String> = ids.iter().map(|id| encode_document_id(id)).collect();
        assert_eq!(encoded.len(), ids.len());
        for id in &encoded {
            assert!(id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let backend = MeiliBackend::new("http://localhost:7700/", Some(String::new()));
        assert_eq!(backend.host(), "http://localhost:7700");
        assert!(backend.api_key.is_none());
    }

    #[tokio::test]
    async fn test_index_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
        let fake = Shared::default();
        let backend = client(&serve(fake.clone()).await?);

        assert!(backend.list_indexes().await?.is_empty());
        backend.create_index("docs", "id").await?;
        // Creating twice resolves to the existing index
        backend.create_index("docs", "id").await?;
        assert_eq!(
            backend.list_indexes().await?,
            vec![IndexInfo {
                uid: "docs".to_string(),
                primary_key: Some("id".to_string()),
            }]
        );

        backend
            .update_settings("docs", &IndexSettings::default())
            .await?;
        let doc = Document::new(
            "/docs/intro".to_string(),
            "Intro".to_string(),
            "The quick brown fox".to_string(),
        );
        backend.add_documents("docs", &[doc]).await?;

        {
            let fake = fake.lock();
            assert_eq!(fake.settings[0]["rankingRules"][0], "words");
            assert_eq!(fake.documents[0]["id"], "-2fdocs-2fintro");
            assert_eq!(fake.documents[0]["slug"], "/docs/intro");
        }

        let query = SearchQuery {
            highlight_pre_tag: "<mark>".to_string(),
            highlight_post_tag: "</mark>".to_string(),
            ..SearchQuery::new("quick")
        };
        let hits = backend.search("docs", &query).await?;
        assert_eq!(hits.hits.len(), 1);
        assert_eq!(hits.hits[0].field_str("slug"), Some("/docs/intro"));
        assert_eq!(
            hits.hits[0].formatted_str("content"),
            Some("The <mark>quick</mark> brown fox")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let host = serve(Shared::default()).await?;
        let result = MeiliBackend::new(host, None).list_indexes().await;
        assert!(matches!(
            result,
            Err(BackendError::Rejected { status: 401, ref code, .. }) if code == "missing_authorization_header"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_index() -> Result<(), Box<dyn std::error::Error>> {
        let backend = client(&serve(Shared::default()).await?);
        assert!(matches!(
            backend.search("docs", &SearchQuery::new("fox")).await,
            Err(BackendError::IndexNotFound(uid)) if uid == "docs"
        ));
        assert!(matches!(
            backend.add_documents("docs", &[]).await,
            Err(BackendError::IndexNotFound(uid)) if uid == "docs"
        ));
        assert!(matches!(
            backend
                .update_settings("docs", &IndexSettings::default())
                .await,
            Err(BackendError::IndexNotFound(uid)) if uid == "docs"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_stalled_task_times_out() -> Result<(), Box<dyn std::error::Error>> {
        let fake = Shared::default();
        fake.lock().stall = true;
        let backend = MeiliBackend::new(serve(fake).await?, Some(KEY.to_string()))
            .with_task_timeout(Duration::from_millis(50), Duration::from_millis(5));
        assert!(matches!(
            backend.update_settings("docs", &IndexSettings::default()).await,
            Err(BackendError::TaskTimeout { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_engine() -> Result<(), Box<dyn std::error::Error>> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let backend = MeiliBackend::new(format!("http://{addr}"), None);
        assert!(matches!(
            backend.list_indexes().await,
            Err(BackendError::Unreachable(_))
        ));
        Ok(())
    }
}
