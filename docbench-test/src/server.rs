//! Exposes an in-process document service for use in integration tests.
//!
//! The service keeps everything in memory and implements the small subset of the Elasticsearch
//! REST API that docbench uses: provisioning indices and mappings, creating documents one by one
//! or in bulk, counting exact term matches and flushing.
//!
//! ```
//! use docbench_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/");
//!    // use the URL in tests...
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde_json::{Map, Value, json};

type Document = Map<String, Value>;

#[derive(Debug, Default)]
struct IndexState {
    documents: HashMap<String, Document>,
    mapping: Option<Value>,
}

/// The shared state of the in-memory service.
#[derive(Debug, Clone, Default)]
pub struct Documents {
    indices: Arc<Mutex<BTreeMap<String, IndexState>>>,
}

impl Documents {
    /// Returns the number of documents stored in the given index.
    pub fn count(&self, index: &str) -> usize {
        let indices = self.indices.lock().unwrap();
        indices.get(index).map_or(0, |state| state.documents.len())
    }

    /// Returns whether the given index exists.
    pub fn has_index(&self, index: &str) -> bool {
        self.indices.lock().unwrap().contains_key(index)
    }

    /// Returns the mapping last put on the given index.
    pub fn mapping(&self, index: &str) -> Option<Value> {
        let indices = self.indices.lock().unwrap();
        indices.get(index).and_then(|state| state.mapping.clone())
    }

    /// Returns a copy of the document stored under `id`.
    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        let indices = self.indices.lock().unwrap();
        let document = indices.get(index)?.documents.get(id)?;
        Some(Value::Object(document.clone()))
    }

    /// Stores a document directly, bypassing the HTTP layer.
    pub fn insert(&self, index: &str, id: &str, document: Value) {
        let Value::Object(document) = document else {
            panic!("documents must be JSON objects");
        };

        let mut indices = self.indices.lock().unwrap();
        let state = indices.entry(index.to_owned()).or_default();
        state.documents.insert(id.to_owned(), document);
    }

    /// Inserts the document if the id is free, returning `false` on conflicts.
    fn create(&self, index: &str, id: &str, document: Document) -> bool {
        let mut indices = self.indices.lock().unwrap();
        let state = indices.entry(index.to_owned()).or_default();
        if state.documents.contains_key(id) {
            return false;
        }
        state.documents.insert(id.to_owned(), document);
        true
    }
}

/// Creates the router of the in-memory document service.
pub fn routes(documents: Documents) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/_bulk", post(bulk))
        .route("/{index}", put(create_index).head(index_exists))
        .route("/{index}/_mapping", put(put_mapping))
        .route("/{index}/_create/{id}", put(create_document))
        .route("/{index}/_search", post(search))
        .route("/{index}/_flush", post(flush))
        .with_state(documents)
}

fn error_response(status: StatusCode, kind: &str, reason: String) -> Response {
    let body = json!({
        "error": { "type": kind, "reason": reason },
        "status": status.as_u16(),
    });
    (status, axum::Json(body)).into_response()
}

fn conflict_reason(id: &str) -> String {
    format!("[{id}]: version conflict, document already exists")
}

async fn info() -> Response {
    axum::Json(json!({
        "name": "docbench-test",
        "cluster_name": "docbench",
        "version": { "number": "7.17.0" },
    }))
    .into_response()
}

async fn index_exists(State(documents): State<Documents>, Path(index): Path<String>) -> StatusCode {
    if documents.has_index(&index) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_index(State(documents): State<Documents>, Path(index): Path<String>) -> Response {
    let mut indices = documents.indices.lock().unwrap();
    if indices.contains_key(&index) {
        let reason = format!("index [{index}] already exists");
        return error_response(
            StatusCode::BAD_REQUEST,
            "resource_already_exists_exception",
            reason,
        );
    }

    indices.insert(index.clone(), IndexState::default());
    axum::Json(json!({ "acknowledged": true, "index": index })).into_response()
}

async fn put_mapping(
    State(documents): State<Documents>,
    Path(index): Path<String>,
    axum::Json(mapping): axum::Json<Value>,
) -> Response {
    let mut indices = documents.indices.lock().unwrap();
    let Some(state) = indices.get_mut(&index) else {
        let reason = format!("no such index [{index}]");
        return error_response(StatusCode::NOT_FOUND, "index_not_found_exception", reason);
    };

    state.mapping = Some(mapping);
    axum::Json(json!({ "acknowledged": true })).into_response()
}

async fn create_document(
    State(documents): State<Documents>,
    Path((index, id)): Path<(String, String)>,
    axum::Json(document): axum::Json<Document>,
) -> Response {
    if !documents.create(&index, &id, document) {
        return error_response(
            StatusCode::CONFLICT,
            "version_conflict_engine_exception",
            conflict_reason(&id),
        );
    }

    let body = json!({ "_index": index, "_id": id, "result": "created" });
    (StatusCode::CREATED, axum::Json(body)).into_response()
}

async fn bulk(State(documents): State<Documents>, body: String) -> Response {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());
    let mut items = Vec::new();
    let mut errors = false;

    while let Some(action_line) = lines.next() {
        let action: Value = match serde_json::from_str(action_line) {
            Ok(action) => action,
            Err(err) => {
                return error_response(StatusCode::BAD_REQUEST, "parse_exception", err.to_string());
            }
        };
        let Some(create) = action.get("create") else {
            let reason = format!("unsupported bulk action: {action_line}");
            return error_response(StatusCode::BAD_REQUEST, "illegal_argument_exception", reason);
        };

        let index = create["_index"].as_str().unwrap_or_default().to_owned();
        let id = create["_id"].as_str().unwrap_or_default().to_owned();
        let document = match lines.next().map(serde_json::from_str::<Document>) {
            Some(Ok(document)) => document,
            Some(Err(err)) => {
                return error_response(StatusCode::BAD_REQUEST, "parse_exception", err.to_string());
            }
            None => {
                let reason = "bulk request must be terminated by a document".to_owned();
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "action_request_validation_exception",
                    reason,
                );
            }
        };

        let item = if documents.create(&index, &id, document) {
            json!({ "_index": index, "_id": id, "status": 201, "result": "created" })
        } else {
            errors = true;
            json!({
                "_index": index,
                "_id": id,
                "status": 409,
                "error": {
                    "type": "version_conflict_engine_exception",
                    "reason": conflict_reason(&id),
                },
            })
        };
        items.push(json!({ "create": item }));
    }

    axum::Json(json!({ "took": 0, "errors": errors, "items": items })).into_response()
}

/// Extracts the single `field: value` pair of a `term` query.
fn term_query(body: &Value) -> Option<(String, String)> {
    let term = body.pointer("/query/term")?.as_object()?;
    let (field, value) = term.iter().next()?;
    let value = match value {
        Value::String(value) => value.clone(),
        Value::Object(inner) => inner.get("value")?.as_str()?.to_owned(),
        _ => return None,
    };
    Some((field.clone(), value))
}

async fn search(
    State(documents): State<Documents>,
    Path(index): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    let Some((field, value)) = term_query(&body) else {
        let reason = "only single term queries are supported".to_owned();
        return error_response(StatusCode::BAD_REQUEST, "parsing_exception", reason);
    };

    let indices = documents.indices.lock().unwrap();
    let Some(state) = indices.get(&index) else {
        let reason = format!("no such index [{index}]");
        return error_response(StatusCode::NOT_FOUND, "index_not_found_exception", reason);
    };

    let total = state
        .documents
        .values()
        .filter(|document| document.get(&field).and_then(Value::as_str) == Some(value.as_str()))
        .count();

    axum::Json(json!({
        "hits": { "total": { "value": total, "relation": "eq" }, "hits": [] },
    }))
    .into_response()
}

async fn flush(State(documents): State<Documents>, Path(index): Path<String>) -> Response {
    if !documents.has_index(&index) {
        let reason = format!("no such index [{index}]");
        return error_response(StatusCode::NOT_FOUND, "index_not_found_exception", reason);
    }
    axum::Json(json!({ "_shards": { "total": 1, "successful": 1, "failed": 0 } })).into_response()
}

/// An in-process document service for use in integration tests.
///
/// The server listens on a random available port on localhost and is shut down when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    documents: Documents,
}

impl TestServer {
    /// Starts a new server with an empty document store.
    pub async fn new() -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let documents = Documents::default();
        let router = routes(documents.clone());

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            handle,
            socket,
            documents,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Gives direct access to the stored documents.
    pub fn documents(&self) -> &Documents {
        &self.documents
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
