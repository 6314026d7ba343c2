//! In-process fake of the document service, just enough of the REST API to
//! drive the client end to end.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use couchlet_rs::DiagnosticSink;
use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Database name that answers every request with an HTML 500
pub const BROKEN_DB: &str = "broken";
/// Database name that answers every request with a bare 418
pub const TEAPOT_DB: &str = "teapot";
/// Document id that answers with `302 Location: /{db}/target`
pub const MOVED_ID: &str = "moved";

#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub rev: String,
    pub seq: u64,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub databases: HashMap<String, HashMap<String, StoredDoc>>,
    /// `METHOD /raw/path?query` for every request received
    pub requests: Vec<String>,
    pub last_headers: HeaderMap,
    pub last_body: Vec<u8>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeService {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl FakeService {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self, db: &str) -> String {
        format!("http://{}/{}", self.addr, db)
    }

    pub fn create_db(&self, db: &str) {
        self.state
            .lock()
            .unwrap()
            .databases
            .entry(db.to_string())
            .or_default();
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_header(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .last_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    pub fn last_body(&self) -> Vec<u8> {
        self.state.lock().unwrap().last_body.clone()
    }

    pub fn stored(&self, db: &str, id: &str) -> Option<StoredDoc> {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .and_then(|docs| docs.get(id))
            .cloned()
    }
}

/// Sink that keeps every record for inspection
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub records: Arc<Mutex<Vec<(tracing::Level, String, Value)>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message, _)| message.clone())
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, level: tracing::Level, message: &str, data: &Value) {
        self.records
            .lock()
            .unwrap()
            .push((level, message.to_string(), data.clone()));
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("{} {}", method, uri));
    state.last_headers = headers;
    state.last_body = body.to_vec();

    let query = parse_query(uri.query());
    let path = uri.path().trim_start_matches('/');

    if path == "_uuids" {
        let count: usize = query.get("count").and_then(|c| c.parse().ok()).unwrap_or(1);
        let uuids: Vec<String> = (0..count)
            .map(|_| uuid::Uuid::new_v4().simple().to_string())
            .collect();
        return (StatusCode::OK, Json(json!({ "uuids": uuids }))).into_response();
    }

    let (db, rest) = path.split_once('/').unwrap_or((path, ""));
    let id = percent_decode_str(rest).decode_utf8_lossy().to_string();

    if id == MOVED_ID {
        let location = format!("/{}/target", db);
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    match db {
        BROKEN_DB => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/html")],
            "<html>oops</html>",
        )
            .into_response(),
        TEAPOT_DB => StatusCode::IM_A_TEAPOT.into_response(),
        _ if id.is_empty() => db_route(&mut state, &method, db, &body),
        _ => doc_route(&mut state, &method, db, &id, &query, &body),
    }
}

fn db_route(state: &mut FakeState, method: &Method, db: &str, body: &[u8]) -> Response {
    let exists = state.databases.contains_key(db);
    match *method {
        Method::HEAD if exists => StatusCode::OK.into_response(),
        Method::HEAD => StatusCode::NOT_FOUND.into_response(),
        Method::GET if exists => {
            let count = state.databases[db].len();
            (StatusCode::OK, Json(json!({ "db_name": db, "doc_count": count }))).into_response()
        }
        Method::PUT if exists => error(
            StatusCode::PRECONDITION_FAILED,
            "file_exists",
            "The database could not be created, the file already exists.",
        ),
        Method::PUT => {
            state.databases.insert(db.to_string(), HashMap::new());
            (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response()
        }
        Method::POST if exists => {
            let Some(fields) = parse_object(body) else {
                return error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object");
            };
            let id = fields
                .get("_id")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            write_doc(state, db, &id, fields)
        }
        _ if !exists => missing_db(),
        _ => error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Only GET,HEAD,POST,PUT allowed",
        ),
    }
}

fn doc_route(
    state: &mut FakeState,
    method: &Method,
    db: &str,
    id: &str,
    query: &HashMap<String, String>,
    body: &[u8],
) -> Response {
    let Some(docs) = state.databases.get(db) else {
        return if *method == Method::HEAD {
            StatusCode::NOT_FOUND.into_response()
        } else {
            missing_db()
        };
    };
    let current = docs.get(id).cloned();

    match *method {
        Method::HEAD => match current {
            Some(doc) => (
                StatusCode::OK,
                [(header::ETAG, format!("\"{}\"", doc.rev))],
            )
                .into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::GET => match current {
            Some(doc) => {
                let mut fields = doc.fields.clone();
                fields.insert("_id".into(), json!(id));
                fields.insert("_rev".into(), json!(doc.rev));
                (StatusCode::OK, Json(Value::Object(fields))).into_response()
            }
            None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
        },
        Method::PUT => match parse_object(body) {
            Some(fields) => write_doc(state, db, id, fields),
            None => error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object"),
        },
        Method::DELETE => {
            let Some(doc) = current else {
                return error(StatusCode::NOT_FOUND, "not_found", "missing");
            };
            if query.get("rev") != Some(&doc.rev) {
                return conflict();
            }
            if let Some(docs) = state.databases.get_mut(db) {
                docs.remove(id);
            }
            let rev = next_rev(doc.seq);
            (StatusCode::OK, Json(json!({ "ok": true, "id": id, "rev": rev }))).into_response()
        }
        _ => error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Only DELETE,GET,HEAD,PUT allowed",
        ),
    }
}

fn write_doc(state: &mut FakeState, db: &str, id: &str, mut fields: Map<String, Value>) -> Response {
    let Some(docs) = state.databases.get_mut(db) else {
        return missing_db();
    };
    let given = fields
        .remove("_rev")
        .and_then(|v| v.as_str().map(String::from));
    fields.remove("_id");

    let seq = match (docs.get(id), given) {
        (Some(doc), Some(rev)) if rev == doc.rev => doc.seq,
        (None, None) => 0,
        _ => return conflict(),
    };

    let rev = next_rev(seq);
    docs.insert(
        id.to_string(),
        StoredDoc {
            rev: rev.clone(),
            seq: seq + 1,
            fields,
        },
    );
    (StatusCode::CREATED, Json(json!({ "ok": true, "id": id, "rev": rev }))).into_response()
}

fn next_rev(seq: u64) -> String {
    format!("{}-{}", seq + 1, uuid::Uuid::new_v4().simple())
}

fn parse_object(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice(body).ok()? {
        Value::Object(fields) => Some(fields),
        _ => None,
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode_str(k).decode_utf8_lossy().to_string(),
                percent_decode_str(v).decode_utf8_lossy().to_string(),
            )
        })
        .collect()
}

fn error(status: StatusCode, error: &str, reason: &str) -> Response {
    (status, Json(json!({ "error": error, "reason": reason }))).into_response()
}

fn conflict() -> Response {
    error(StatusCode::CONFLICT, "conflict", "Document update conflict.")
}

fn missing_db() -> Response {
    error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
}
