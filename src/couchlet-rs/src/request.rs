use crate::{Client, ClientError, Result};
use couchlet_core::{describe_status, query_string, ErrorBody};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::Level;

/// Status line and headers of a response whose body has been consumed
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Successful exchange: parsed body (`None` when the body was empty) plus the raw response
#[derive(Debug, Clone)]
pub struct Outcome {
    pub body: Option<Value>,
    pub response: RawResponse,
}

impl Outcome {
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// Deserialize the body into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| ClientError::InvalidResponse("empty response body".to_string()))?;
        serde_json::from_value(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

impl Client {
    /// Issue a single request against a path under the database prefix.
    ///
    /// `POST`/`PUT` send `body` as JSON (a JSON string is sent verbatim).
    /// Other methods turn an object `body` into query parameters.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Outcome> {
        let path = self.descriptor.resolve(path);
        self.dispatch(method, path, body).await
    }

    /// Same as [`Client::request`] but resolved against the server root
    pub(crate) async fn request_at_root(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Outcome> {
        let path = self.descriptor.resolve_root(path);
        self.dispatch(method, path, body).await
    }

    async fn dispatch(&self, method: Method, mut path: String, body: Option<Value>) -> Result<Outcome> {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, header_value(&self.descriptor.host_header())?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let payload = if method == Method::POST || method == Method::PUT {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            match body {
                Some(Value::String(text)) => Some(text),
                Some(other) => Some(serde_json::to_string(&other)?),
                None => None,
            }
        } else {
            if let Some(Value::Object(params)) = &body {
                let query = query_string(params);
                if !query.is_empty() {
                    path.push('?');
                    path.push_str(&query);
                }
            }
            None
        };

        if let Some(auth) = self.descriptor.authorization() {
            headers.insert(AUTHORIZATION, header_value(&auth)?);
        }

        self.sink.record(
            Level::DEBUG,
            "request",
            &json!({ "method": method.as_str(), "path": path }),
        );
        self.sink
            .record(Level::TRACE, "request headers", &headers_json(&headers));
        if let Some(payload) = &payload {
            self.sink
                .record(Level::TRACE, "request body", &Value::String(payload.clone()));
        }

        let url = format!("{}{}", self.descriptor.origin(), path);
        let mut builder = self.http.request(method, url.as_str()).headers(headers);
        if let Some(payload) = payload {
            builder = builder.body(payload);
        }

        let response = builder.send().await?;
        let raw = RawResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        };
        self.sink.record(
            Level::DEBUG,
            "response",
            &json!({ "status": raw.status, "headers": headers_json(&raw.headers) }),
        );

        let bytes = response.bytes().await?;
        let parsed = parse_body(&bytes);
        match &parsed {
            Ok(body) => self.sink.record(
                Level::TRACE,
                "response body",
                body.as_ref().unwrap_or(&Value::Null),
            ),
            Err(e) => self.sink.record(
                Level::WARN,
                "response body is not JSON",
                &json!({ "error": e.to_string(), "length": bytes.len() }),
            ),
        }

        classify(raw, parsed)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

/// Empty body is `None`, not a parse attempt
fn parse_body(bytes: &[u8]) -> std::result::Result<Option<Value>, serde_json::Error> {
    if bytes.is_empty() {
        Ok(None)
    } else {
        serde_json::from_slice(bytes).map(Some)
    }
}

/// Turn a buffered response into success or a typed failure.
///
/// Statuses >= 300 become `Service` when the body carries an `error` field and
/// `Status` otherwise. A failure body that is not JSON counts as absent.
fn classify(
    response: RawResponse,
    parsed: std::result::Result<Option<Value>, serde_json::Error>,
) -> Result<Outcome> {
    if response.status >= 300 {
        if let Some(body) = parsed.ok().flatten() {
            if let Some(ErrorBody { error, reason }) = ErrorBody::from_value(&body) {
                return Err(ClientError::Service {
                    error,
                    reason,
                    body,
                    response,
                });
            }
        }
        return Err(ClientError::Status {
            status: response.status,
            message: describe_status(response.status).into_owned(),
            response,
        });
    }

    let body = parsed.map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    Ok(Outcome { body, response })
}

fn headers_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let text = if name == AUTHORIZATION {
            "Basic ***".to_string()
        } else {
            value.to_str().unwrap_or("<binary>").to_string()
        };
        map.insert(name.as_str().to_string(), Value::String(text));
    }
    Value::Object(map)
}
