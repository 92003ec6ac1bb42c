//! Tekdash runner API façade.
//!
//! Frontends and the sync session talk to the runner only through the
//! [`RunnerApi`] trait: one generic request function that returns a status
//! code plus a decoded body. Non-2xx statuses are ordinary values; only
//! transport problems are errors.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

mod http;
mod mock;
pub mod paths;

pub use http::HttpRunnerApi;
pub use mock::MockApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against the runner. `path` is relative (e.g. `/workspace/status?workspace=ws-a`)
/// and already carries its escaped query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub json: Option<serde_json::Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), json: None }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self { method: Method::Post, path: path.into(), json: None }
    }

    pub fn post_json(path: impl Into<String>, json: serde_json::Value) -> Self {
        Self { method: Method::Post, path: path.into(), json: Some(json) }
    }

    /// Path without its query string.
    pub fn route(&self) -> &str {
        self.path.split_once('?').map(|(p, _)| p).unwrap_or(&self.path)
    }
}

/// Response body: JSON when the server said so, else plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

impl Body {
    pub fn json(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Json(v) => Some(v),
            Body::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Body,
}

impl ApiResponse {
    pub fn json(status: u16, v: serde_json::Value) -> Self {
        Self { status, body: Body::Json(v) }
    }

    pub fn text(status: u16, s: impl Into<String>) -> Self {
        Self { status, body: Body::Text(s.into()) }
    }

    /// The runner reports success for reads and claims with exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Human message for the activity log.
    pub fn message(&self) -> String {
        match &self.body {
            Body::Text(s) => s.clone(),
            Body::Json(serde_json::Value::Null) => String::new(),
            Body::Json(v) => {
                let field = |k: &str| v.get(k).and_then(|m| m.as_str()).filter(|s| !s.is_empty());
                field("message").or_else(|| field("status")).unwrap_or("OK").to_string()
            }
        }
    }

    /// String field of a JSON object body, if present and non-empty.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.json()?.get(key)?.as_str().filter(|s| !s.is_empty())
    }
}

/// Request-layer errors. Status codes are never errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("invalid base url: {0}")]
    InvalidBase(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Generic request function the sync session is written against.
#[async_trait::async_trait]
pub trait RunnerApi: Send + Sync {
    async fn call(&self, req: Request) -> ApiResult<ApiResponse>;
}
