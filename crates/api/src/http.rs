use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::{ApiError, ApiResponse, ApiResult, Body, Method, Request, RunnerApi};

/// reqwest-backed runner client.
///
/// Requests go to `base_url + prefix + path`. The prefix is empty when the
/// runner is addressed directly and `/api` when going through the dashboard proxy.
pub struct HttpRunnerApi {
    base_url: String,
    prefix: String,
    client: reqwest::Client,
}

impl HttpRunnerApi {
    pub fn new(base_url: &str, prefix: &str, timeout: Duration) -> ApiResult<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ApiError::InvalidBase(base_url.to_string()));
        }
        let prefix = normalize_prefix(prefix);
        let client = reqwest::Client::builder()
            .user_agent("tekdash")
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { base_url: base.to_string(), prefix, client })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.prefix, path)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let p = prefix.trim().trim_end_matches('/');
    if p.is_empty() {
        String::new()
    } else if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{}", p)
    }
}

#[async_trait::async_trait]
impl RunnerApi for HttpRunnerApi {
    async fn call(&self, req: Request) -> ApiResult<ApiResponse> {
        let t0 = Instant::now();
        let url = self.url(&req.path);
        let mut builder = match req.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(json) = &req.json {
            builder = builder.json(json);
        }
        counter!("api_requests_total", 1u64);
        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(method = %req.method, path = %req.path, error = %e, "api: transport failure");
                return Err(ApiError::Transport(e.to_string()));
            }
        };
        let status = resp.status().as_u16();
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        let text = resp.text().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        let body = if is_json {
            match serde_json::from_str(&text) {
                Ok(v) => Body::Json(v),
                Err(e) => {
                    debug!(path = %req.path, error = %e, "api: json content-type with unparsable body");
                    Body::Text(text)
                }
            }
        } else {
            Body::Text(text)
        };
        histogram!("api_request_ms", t0.elapsed().as_secs_f64() * 1000.0);
        debug!(method = %req.method, path = %req.path, status, took_ms = %t0.elapsed().as_millis(), "api: response");
        Ok(ApiResponse { status, body })
    }
}
