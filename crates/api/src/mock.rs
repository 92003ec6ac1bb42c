use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::{ApiError, ApiResponse, ApiResult, Method, Request, RunnerApi};

type Handler = Arc<dyn Fn(&Request) -> ApiResult<ApiResponse> + Send + Sync>;

/// Scripted in-memory runner for tests.
///
/// Routes match on method plus the exact path first, then on method plus the
/// path without its query. Unrouted requests answer `404 not found`. Every
/// request is recorded before the optional latency is applied.
#[derive(Default)]
pub struct MockApi {
    routes: Mutex<HashMap<(Method, String), Handler>>,
    calls: Mutex<Vec<Request>>,
    latency: Option<Duration>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response; lets concurrent callers overlap with an in-flight request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer `method path` with a fixed response.
    pub fn route(self, method: Method, path: &str, resp: ApiResponse) -> Self {
        self.set_route(method, path, resp);
        self
    }

    /// Answer `method path` with a handler; use for stateful endpoints.
    pub fn route_fn(self, method: Method, path: &str, f: impl Fn(&Request) -> ApiResult<ApiResponse> + Send + Sync + 'static) -> Self {
        lock(&self.routes).insert((method, path.to_string()), Arc::new(f));
        self
    }

    /// Fail `method path` at the transport level.
    pub fn fail(self, method: Method, path: &str) -> Self {
        self.route_fn(method, path, |req| Err(ApiError::Transport(format!("connection refused: {}", req.path))))
    }

    /// Replace a fixed route after construction.
    pub fn set_route(&self, method: Method, path: &str, resp: ApiResponse) {
        lock(&self.routes).insert((method, path.to_string()), Arc::new(move |_| Ok(resp.clone())));
    }

    pub fn calls(&self) -> Vec<Request> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls whose path (without query) equals `route`.
    pub fn count(&self, method: Method, route: &str) -> usize {
        lock(&self.calls).iter().filter(|r| r.method == method && r.route() == route).count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn handler_for(&self, req: &Request) -> Option<Handler> {
        let routes = lock(&self.routes);
        routes
            .get(&(req.method, req.path.clone()))
            .or_else(|| routes.get(&(req.method, req.route().to_string())))
            .cloned()
    }
}

#[async_trait::async_trait]
impl RunnerApi for MockApi {
    async fn call(&self, req: Request) -> ApiResult<ApiResponse> {
        lock(&self.calls).push(req.clone());
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        match self.handler_for(&req) {
            Some(h) => h(&req),
            None => Ok(ApiResponse::text(404, "not found")),
        }
    }
}
