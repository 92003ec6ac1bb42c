#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tekdash_api::{ApiResponse, Method, MockApi};
use tekdash_sync::{Session, SessionConfig};

pub fn demo_status() -> Value {
    json!({
        "pods": [
            {"name": "demoapp-1", "phase": "Running"},
            {"name": "demoapp-2", "phase": "Pending"}
        ],
        "services": [{"name": "demoapp", "nodePort": 30080}]
    })
}

/// `/external-map` backed by a shared table: GET lists it, POST upserts by pair.
pub fn with_external_map(api: MockApi, table: Arc<Mutex<Vec<Value>>>) -> MockApi {
    let read = table.clone();
    api.route_fn(Method::Get, "/external-map", move |_| {
        Ok(ApiResponse::json(200, Value::Array(read.lock().unwrap().clone())))
    })
    .route_fn(Method::Post, "/external-map", move |req| {
        let body = req.json.clone().unwrap_or(Value::Null);
        let mut rows = table.lock().unwrap();
        rows.retain(|r| !(r["workspace"] == body["workspace"] && r["app"] == body["app"]));
        rows.push(body);
        Ok(ApiResponse::json(200, json!({ "status": "ok" })))
    })
}

/// A runner hosting `ws-demo` with one derived app.
pub fn demo_runner(table: Arc<Mutex<Vec<Value>>>) -> MockApi {
    let api = MockApi::new()
        .route(Method::Get, "/healthz", ApiResponse::text(200, "ok"))
        .route(Method::Get, "/hostinfo", ApiResponse::json(200, json!({ "host_ip": "10.0.0.5" })))
        .route(Method::Get, "/workspaces", ApiResponse::json(200, json!([{ "workspace": "ws-demo", "apps": [] }])))
        .route(Method::Get, "/workspace/status", ApiResponse::json(200, demo_status()))
        .route(Method::Get, "/endpoint", ApiResponse::json(200, json!({ "endpoint": "10.42.0.7:3000" })));
    with_external_map(api, table)
}

pub fn session(api: Arc<MockApi>) -> Session {
    Session::create(api, SessionConfig::default())
}

/// Let spawned background work run until `done` holds.
pub async fn settle(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if done() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    done()
}
