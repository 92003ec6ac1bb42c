#![forbid(unsafe_code)]

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tekdash_api::{ApiResponse, Method, MockApi};
use tekdash_core::{JobSpec, PodCounts};
use tekdash_sync::{Health, ListError, StatusLabel};

fn status_calls(api: &MockApi, ws: &str) -> usize {
    let path = format!("/workspace/status?workspace={}", ws);
    api.calls().iter().filter(|r| r.path == path).count()
}

#[tokio::test]
async fn demo_workspace_end_to_end() {
    let table = Arc::new(Mutex::new(Vec::new()));
    let api = Arc::new(common::demo_runner(table));
    let s = common::session(api.clone());

    s.bootstrap().await;
    assert_eq!(s.health(), Health::Status(200));
    assert_eq!(s.host_info().host_ip, "10.0.0.5");
    assert_eq!(s.workspaces().len(), 1);

    s.open_workspace("ws-demo").await;
    common::settle(|| s.endpoint("ws-demo", "demoapp").is_some() && s.external_map().len() == 1).await;

    let view = s.view();
    assert_eq!(view.polling.as_deref(), Some("ws-demo"));
    assert_eq!(view.host_ip.as_deref(), Some("10.0.0.5"));
    let detail = view.detail.expect("focused workspace");
    assert_eq!(detail.status, StatusLabel::Ok);
    assert_eq!(detail.app_count, 1);
    let app = &detail.apps[0];
    assert_eq!(app.name, "demoapp");
    assert_eq!(app.pods, PodCounts { running: 1, total: 2 });
    assert_eq!(app.node_port, Some(30080));
    assert_eq!(app.endpoint.as_deref(), Some("10.42.0.7:3000"));
    assert_eq!(app.external_port, Some(18080));
    assert_eq!(app.external_url.as_deref(), Some("http://10.0.0.5:18080"));

    // startup, polling and prefetch are all quiet
    assert!(view.activity.is_empty());
    s.dispose();
}

#[tokio::test]
async fn placeholder_workspace_is_skipped() {
    let api = Arc::new(MockApi::new());
    let s = common::session(api.clone());

    assert!(s.refresh_status("demo", false).await.is_none());
    assert!(api.calls().is_empty());
    assert!(s.status("demo").is_none());
    assert!(s.activity().is_empty());
}

#[tokio::test(start_paused = true)]
async fn opening_another_workspace_moves_the_poller() {
    let api = Arc::new(MockApi::new().route(Method::Get, "/workspace/status", ApiResponse::json(200, json!({ "pods": [], "services": [] }))));
    let s = common::session(api.clone());

    s.open_workspace("ws-a").await;
    assert_eq!(s.polling().as_deref(), Some("ws-a"));
    s.open_workspace("ws-b").await;
    assert_eq!(s.polling().as_deref(), Some("ws-b"));
    assert_eq!(s.focus().as_deref(), Some("ws-b"));

    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(status_calls(&api, "ws-a"), 1, "ws-a is not polled after focus moved");
    assert_eq!(status_calls(&api, "ws-b"), 3, "open plus ticks at 5s and 10s");
    assert!(s.activity().is_empty());

    s.stop_poll();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(status_calls(&api, "ws-b"), 3);
}

#[tokio::test(start_paused = true)]
async fn moving_focus_keeps_an_outstanding_poll_response() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = calls.clone();
    let api = Arc::new(
        MockApi::new()
            .with_latency(Duration::from_secs(1))
            .route_fn(Method::Get, "/workspace/status?workspace=ws-a", move |_| {
                // the n-th answer carries n pods
                let n = seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                let pods: Vec<_> = (0..n).map(|i| json!({ "name": format!("web-{}", i), "phase": "Running" })).collect();
                Ok(ApiResponse::json(200, json!({ "pods": pods, "services": [] })))
            })
            .route(Method::Get, "/workspace/status", ApiResponse::json(200, json!({ "pods": [], "services": [] }))),
    );
    let s = common::session(api.clone());

    // open answers at t=1s; the 5s tick is in flight until t=6s
    s.open_workspace("ws-a").await;
    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(status_calls(&api, "ws-a"), 2);

    s.open_workspace("ws-b").await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    let snap = s.status("ws-a").expect("ws-a cached");
    assert_eq!(snap.doc.pods.len(), 2, "the superseded tick still lands in the cache");
    assert_eq!(status_calls(&api, "ws-a"), 2, "no further ticks for ws-a");
    assert_eq!(s.polling().as_deref(), Some("ws-b"));
}

#[tokio::test(start_paused = true)]
async fn placeholder_focus_does_not_poll() {
    let api = Arc::new(MockApi::new());
    let s = common::session(api.clone());

    s.open_workspace("demo").await;
    assert_eq!(s.focus().as_deref(), Some("demo"));
    assert!(s.polling().is_none());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn deleting_focused_workspace_clears_focus() {
    let api = Arc::new(
        MockApi::new()
            .route(Method::Get, "/workspace/status", ApiResponse::json(200, json!({ "pods": [], "services": [] })))
            .route(Method::Post, "/workspace/delete", ApiResponse::json(200, json!({ "message": "deleted" })))
            .route(Method::Get, "/workspaces", ApiResponse::json(200, json!({ "items": [] }))),
    );
    let s = common::session(api.clone());
    s.open_workspace("ws-a").await;
    s.select_app(Some("web"));
    assert!(s.status("ws-a").is_some());

    let res = s.delete_workspace("ws-a").await.expect("response");
    assert_eq!(res.status, 200);
    assert!(s.focus().is_none());
    assert!(s.selected_app().is_none());
    assert!(s.polling().is_none());
    assert!(s.status("ws-a").is_none());
    assert_eq!(api.count(Method::Get, "/workspaces"), 1);

    let log = s.activity();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].endpoint, "/workspace/delete?workspace=ws-a");
    assert_eq!(log[0].message, "deleted");
}

#[tokio::test]
async fn list_failure_is_logged_and_success_is_quiet() {
    let api = Arc::new(MockApi::new().route(Method::Get, "/workspaces", ApiResponse::text(500, "boom")));
    let s = common::session(api.clone());

    s.list_workspaces().await;
    assert_eq!(s.list_error(), Some(ListError::Status(500)));
    let log = s.activity();
    assert_eq!(log.len(), 1);
    assert_eq!((log[0].method.as_str(), log[0].endpoint.as_str(), log[0].status), ("GET", "/workspaces", 500));
    assert_eq!(log[0].message, "boom");

    api.set_route(Method::Get, "/workspaces", ApiResponse::json(200, json!([{ "workspace": "ws-a", "apps": [{ "app": "web" }] }])));
    s.list_workspaces().await;
    assert!(s.list_error().is_none());
    assert_eq!(s.activity().len(), 1);
    let cards = s.view().workspaces;
    assert_eq!(cards[0].id, "ws-a");
    assert_eq!(cards[0].apps, vec!["web".to_string()]);
}

#[tokio::test]
async fn list_refresh_updates_focused_status() {
    let api = Arc::new(
        MockApi::new()
            .route(Method::Get, "/workspaces", ApiResponse::json(200, json!([{ "workspace": "ws-a" }])))
            .route(Method::Get, "/workspace/status", ApiResponse::json(200, json!({ "pods": [], "services": [] }))),
    );
    let s = common::session(api.clone());
    s.open_workspace("ws-a").await;
    s.list_workspaces().await;
    assert_eq!(status_calls(&api, "ws-a"), 2);
    assert!(s.activity().is_empty());
}

#[tokio::test]
async fn transport_failures_degrade_to_visible_state() {
    let api = Arc::new(MockApi::new().fail(Method::Get, "/healthz").fail(Method::Get, "/workspace/status"));
    let s = common::session(api.clone());

    let health = s.check_health().await;
    assert!(matches!(health, Health::Error(_)));
    assert_eq!(health.to_string(), "HEALTH: ERR");
    assert_eq!(s.activity()[0].status, 0);

    let snap = s.refresh_status("ws-a", true).await.expect("addressable");
    assert!(!snap.ok);
    assert!(snap.status.is_none());
    assert!(snap.error.is_some());
    assert!(!s.status("ws-a").expect("cached").ok);
    assert_eq!(s.activity().len(), 1);

    s.open_workspace("ws-a").await;
    assert_eq!(s.view().detail.expect("focused").status, StatusLabel::Fail);
}

#[tokio::test]
async fn non_200_status_is_cached_as_failed() {
    let api = Arc::new(MockApi::new().route(Method::Get, "/workspace/status", ApiResponse::json(404, json!({ "message": "no such workspace" }))));
    let s = common::session(api.clone());

    let snap = s.refresh_status("ws-gone", false).await.expect("addressable");
    assert!(!snap.ok);
    assert_eq!(snap.status, Some(404));
    assert_eq!(s.activity()[0].message, "no such workspace");
}

#[tokio::test]
async fn activity_keeps_the_newest_twenty() {
    let api = Arc::new(MockApi::new().route(Method::Post, "/workspace/restart", ApiResponse::json(200, json!({ "message": "restarted" }))));
    let s = common::session(api.clone());

    for i in 0..25 {
        s.restart_workspace(&format!("ws-{}", i)).await;
    }
    let log = s.activity();
    assert_eq!(log.len(), 20);
    assert_eq!(log[0].endpoint, "/workspace/restart?workspace=ws-24");
    assert_eq!(log[19].endpoint, "/workspace/restart?workspace=ws-5");

    s.clear_activity();
    assert!(s.activity().is_empty());
}

#[tokio::test]
async fn app_actions_are_logged() {
    let api = Arc::new(
        MockApi::new()
            .route(Method::Post, "/workspace/scale", ApiResponse::json(200, json!({ "status": "scaled" })))
            .route(Method::Post, "/app/restart", ApiResponse::text(200, "restarted"))
            .route(Method::Post, "/app/delete", ApiResponse::json(200, json!({})))
            .route(Method::Get, "/app/status", ApiResponse::json(200, json!({ "replicas": 2 })))
            .route(Method::Get, "/workspace/status", ApiResponse::json(200, json!({ "pods": [], "services": [] })))
            .route(Method::Get, "/workspaces", ApiResponse::json(200, json!([]))),
    );
    let s = common::session(api.clone());

    s.scale_app("ws-a", "web", 3).await;
    assert_eq!(status_calls(&api, "ws-a"), 1);
    s.restart_app("ws-a", "web").await;
    s.app_status("ws-a", "web").await;
    s.delete_app("ws-a", "web").await;
    assert_eq!(api.count(Method::Get, "/workspaces"), 1);

    let log = s.activity();
    let endpoints: Vec<&str> = log.iter().map(|e| e.endpoint.as_str()).collect();
    assert_eq!(
        endpoints,
        vec![
            "/app/delete?workspace=ws-a&app=web",
            "/app/status?workspace=ws-a&app=web",
            "/app/restart?workspace=ws-a&app=web",
            "/workspace/scale?workspace=ws-a&app=web&replicas=3",
        ]
    );
    assert_eq!(log[3].message, "scaled");
    assert_eq!(log[2].message, "restarted");
    assert_eq!(log[0].message, "OK");
}

#[tokio::test]
async fn submitted_job_carries_its_payload() {
    let api = Arc::new(
        MockApi::new()
            .route(Method::Post, "/run", ApiResponse::json(200, json!({ "message": "queued" })))
            .route(Method::Get, "/workspaces", ApiResponse::json(200, json!([]))),
    );
    let s = common::session(api.clone());

    let job = JobSpec::git("web", "ws-a", "https://git.example/web.git", None);
    let res = s.submit_job(&job).await.expect("response");
    assert_eq!(res.status, 200);

    let sent = api.calls().into_iter().find(|r| r.path == "/run").expect("run call");
    let body = sent.json.expect("json body");
    assert_eq!(body["source"]["type"], "git");
    assert_eq!(body["source"]["revision"], "main");
    assert_eq!(s.activity()[0].message, "queued");
    assert_eq!(api.count(Method::Get, "/workspaces"), 1);
}

#[tokio::test]
async fn dispose_resets_the_session() {
    let table = Arc::new(Mutex::new(Vec::new()));
    let api = Arc::new(common::demo_runner(table));
    let s = common::session(api.clone());
    s.bootstrap().await;
    s.open_workspace("ws-demo").await;
    s.check_health().await;

    let mut rev = s.subscribe();
    s.dispose();
    assert!(rev.has_changed().unwrap_or(false));
    assert!(s.polling().is_none());
    assert!(s.focus().is_none());
    assert!(s.workspaces().is_empty());
    assert!(s.activity().is_empty());
    assert!(s.status("ws-demo").is_none());
    assert!(!s.host_info().is_known());
    assert_eq!(s.health(), Health::Unknown);
}
