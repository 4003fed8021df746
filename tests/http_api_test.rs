//! HTTP 接口集成测试：经 axum Router 直接驱动（无需监听端口）

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use concierge::config::AppConfig;
use concierge::core::Orchestrator;
use concierge::integrations::{create_router, HttpState};
use concierge::llm::{FailingLlmClient, LlmClient, MockLlmClient};
use concierge::memory::MemoryConversationStore;

fn make_app_with(llm: Arc<dyn LlmClient>) -> axum::Router {
    let (orchestrator, _) = Orchestrator::assemble(
        &AppConfig::default(),
        llm,
        Arc::new(MemoryConversationStore::new()),
    );
    create_router(Arc::new(HttpState {
        orchestrator: Arc::new(orchestrator),
        expose_error_details: false,
    }))
}

fn make_app() -> axum::Router {
    make_app_with(Arc::new(MockLlmClient))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_text() {
    let app = make_app();
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("up and running"));
}

#[tokio::test]
async fn test_run_returns_envelope_with_user_info() {
    let app = make_app();
    let (status, body) = send(
        &app,
        post_json(
            "/api/agent/run",
            json!({ "message": "Hi, I'm Dana and my room 310 has no hot water" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let response = &body["response"];
    assert!(response["sessionId"].as_str().unwrap().starts_with("session_"));
    assert!(response["response"].as_str().unwrap().starts_with("[Sam]"));
    assert_eq!(response["agent"], "maintenance");
    assert_eq!(response["userInfo"]["name"], "Dana");
    assert_eq!(response["userInfo"]["roomNumber"], "310");
    assert_eq!(response["userInfo"]["maintenanceIssues"][0]["category"], "Plumbing");
    assert_eq!(response["userInfo"]["maintenanceIssues"][0]["keyword"], "hot water");
}

#[tokio::test]
async fn test_run_rejects_bad_messages() {
    let app = make_app();
    for body in [
        json!({}),
        json!({ "message": "" }),
        json!({ "message": "   " }),
        json!({ "message": 42 }),
        json!({ "message": ["hi"] }),
    ] {
        let (status, body) = send(&app, post_json("/api/agent/run", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Message is required and must be a non-empty string");
    }

    let malformed = Request::post("/api/agent/run")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, sessions) = send(&app, get("/api/agent/sessions")).await;
    assert_eq!(sessions["sessions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_history_sessions_and_delete() {
    let app = make_app();
    let run = |msg: &str| {
        post_json(
            "/api/agent/run",
            json!({ "sessionId": "guest-1", "message": msg }),
        )
    };
    send(&app, run("can I see the menu")).await;
    send(&app, run("and what time does it open")).await;

    let (status, body) = send(&app, get("/api/agent/history/guest-1")).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0]["from"], "user");
    assert_eq!(history[1]["from"], "restaurant");
    assert_eq!(history[3]["from"], "restaurant");

    let (_, body) = send(&app, get("/api/agent/sessions")).await;
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["sessionId"], "guest-1");
    assert_eq!(sessions[0]["currentAgent"], "restaurant");
    assert!(sessions[0]["lastAccess"].is_string());

    let delete = || {
        Request::delete("/api/agent/sessions/guest-1")
            .body(Body::empty())
            .unwrap()
    };
    let (status, body) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session guest-1 cleared successfully");

    let (status, body) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session guest-1 not found");

    let (status, _) = send(&app, get("/api/agent/history/guest-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_model_failure_is_degraded_reply() {
    let app = make_app_with(Arc::new(FailingLlmClient::new("upstream timeout")));
    let (status, body) = send(
        &app,
        post_json("/api/agent/run", json!({ "sessionId": "s", "message": "hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["error"], "model_call_failed");
    assert!(!body.to_string().contains("upstream timeout"));
}

#[tokio::test]
async fn test_unknown_route_and_docs() {
    let app = make_app();
    let (status, body) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not found: /api/nope");

    let (status, body) = send(&app, get("/api/docs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"].as_array().unwrap().len(), 4);
}
