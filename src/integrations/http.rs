//! HTTP 接口（axum）
//!
//! - `POST   /api/agent/run`                 处理一条客人消息
//! - `GET    /api/agent/history/:session_id` 会话对话日志
//! - `GET    /api/agent/sessions`            活跃会话列表
//! - `DELETE /api/agent/sessions/:session_id` 删除会话
//! - `GET    /`                               健康检查
//! - `GET    /api/docs`                       接口说明
//!
//! 所有错误统一为 `{ "success": false, "error": "..." }`。

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::core::orchestrator::EMPTY_MESSAGE_ERROR;
use crate::core::{AgentError, Orchestrator};

pub const HEALTH_TEXT: &str = "Concierge multi-agent server is up and running";

const INTERNAL_ERROR: &str = "Internal server error";

/// HTTP 服务状态
pub struct HttpState {
    pub orchestrator: Arc<Orchestrator>,
    /// 500 响应是否带内部错误详情
    pub expose_error_details: bool,
}

/// 统一错误响应
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn from_agent_error(e: AgentError, expose_details: bool) -> Self {
        match e {
            AgentError::Validation(msg) => Self::bad_request(msg),
            AgentError::NotFound(id) => Self {
                status: StatusCode::NOT_FOUND,
                message: format!("Session {} not found", id),
            },
            other => {
                tracing::error!("Request failed: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: if expose_details {
                        other.to_string()
                    } else {
                        INTERNAL_ERROR.to_string()
                    },
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

/// 创建路由
pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(|| async { HEALTH_TEXT }))
        .route("/api/docs", get(api_docs))
        .route("/api/agent/run", post(run_agent))
        .route("/api/agent/history/:session_id", get(session_history))
        .route("/api/agent/sessions", get(active_sessions))
        .route("/api/agent/sessions/:session_id", delete(clear_session))
        .fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// POST /api/agent/run
///
/// 请求体按原始 JSON 解析后手动校验，保证非字符串 message 也得到统一的 400 响应
async fn run_agent(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        ApiError::bad_request(EMPTY_MESSAGE_ERROR)
    })?;

    let message = match body.get("message") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
        _ => return Err(ApiError::bad_request(EMPTY_MESSAGE_ERROR)),
    };
    let session_id = match body.get("sessionId") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => return Err(ApiError::bad_request("sessionId must be a string")),
    };

    let response = state
        .orchestrator
        .process_message(session_id, message)
        .await
        .map_err(|e| ApiError::from_agent_error(e, state.expose_error_details))?;

    Ok(Json(json!({ "success": true, "response": response })))
}

/// GET /api/agent/history/:session_id
async fn session_history(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let history = state
        .orchestrator
        .history(&session_id)
        .await
        .map_err(|e| ApiError::from_agent_error(e, state.expose_error_details))?;
    Ok(Json(json!({ "success": true, "history": history })))
}

/// GET /api/agent/sessions
async fn active_sessions(State(state): State<Arc<HttpState>>) -> Json<Value> {
    let sessions = state.orchestrator.list_sessions().await;
    Json(json!({ "success": true, "sessions": sessions }))
}

/// DELETE /api/agent/sessions/:session_id
async fn clear_session(
    State(state): State<Arc<HttpState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .orchestrator
        .delete_session(&session_id)
        .await
        .map_err(|e| ApiError::from_agent_error(e, state.expose_error_details))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Session {} cleared successfully", session_id),
    })))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: format!("Not found: {}", uri),
    }
}

/// GET /api/docs
async fn api_docs() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Hotel concierge multi-agent routing API",
        "endpoints": [
            {
                "path": "/api/agent/run",
                "method": "POST",
                "description": "Process a message with the appropriate agent",
                "body": { "sessionId": "string (optional)", "message": "string (required)" },
                "response": {
                    "success": "boolean",
                    "response": { "sessionId": "string", "response": "string", "userInfo": "object" }
                }
            },
            {
                "path": "/api/agent/history/:sessionId",
                "method": "GET",
                "description": "Get conversation history for a session",
                "response": { "success": "boolean", "history": "array" }
            },
            {
                "path": "/api/agent/sessions",
                "method": "GET",
                "description": "Get all active sessions",
                "response": { "success": "boolean", "sessions": "array" }
            },
            {
                "path": "/api/agent/sessions/:sessionId",
                "method": "DELETE",
                "description": "Clear a specific session",
                "response": { "success": "boolean", "message": "string" }
            }
        ]
    }))
}

/// 请求日志：METHOD path status duration
async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}
