//! HTTP and WebSocket surface.
//!
//! REST routes live under `/api/v1`; `/health` and `/ws` sit at the root.
//! Middleware: CORS, request tracing.

pub mod error;
pub mod handlers;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::orchestrator::Orchestrator;

use state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/assistants", get(handlers::list_assistants))
        .route("/assistants/{name}/status", get(handlers::assistant_status))
        .route("/tasks", get(handlers::list_tasks))
        .route("/tasks/execute", post(handlers::execute_task))
        .route("/tasks/schedule", post(handlers::schedule_task))
        .route("/tasks/{id}", delete(handlers::cancel_task))
        .route("/system/health", get(handlers::system_health))
        .route("/system/info", get(handlers::system_info));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize the orchestrator, serve until Ctrl-C or SIGTERM, then shut
/// the orchestrator down.
pub async fn serve(
    orchestrator: Arc<Orchestrator>,
    app_name: &str,
    cors_origins: &[String],
    host: &str,
    port: u16,
) -> Result<()> {
    orchestrator.initialize().await?;

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::ServerBind {
            addr: addr.clone(),
            source: e,
        })?;
    info!(addr = %addr, "Crystal API listening");

    let router = build_router(AppState::new(orchestrator.clone(), app_name), cors_origins);
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Server(e.to_string()));

    orchestrator.shutdown().await;
    info!("Server stopped");
    result
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerationBackend, MockBackend};
    use crate::config::{AssistantSettings, CrystalConfig};
    use crate::coordinator::{HybridCoordinator, RoutingPolicy};
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    struct TestServer {
        base: String,
        state: AppState,
    }

    async fn spawn_server() -> TestServer {
        let mut config = CrystalConfig::default();
        config.assistants = vec![AssistantSettings {
            name: "Ruby".to_string(),
            preferred_model: Some("gpt-4o-mini".to_string()),
            instructions: Some("You are Ruby.".to_string()),
            ..Default::default()
        }];

        let remote: Arc<dyn GenerationBackend> = Arc::new(MockBackend::remote().fixed("Hello from Ruby"));
        let coordinator = HybridCoordinator::new(RoutingPolicy::default(), None, Some(remote));
        let orchestrator =
            Arc::new(Orchestrator::with_coordinator(&config, Arc::new(coordinator)).unwrap());
        orchestrator.initialize().await.unwrap();

        let state = AppState::new(orchestrator, "Crystal");
        let router = build_router(state.clone(), &["*".to_string()]);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestServer {
            base: format!("http://{}", addr),
            state,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_health() {
        let server = spawn_server().await;
        let body: Value = reqwest::get(format!("{}/health", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["assistants"], json!(["ruby"]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chat_round_trip() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{}/api/v1/chat", server.base))
            .json(&json!({ "message": "hi" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["message"], "Hello from Ruby");
        assert_eq!(body["assistant"], "ruby");
        assert_eq!(body["error"], false);

        let body: Value = client
            .post(format!("{}/api/v1/chat", server.base))
            .json(&json!({ "message": "hi", "assistant": "garnet" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["assistant"], "system");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_assistant_status_404() {
        let server = spawn_server().await;

        let ok = reqwest::get(format!("{}/api/v1/assistants/Ruby/status", server.base))
            .await
            .unwrap();
        assert_eq!(ok.status(), 200);
        let body: Value = ok.json().await.unwrap();
        assert_eq!(body["name"], "Ruby");

        let missing = reqwest::get(format!("{}/api/v1/assistants/garnet/status", server.base))
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["error"]["code"], "E400");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_list_cancel() {
        let server = spawn_server().await;
        let client = reqwest::Client::new();

        let created = client
            .post(format!("{}/api/v1/tasks/schedule", server.base))
            .json(&json!({ "id": "water", "when": "every 2 hours", "description": "Drink water" }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);
        let job: Value = created.json().await.unwrap();
        assert_eq!(job["type"], "interval");
        assert_eq!(job["seconds"], 7200);

        let listing: Value = reqwest::get(format!("{}/api/v1/tasks", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ids: Vec<&str> = listing["active_tasks"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|j| j["id"].as_str())
            .collect();
        assert!(ids.contains(&"water"));

        let deleted = client
            .delete(format!("{}/api/v1/tasks/water", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), 204);

        let again = client
            .delete(format!("{}/api/v1/tasks/water", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), 404);

        let invalid = client
            .post(format!("{}/api/v1/tasks/schedule", server.base))
            .json(&json!({ "when": "whenever", "description": "x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), 400);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_native_task() {
        let server = spawn_server().await;
        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/v1/tasks/execute", server.base))
            .json(&json!({ "task_type": "capability_list" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["task_execution"], true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_system_info() {
        let server = spawn_server().await;
        let body: Value = reqwest::get(format!("{}/api/v1/system/info", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["app_name"], "Crystal");
        assert_eq!(body["assistants_count"], 1);
        assert_eq!(body["orchestrator"]["initialized"], true);
        assert_eq!(body["websocket_connections_total"], 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_system_health_reports_backends() {
        let server = spawn_server().await;
        let body: Value = reqwest::get(format!("{}/api/v1/system/health", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["scheduler_running"], true);
        assert_eq!(body["backends"]["remote"]["operational"], true);
        assert!(body["backends"].get("local").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_websocket_chat() {
        let server = spawn_server().await;
        let url = format!("{}/ws", server.base.replace("http://", "ws://"));
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        socket
            .send(WsMessage::Text(r#"{"message": ""}"#.to_string()))
            .await
            .unwrap();
        socket
            .send(WsMessage::Text("not json".to_string()))
            .await
            .unwrap();
        socket
            .send(WsMessage::Text(r#"{"assistant": "ruby", "message": "hi"}"#.to_string()))
            .await
            .unwrap();

        let mut replies = Vec::new();
        while replies.len() < 2 {
            match socket.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    replies.push(serde_json::from_str::<Value>(&text).unwrap())
                }
                Some(Ok(_)) => continue,
                other => panic!("socket closed early: {:?}", other),
            }
        }

        assert_eq!(replies[0]["error"], true);
        assert!(replies[0]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid message format"));
        assert_eq!(replies[1]["message"], "Hello from Ruby");
        assert_eq!(server.state.connections.active(), 1);

        socket.close(None).await.unwrap();
    }
}
