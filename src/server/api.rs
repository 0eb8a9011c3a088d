use crate::agent::ChatAgent;
use crate::cli::Args;
use crate::error::ChatError;
use crate::models::api::{ ErrorBody, SendMessageRequest, SendMessageResponse, StatusMessage };
use crate::models::chat::{ Conversation, ConversationSummary };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ DefaultBodyLimit, Path, Request, State, rejection::JsonRejection },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::Serialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
    details: Option<Vec<String>>,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
    api_key: Option<String>,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let error = self.to_string();
        let (status, body) = match self {
            ChatError::Validation =>
                (StatusCode::BAD_REQUEST, ErrorBody { error, message: None }),
            ChatError::NotFound =>
                (StatusCode::NOT_FOUND, ErrorBody { error, message: None }),
            ChatError::ModelService(detail) =>
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Failed to process message".into(),
                        message: Some(detail),
                    },
                ),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the full HTTP surface. `api_key`, when set, guards every `/api` route.
pub fn router(agent: Arc<ChatAgent>, api_key: Option<String>, max_body_bytes: usize) -> Router {
    let api_key = api_key.filter(|k| !k.trim().is_empty());
    if api_key.is_some() {
        info!("HTTP API configured with API Key authentication.");
    } else {
        warn!("HTTP API configured WITHOUT API Key authentication. Routes are open.");
    }
    let state = AppState { agent, api_key };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chat_routes = Router::new()
        .route(
            "/conversation/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler)
        )
        .route("/conversations", get(list_conversations_handler))
        .route("/message", post(send_message_handler));

    let api_routes = Router::new()
        .nest("/chat", chat_routes)
        .route("/reload-prompts", get(reload_prompts_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(cors).layer(DefaultBodyLimit::max(max_body_bytes)))
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<ChatAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = router(agent, args.server_api_key.clone(), args.max_body_bytes);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => (cert_path, key_path),
            _ => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig
            ::from_pem_file(cert_path, key_path).await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        info!("Starting HTTPS API server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener
            ::bind(addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;
        info!("Starting HTTP API server on: http://{}", addr);
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal()).await?;
    }

    info!("HTTP API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, draining connections");
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(required) = &state.api_key {
        let provided = req
            .headers()
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok());
        if provided != Some(required.as_str()) {
            warn!("{} {}: bad or missing API key", req.method(), req.uri().path());
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody { error: "Unauthorized".into(), message: None }),
            ).into_response();
        }
    }
    next.run(req).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Conversation>, ChatError> {
    state.agent.get_conversation(&id).await.map(Json)
}

async fn list_conversations_handler(
    State(state): State<AppState>
) -> Json<Vec<ConversationSummary>> {
    Json(state.agent.list_conversations().await)
}

async fn send_message_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!("Rejected message body: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(ErrorBody { error: "Invalid request body".into(), message: Some(rejection.body_text()) }),
            ).into_response();
        }
    };

    let images = req.images.unwrap_or_default();
    match state.agent.submit(req.conversation_id.as_deref(), &req.message, images).await {
        Ok(reply) =>
            Json(SendMessageResponse {
                id: reply.message.id,
                content: reply.message.content,
                role: reply.message.role,
                timestamp: reply.message.timestamp,
                conversation_id: reply.conversation_id,
            }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<StatusMessage>, ChatError> {
    state.agent.delete_conversation(&id).await?;
    Ok(Json(StatusMessage { message: "Conversation deleted successfully".into() }))
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (ok, detail) = match state.agent.reload_prompts_if_changed().await {
        Ok(true) => (true, "Prompts reloaded".to_string()),
        Ok(false) => (true, "Prompts unchanged".to_string()),
        Err(e) => (false, format!("Prompts error: {}", e)),
    };

    let code = if ok { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    (code, Json(ReloadResponse {
        success: ok,
        message: if ok { "Reload complete".into() } else { "Reload errors".into() },
        details: Some(vec![detail]),
    }))
}
