//! HTTP routes.
//!
//! - `POST /chat` runs one exchange
//! - `GET /sessions` lists live sessions
//! - `GET /sessions/{id}` and `DELETE /sessions/{id}` read and remove one
//! - `GET /health` reports liveness

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use skycast_conversation::{ChatRequest, ExchangeErrorKind, Session, SessionSummary, Turn};
use skycast_core::SessionId;
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument};

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// User text.
    pub message: String,
    /// Conversation to continue.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Reply of `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    /// Session the exchange ran in; send it back to continue.
    pub session_id: SessionId,
    /// Assistant reply.
    pub response: String,
    /// Full history after the exchange.
    pub history: Vec<Turn>,
    /// Set when the reply was produced by the error policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ExchangeErrorKind>,
}

/// Reply of `GET /sessions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionList {
    /// Live sessions, most recently active first.
    pub sessions: Vec<SessionSummary>,
    /// Number of sessions.
    pub total: usize,
}

#[instrument(skip_all)]
async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::EmptyMessage);
    }

    let mut request = ChatRequest::new(body.message);
    if let Some(raw) = body.session_id.as_deref() {
        match raw.parse::<SessionId>() {
            Ok(id) => request = request.in_session(id),
            Err(e) => debug!(session_id = raw, error = %e, "unparseable session id, starting a new session"),
        }
    }

    let response = state.orchestrator.chat(request).await?;
    Ok(Json(ChatReply {
        session_id: response.session_id,
        response: response.response,
        history: response.history,
        error_kind: response.error_kind,
    }))
}

async fn list_sessions(State(state): State<AppState>) -> Result<Json<SessionList>, ApiError> {
    let sessions = state.sessions().list().await?;
    Ok(Json(SessionList {
        total: sessions.len(),
        sessions,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let id = parse_session_id(id)?;
    Ok(Json(state.sessions().get(id).await?))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_session_id(id)?;
    state.sessions().remove(id).await?;
    Ok(Json(json!({ "message": "Session deleted successfully" })))
}

async fn health(State(state): State<AppState>) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

fn parse_session_id(raw: String) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::SessionNotFound { id: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde::de::DeserializeOwned;
    use skycast_ai::ModelError;
    use skycast_ai::testing::ScriptedBackend;
    use skycast_conversation::{
        Dispatcher, ExchangeConfig, InMemorySessionStore, Orchestrator, ToolRegistry,
    };
    use skycast_weather::testing::ScriptedSource;
    use skycast_weather::{WeatherConfig, WeatherService};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(backend: ScriptedBackend, source: ScriptedSource) -> Router {
        let weather = WeatherService::new(Arc::new(source), WeatherConfig::new("test-key"));
        let dispatcher =
            Dispatcher::weather(Arc::new(ToolRegistry::weather()), Arc::new(weather))
                .expect("bindings match registry");
        let orchestrator = Orchestrator::new(
            Arc::new(backend),
            Arc::new(dispatcher),
            Arc::new(InMemorySessionStore::default()),
            &ExchangeConfig::default(),
        );
        router(AppState::new(Arc::new(orchestrator)))
    }

    fn json_request(method: Method, uri: &str, body: JsonValue) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn send<T: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, T) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn chat_starts_and_continues_a_session() {
        let app = app(
            ScriptedBackend::new().text("Hello!").text("Still here."),
            ScriptedSource::new(),
        );

        let (status, first): (_, ChatReply) = send(
            &app,
            json_request(Method::POST, "/chat", json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first.response, "Hello!");
        assert_eq!(first.history.len(), 2);
        assert!(first.error_kind.is_none());

        let (status, second): (_, ChatReply) = send(
            &app,
            json_request(
                Method::POST,
                "/chat",
                json!({ "message": "you there?", "session_id": first.session_id.to_string() }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.history.len(), 4);
    }

    #[tokio::test]
    async fn garbage_session_id_starts_a_new_session() {
        let app = app(ScriptedBackend::new().text("Hi."), ScriptedSource::new());

        let (status, reply): (_, ChatReply) = send(
            &app,
            json_request(
                Method::POST,
                "/chat",
                json!({ "message": "hi", "session_id": "not-a-session" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply.history.len(), 2);
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let app = app(ScriptedBackend::new(), ScriptedSource::new());

        let (status, body): (_, JsonValue) = send(
            &app,
            json_request(Method::POST, "/chat", json!({ "message": "   " })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Message must not be empty");
    }

    #[tokio::test]
    async fn model_failure_is_a_bad_gateway() {
        let app = app(
            ScriptedBackend::new().fail(ModelError::RequestFailed {
                reason: "secret upstream detail".to_string(),
                status: Some(500),
            }),
            ScriptedSource::new(),
        );

        let (status, body): (_, JsonValue) = send(
            &app,
            json_request(Method::POST, "/chat", json!({ "message": "weather?" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error_kind"], "model_call");
        assert!(!body.to_string().contains("secret"));

        let (_, sessions): (_, SessionList) =
            send(&app, empty_request(Method::GET, "/sessions")).await;
        assert_eq!(sessions.total, 0);
    }

    #[tokio::test]
    async fn sessions_can_be_listed_read_and_deleted() {
        let app = app(ScriptedBackend::new().text("Hello!"), ScriptedSource::new());
        let (_, reply): (_, ChatReply) = send(
            &app,
            json_request(Method::POST, "/chat", json!({ "message": "hi there" })),
        )
        .await;
        let uri = format!("/sessions/{}", reply.session_id);

        let (status, list): (_, SessionList) =
            send(&app, empty_request(Method::GET, "/sessions")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.total, 1);
        assert_eq!(list.sessions[0].title.as_deref(), Some("hi there"));

        let (status, session): (_, Session) = send(&app, empty_request(Method::GET, &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session.turns.len(), 2);

        let (status, _): (_, JsonValue) = send(&app, empty_request(Method::DELETE, &uri)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _): (_, JsonValue) = send(&app, empty_request(Method::GET, &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_session_paths_are_not_found() {
        let app = app(ScriptedBackend::new(), ScriptedSource::new());

        let (status, _): (_, JsonValue) =
            send(&app, empty_request(Method::GET, "/sessions/bogus")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/sessions/{}", SessionId::new());
        let (status, _): (_, JsonValue) = send(&app, empty_request(Method::DELETE, &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app(ScriptedBackend::new(), ScriptedSource::new());

        let (status, body): (_, JsonValue) =
            send(&app, empty_request(Method::GET, "/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["uptime_seconds"].is_u64());
    }
}
