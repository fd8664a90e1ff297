//! HTTP boundary for the support agent.
//!
//! Identity rides on the `X-User-Email` header: the principal is resolved
//! (and lazily created) before any handler touches the store, and every
//! downstream action is scoped to that principal. Thread metadata routes
//! are advisory display plumbing; the conversation log itself is the
//! durable record.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;

use omnisupport_agent::context::CallerIdentity;
use omnisupport_agent::orchestrator::{Orchestrator, OrchestratorError};
use omnisupport_core::domain::conversation::ThreadId;
use omnisupport_core::errors::ApplicationError;
use omnisupport_db::conversation::ConversationStore;
use omnisupport_db::repositories::{RepositoryError, UserRepository};

const IDENTITY_HEADER: &str = "x-user-email";
const THREAD_TITLE_MAX_CHARS: usize = 60;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ConversationStore>,
    users: Arc<dyn UserRepository>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ConversationStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self { orchestrator, store, users }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/threads", get(list_threads))
        .route("/api/v1/threads/{thread_id}", patch(rename_thread))
        .route("/api/v1/threads/{thread_id}/history", get(thread_history))
        .with_state(state)
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    PolicyUnavailable(String),
    Storage(RepositoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 5xx bodies go through the error taxonomy's user-safe phrasing;
        // the detail stays in the log line.
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::PolicyUnavailable(detail) => {
                tracing::error!(event_name = "api.policy_unavailable", error = %detail);
                let safe = ApplicationError::Policy(detail);
                (StatusCode::BAD_GATEWAY, safe.user_message().to_string())
            }
            Self::Storage(error) if error.is_pool_exhausted() => {
                tracing::warn!(event_name = "api.pool_exhausted");
                let safe = ApplicationError::Persistence(error.to_string());
                (StatusCode::SERVICE_UNAVAILABLE, safe.user_message().to_string())
            }
            Self::Storage(error) => {
                tracing::error!(event_name = "api.storage_failure", error = %error);
                let safe = ApplicationError::Persistence(error.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, safe.user_message().to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        Self::Storage(error)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::Policy(policy) => Self::PolicyUnavailable(policy.to_string()),
            OrchestratorError::Store(storage) => Self::Storage(storage),
        }
    }
}

async fn identify(state: &AppState, headers: &HeaderMap) -> Result<CallerIdentity, ApiError> {
    let email = headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing X-User-Email header".to_string()))?;

    if !email.contains('@') {
        return Err(ApiError::BadRequest(format!("`{email}` is not a valid email address")));
    }

    let user = state.users.find_or_create_by_email(email).await?;
    Ok(CallerIdentity::new(user.id, user.email))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    thread_id: String,
    actions_taken: Vec<String>,
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let caller = identify(&state, &headers).await?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let thread_id = match request.thread_id {
        Some(id) => ThreadId(id),
        None => {
            let title: String = query.chars().take(THREAD_TITLE_MAX_CHARS).collect();
            state.store.create_thread(caller.user_id, &title).await?.thread_id
        }
    };

    let outcome = state.orchestrator.run_turn(&caller, &thread_id, query).await?;

    Ok(Json(ChatResponse {
        response: outcome.final_text,
        thread_id: outcome.thread_id.0,
        actions_taken: outcome.tools_invoked,
    }))
}

#[derive(Debug, Serialize)]
struct ThreadSummary {
    thread_id: String,
    title: String,
    created_at: String,
}

async fn list_threads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    let caller = identify(&state, &headers).await?;

    let threads = state.store.list_threads(caller.user_id).await?;
    Ok(Json(
        threads
            .into_iter()
            .map(|thread| ThreadSummary {
                thread_id: thread.thread_id.0,
                title: thread.title,
                created_at: thread.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    ordinal: i64,
    role: String,
    content: String,
    created_at: String,
}

/// Displayable history only: raw tool results and empty intermediate
/// assistant turns stay in the log but never reach the client.
async fn thread_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    identify(&state, &headers).await?;

    let turns = state.store.snapshot(&ThreadId(thread_id)).await?;
    Ok(Json(
        turns
            .into_iter()
            .filter(|turn| turn.is_displayable())
            .map(|turn| HistoryEntry {
                ordinal: turn.ordinal,
                role: turn.role.as_str().to_string(),
                content: turn.content,
                created_at: turn.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    title: String,
}

async fn rename_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thread_id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    identify(&state, &headers).await?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let renamed = state.store.rename_thread(&ThreadId(thread_id.clone()), title).await?;
    if !renamed {
        return Err(ApiError::NotFound(format!("thread `{thread_id}` does not exist")));
    }

    Ok(StatusCode::NO_CONTENT)
}
