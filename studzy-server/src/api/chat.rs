//! AI study assistant: chat sessions and streamed replies

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use studzy_common::db::{ChatMessage, ChatSession};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::auth::AuthUser;
use crate::db::{chat as chat_db, courses};
use crate::error::{ApiError, ApiResult};
use crate::services::chat::{self, PreparedTurn};
use crate::services::llm::TokenStream;
use crate::AppState;

/// Longest accepted user message, in characters
pub const MAX_MESSAGE_CHARS: usize = 8000;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub course_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SessionWithMessages {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

async fn owned_session(state: &AppState, id: &str, user: &AuthUser) -> ApiResult<ChatSession> {
    chat_db::get_session(&state.db, id, user.id())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("chat session {}", id)))
}

/// GET /api/chat/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<ChatSession>>> {
    let sessions =
        chat_db::list_sessions(&state.db, user.id(), query.course_id.as_deref()).await?;
    Ok(Json(sessions))
}

/// POST /api/chat/sessions
pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<ChatSession>)> {
    if let Some(course_id) = req.course_id.as_deref() {
        if courses::get_course(&state.db, course_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("course {}", course_id)));
        }
    }
    let title = req.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let session =
        chat_db::create_session(&state.db, user.id(), req.course_id.as_deref(), title).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/chat/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionWithMessages>> {
    let session = owned_session(&state, &id, &user).await?;
    let messages = chat_db::list_messages(&state.db, &session.id).await?;
    Ok(Json(SessionWithMessages { session, messages }))
}

/// PATCH /api/chat/sessions/:id
pub async fn rename_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<RenameSessionRequest>,
) -> ApiResult<Json<ChatSession>> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    let session = owned_session(&state, &id, &user).await?;
    chat_db::rename_session(&state.db, &session.id, title).await?;
    Ok(Json(owned_session(&state, &id, &user).await?))
}

/// DELETE /api/chat/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !chat_db::delete_session(&state.db, &id, user.id()).await? {
        return Err(ApiError::NotFound(format!("chat session {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/chat/sessions/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let session = owned_session(&state, &id, &user).await?;
    Ok(Json(chat_db::list_messages(&state.db, &session.id).await?))
}

fn json_event(name: &'static str, data: serde_json::Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

/// POST /api/chat/sessions/:id/messages
///
/// Event sequence: `start`, `sources`, any number of `token`, then `done` or
/// `error`. The reply is produced by a detached task, so it is stored even if
/// the client disconnects mid-stream.
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("message content is required".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "messages are limited to {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let session = owned_session(&state, &id, &user).await?;
    let turn = chat::prepare_turn(&state, &session, &content).await?;

    let (tx, rx) = mpsc::channel::<Event>(64);
    tokio::spawn(run_completion(state, session, turn, tx));

    let stream = ReceiverStream::new(rx).map(Ok);
    Ok(Sse::new(stream).keep_alive(studzy_common::sse::keep_alive()))
}

async fn run_completion(
    state: AppState,
    session: ChatSession,
    turn: PreparedTurn,
    tx: mpsc::Sender<Event>,
) {
    let PreparedTurn {
        user_message,
        prompt,
        sources,
        title,
    } = turn;

    // Send failures only mean the client went away; keep generating
    let _ = tx
        .send(json_event(
            "start",
            json!({ "user_message_id": user_message.id, "title": title }),
        ))
        .await;
    let source_list: Vec<_> = sources
        .iter()
        .map(|m| {
            json!({
                "resource_id": m.resource_id,
                "resource_title": m.resource_title,
                "similarity": m.similarity,
            })
        })
        .collect();
    let _ = tx.send(json_event("sources", json!(source_list))).await;

    let tokens: TokenStream = match state.llm.chat_stream(prompt).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!(session_id = %session.id, provider = state.llm.id(), "Chat completion failed: {}", e);
            let _ = tx.send(json_event("error", json!({ "message": e.to_string() }))).await;
            return;
        }
    };

    match collect_tokens(tokens, &tx).await {
        Ok(reply) => finish_reply(&state, &session, reply, &tx).await,
        Err(message) => {
            warn!(session_id = %session.id, "Chat stream aborted: {}", message);
            let _ = tx.send(json_event("error", json!({ "message": message }))).await;
        }
    }
}

/// Forward tokens to the client and return the full reply text
async fn collect_tokens(mut tokens: TokenStream, tx: &mpsc::Sender<Event>) -> Result<String, String> {
    let mut reply = String::new();
    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                reply.push_str(&token);
                let _ = tx.send(json_event("token", json!({ "content": token }))).await;
            }
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(reply)
}

async fn finish_reply(state: &AppState, session: &ChatSession, reply: String, tx: &mpsc::Sender<Event>) {
    if reply.trim().is_empty() {
        let _ = tx
            .send(json_event("error", json!({ "message": "the assistant returned an empty reply" })))
            .await;
        return;
    }

    let stored = match chat_db::insert_message(&state.db, &session.id, "assistant", &reply).await {
        Ok(message) => message,
        Err(e) => {
            error!(session_id = %session.id, "Failed to store assistant reply: {}", e);
            let _ = tx
                .send(json_event("error", json!({ "message": "failed to store the reply" })))
                .await;
            return;
        }
    };

    if let Err(e) = chat_db::touch_session(&state.db, &session.id).await {
        debug!(session_id = %session.id, "Failed to touch session: {}", e);
    }

    info!(session_id = %session.id, chars = reply.len(), "Assistant reply stored");
    let _ = tx.send(json_event("done", json!({ "message_id": stored.id }))).await;
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/chat/sessions/:id",
            get(get_session).patch(rename_session).delete(delete_session),
        )
        .route(
            "/api/chat/sessions/:id/messages",
            get(list_messages).post(send_message),
        )
}
