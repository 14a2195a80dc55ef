//! Assembly of one assistant turn
//!
//! The user message is persisted before anything else so it survives a
//! provider failure. Retrieval problems degrade to an answer without course
//! context; only the completion stream itself can fail the turn.

use studzy_common::db::{ChatMessage, ChatSession};
use tracing::{debug, warn};

use crate::db::activity::{self, ActivityKind};
use crate::db::chat::{self as chat_db, DEFAULT_SESSION_TITLE};
use crate::db::courses;
use crate::error::ApiResult;
use crate::services::llm::PromptMessage;
use crate::services::rag::{self, DocumentMatch};
use crate::AppState;

/// Messages of history sent with each prompt, including the new one
pub const HISTORY_LIMIT: i64 = 20;

/// Longest generated session title, in characters
pub const TITLE_MAX_CHARS: usize = 60;

/// Session title derived from the first user message
pub fn title_from_message(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(DEFAULT_SESSION_TITLE);
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(TITLE_MAX_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

/// System message followed by stored history
///
/// System rows in history are dropped; only the fresh system prompt is sent.
pub fn build_prompt(system: String, history: &[ChatMessage]) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(history.len() + 1);
    prompt.push(PromptMessage::system(system));
    prompt.extend(history.iter().filter_map(|m| match m.role.as_str() {
        "user" => Some(PromptMessage::user(m.content.clone())),
        "assistant" => Some(PromptMessage::assistant(m.content.clone())),
        _ => None,
    }));
    prompt
}

/// Everything needed to stream the assistant reply
pub struct PreparedTurn {
    pub user_message: ChatMessage,
    pub prompt: Vec<PromptMessage>,
    pub sources: Vec<DocumentMatch>,
    /// New title when this turn renamed the session
    pub title: Option<String>,
}

pub async fn prepare_turn(
    state: &AppState,
    session: &ChatSession,
    content: &str,
) -> ApiResult<PreparedTurn> {
    let user_message = chat_db::insert_message(&state.db, &session.id, "user", content).await?;

    let title = if session.title == DEFAULT_SESSION_TITLE
        && chat_db::count_user_messages(&state.db, &session.id).await? == 1
    {
        let title = title_from_message(content);
        chat_db::rename_session(&state.db, &session.id, &title).await?;
        Some(title)
    } else {
        None
    };

    activity::record(
        &state.db,
        &session.user_id,
        ActivityKind::Chat,
        None,
        session.course_id.as_deref(),
    )
    .await?;

    let sources = retrieve(state, session, content).await;
    let context = rag::build_context(&sources, state.config.rag.max_context_chars);

    let course_title = match session.course_id.as_deref() {
        Some(course_id) => courses::get_course(&state.db, course_id)
            .await?
            .map(|c| c.title),
        None => None,
    };

    let history = chat_db::recent_messages(&state.db, &session.id, HISTORY_LIMIT).await?;
    let prompt = build_prompt(rag::system_prompt(&context, course_title.as_deref()), &history);

    Ok(PreparedTurn {
        user_message,
        prompt,
        sources,
        title,
    })
}

async fn retrieve(state: &AppState, session: &ChatSession, query: &str) -> Vec<DocumentMatch> {
    let embedded = match state.llm.embed(&[query.to_string()]).await {
        Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
        Ok(_) => {
            warn!(session_id = %session.id, "Provider returned no query embedding");
            return Vec::new();
        }
        Err(e) => {
            warn!(session_id = %session.id, "Query embedding failed, answering without context: {}", e);
            return Vec::new();
        }
    };

    let rag_config = &state.config.rag;
    match rag::match_documents(
        &state.db,
        &embedded,
        rag_config.match_threshold,
        rag_config.match_count,
        session.course_id.as_deref(),
    )
    .await
    {
        Ok(matches) => {
            debug!(session_id = %session.id, matches = matches.len(), "Retrieved context");
            matches
        }
        Err(e) => {
            warn!(session_id = %session.id, "Similarity search failed: {}", e);
            Vec::new()
        }
    }
}
