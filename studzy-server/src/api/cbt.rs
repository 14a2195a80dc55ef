//! CBT question bank and quiz session endpoints
//!
//! One quiz session is stored per (user, course). Clients identify their
//! local session with `session_id`; the server decides whether a start request
//! continues it, asks about resuming an older one, or draws a new set.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use studzy_common::db::{Attempt, Question, QuizSession};
use tracing::info;

use crate::auth::{AdminUser, AuthUser};
use crate::db::activity::{self, ActivityKind};
use crate::db::attempts::{self, NewAttempt};
use crate::db::questions::{self, QuestionInput};
use crate::db::{courses, quiz_sessions};
use crate::error::{ApiError, ApiResult};
use crate::services::quiz::{
    self, QuizResult, SessionDecision, SessionSummary, SessionView, StartMode, StartStatus,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub session_id: String,
    pub question_count: Option<usize>,
    pub mode: Option<StartMode>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub status: StartStatus,
    /// Present for every status except `resume_prompt`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
    /// The unfinished session the caller may resume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<SessionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: String,
    pub option: i64,
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub index: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub attempt: Attempt,
    #[serde(flatten)]
    pub result: QuizResult,
}

#[derive(Debug, Serialize)]
pub struct QuestionCount {
    pub course_id: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct AttemptQuery {
    pub course_id: Option<String>,
}

async fn ensure_course(state: &AppState, course_id: &str) -> ApiResult<()> {
    match courses::get_course(&state.db, course_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("course {}", course_id))),
    }
}

async fn load_session(state: &AppState, user_id: &str, course_id: &str) -> ApiResult<QuizSession> {
    quiz_sessions::get_session(&state.db, user_id, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no quiz session for course {}", course_id)))
}

async fn load_open_session(
    state: &AppState,
    user_id: &str,
    course_id: &str,
) -> ApiResult<QuizSession> {
    let session = load_session(state, user_id, course_id).await?;
    if session.completed {
        return Err(ApiError::Conflict("quiz session already submitted".to_string()));
    }
    Ok(session)
}

fn validate_question(input: &QuestionInput) -> ApiResult<()> {
    if input.question_text.trim().is_empty() {
        return Err(ApiError::BadRequest("question_text is required".to_string()));
    }
    quiz::validate_options(&input.options, input.correct_option).map_err(ApiError::BadRequest)
}

/// POST /api/admin/questions
pub async fn create_question(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<QuestionInput>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    validate_question(&input)?;
    ensure_course(&state, &input.course_id).await?;
    let question = questions::insert_question(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// PUT /api/admin/questions/:id
pub async fn update_question(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(input): Json<QuestionInput>,
) -> ApiResult<Json<Question>> {
    validate_question(&input)?;
    ensure_course(&state, &input.course_id).await?;
    questions::update_question(&state.db, &id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("question {}", id)))
}

/// DELETE /api/admin/questions/:id
pub async fn delete_question(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !questions::delete_question(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("question {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/courses/:id/questions/count
pub async fn question_count(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(course_id): Path<String>,
) -> ApiResult<Json<QuestionCount>> {
    ensure_course(&state, &course_id).await?;
    let count = questions::count_for_course(&state.db, &course_id).await?;
    Ok(Json(QuestionCount { course_id, count }))
}

/// POST /api/cbt/:course_id/session
pub async fn start_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    let session_id = req.session_id.trim();
    if session_id.is_empty() {
        return Err(ApiError::BadRequest("session_id is required".to_string()));
    }
    ensure_course(&state, &course_id).await?;

    let stored = quiz_sessions::get_session(&state.db, user.id(), &course_id).await?;
    let decision = quiz::decide(stored.as_ref(), session_id, req.mode);

    let (status, session) = match (decision, stored) {
        (SessionDecision::PromptResume, Some(stored)) => {
            return Ok(Json(StartSessionResponse {
                status: StartStatus::ResumePrompt,
                session: None,
                stored: Some(SessionSummary::of(&stored)),
            }));
        }
        (SessionDecision::Hydrate, Some(stored)) => (StartStatus::Hydrated, stored),
        (SessionDecision::Resume, Some(stored)) => (StartStatus::Resumed, stored),
        _ => {
            let pool = questions::list_for_course(&state.db, &course_id).await?;
            if pool.is_empty() {
                return Err(ApiError::NotFound(format!(
                    "course {} has no questions",
                    course_id
                )));
            }

            let cbt = &state.config.cbt;
            let count = quiz::effective_count(
                req.question_count,
                cbt.default_question_count,
                cbt.max_question_count,
                pool.len(),
            );
            let question_ids = quiz::draw_questions(&pool, count, &mut rand::thread_rng());
            let session = quiz_sessions::replace_session(
                &state.db,
                user.id(),
                &course_id,
                session_id,
                &question_ids,
            )
            .await?;

            info!(
                user_id = %user.id(),
                course_id = %course_id,
                questions = question_ids.len(),
                "Created quiz session"
            );
            (StartStatus::Created, session)
        }
    };

    let questions = questions::list_for_course(&state.db, &course_id).await?;
    Ok(Json(StartSessionResponse {
        status,
        session: Some(quiz::session_view(&session, &questions)),
        stored: None,
    }))
}

/// GET /api/cbt/:course_id/session
pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let session = load_session(&state, user.id(), &course_id).await?;
    let questions = questions::list_for_course(&state.db, &course_id).await?;
    Ok(Json(quiz::session_view(&session, &questions)))
}

/// PUT /api/cbt/:course_id/session/answer
pub async fn answer_question(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> ApiResult<Json<SessionView>> {
    let mut session = load_open_session(&state, user.id(), &course_id).await?;

    let questions = questions::list_for_course(&state.db, &course_id).await?;
    // Positions index the visible ordering
    let ordered = quiz::ordered_questions(&session, &questions);
    let position = ordered
        .iter()
        .position(|q| q.id == req.question_id)
        .ok_or_else(|| {
            ApiError::BadRequest(format!("question {} is not part of this session", req.question_id))
        })?;
    let question = ordered[position];
    if req.option < 0 || req.option as usize >= question.options.len() {
        return Err(ApiError::BadRequest(format!(
            "option {} is out of range for {} options",
            req.option,
            question.options.len()
        )));
    }

    session.answers.0.insert(req.question_id, req.option);
    session.current_index = position as i64;
    quiz_sessions::save_progress(
        &state.db,
        user.id(),
        &course_id,
        &session.answers,
        session.current_index,
    )
    .await?;

    Ok(Json(quiz::session_view(&session, &questions)))
}

/// PUT /api/cbt/:course_id/session/index
pub async fn set_index(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<IndexRequest>,
) -> ApiResult<Json<SessionView>> {
    let mut session = load_open_session(&state, user.id(), &course_id).await?;

    let questions = questions::list_for_course(&state.db, &course_id).await?;
    let total = quiz::ordered_questions(&session, &questions).len() as i64;
    if req.index < 0 || req.index >= total {
        return Err(ApiError::BadRequest(format!(
            "index {} is out of range for {} questions",
            req.index, total
        )));
    }

    session.current_index = req.index;
    quiz_sessions::save_progress(&state.db, user.id(), &course_id, &session.answers, req.index)
        .await?;

    Ok(Json(quiz::session_view(&session, &questions)))
}

/// POST /api/cbt/:course_id/session/submit
pub async fn submit_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> ApiResult<Json<SubmitResponse>> {
    let session = load_open_session(&state, user.id(), &course_id).await?;
    let questions = questions::list_for_course(&state.db, &course_id).await?;
    let result = quiz::score_session(&session, &questions);

    let mut tx = state.db.begin().await?;

    // Conditional update; a concurrent submit loses here
    if !quiz_sessions::mark_completed(&mut *tx, user.id(), &course_id).await? {
        return Err(ApiError::Conflict("quiz session already submitted".to_string()));
    }

    let attempt = attempts::insert_attempt(
        &mut *tx,
        &NewAttempt {
            user_id: user.id(),
            course_id: &course_id,
            session_id: &session.session_id,
            score: result.score,
            total: result.total,
            answers: &session.answers,
            started_at: session.started_at,
        },
    )
    .await?;

    tx.commit().await?;

    activity::record(&state.db, user.id(), ActivityKind::Quiz, None, Some(&course_id)).await?;

    info!(
        user_id = %user.id(),
        course_id = %course_id,
        score = result.score,
        total = result.total,
        "Quiz submitted"
    );

    Ok(Json(SubmitResponse { attempt, result }))
}

/// GET /api/cbt/attempts
pub async fn list_attempts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AttemptQuery>,
) -> ApiResult<Json<Vec<Attempt>>> {
    let attempts =
        attempts::list_for_user(&state.db, user.id(), query.course_id.as_deref()).await?;
    Ok(Json(attempts))
}

pub fn cbt_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/questions", post(create_question))
        .route(
            "/api/admin/questions/:id",
            put(update_question).delete(delete_question),
        )
        .route("/api/courses/:id/questions/count", get(question_count))
        .route("/api/cbt/attempts", get(list_attempts))
        .route("/api/cbt/:course_id/session", post(start_session).get(get_session))
        .route("/api/cbt/:course_id/session/answer", put(answer_question))
        .route("/api/cbt/:course_id/session/index", put(set_index))
        .route("/api/cbt/:course_id/session/submit", post(submit_session))
}
