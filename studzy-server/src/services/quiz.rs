//! CBT quiz session logic
//!
//! A session is keyed by (user, course). Its question order is drawn once,
//! when the session is created, and never reshuffled afterwards.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use studzy_common::db::{Question, QuizSession};

/// Caller's answer to a resume prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    Resume,
    Restart,
}

/// What to do with a start request given the stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDecision {
    /// Same session id: continue in place
    Hydrate,
    /// Unfinished session under another id: ask the caller
    PromptResume,
    /// Caller chose to continue the stored session
    Resume,
    /// Draw a fresh question set, replacing anything stored
    CreateNew,
}

/// Outcome reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Hydrated,
    ResumePrompt,
    Resumed,
    Created,
}

pub fn decide(
    stored: Option<&QuizSession>,
    requested_session_id: &str,
    mode: Option<StartMode>,
) -> SessionDecision {
    if mode == Some(StartMode::Restart) {
        return SessionDecision::CreateNew;
    }

    match stored {
        Some(session) if session.session_id == requested_session_id => SessionDecision::Hydrate,
        Some(session) if !session.completed => match mode {
            Some(StartMode::Resume) => SessionDecision::Resume,
            _ => SessionDecision::PromptResume,
        },
        _ => SessionDecision::CreateNew,
    }
}

/// Number of questions to draw: requested (or default), capped by the pool
/// and the configured maximum
pub fn effective_count(
    requested: Option<usize>,
    default_count: usize,
    max_count: usize,
    pool_size: usize,
) -> usize {
    requested
        .unwrap_or(default_count)
        .max(1)
        .min(max_count)
        .min(pool_size)
}

/// Shuffle the pool and keep the first `count` question ids
pub fn draw_questions<R: Rng + ?Sized>(pool: &[Question], count: usize, rng: &mut R) -> Vec<String> {
    let mut ids: Vec<String> = pool.iter().map(|q| q.id.clone()).collect();
    ids.shuffle(rng);
    ids.truncate(count);
    ids
}

/// Question as shown during a quiz; answers hidden until completion
#[derive(Debug, Clone, Serialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Client view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub course_id: String,
    pub current_index: i64,
    pub completed: bool,
    pub total: usize,
    pub answered: usize,
    pub answers: BTreeMap<String, i64>,
    pub questions: Vec<QuizQuestion>,
}

/// Short description of a stored session, for the resume prompt
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub total: usize,
    pub answered: usize,
    pub current_index: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl SessionSummary {
    pub fn of(session: &QuizSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            total: session.question_ids.len(),
            answered: session.answers.len(),
            current_index: session.current_index,
            started_at: session.started_at,
        }
    }
}

/// Order `questions` to match the session's fixed ordering
///
/// Questions deleted since the session started are dropped.
pub fn ordered_questions<'a>(session: &QuizSession, questions: &'a [Question]) -> Vec<&'a Question> {
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    session
        .question_ids
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .collect()
}

pub fn session_view(session: &QuizSession, questions: &[Question]) -> SessionView {
    let reveal = session.completed;
    let ordered = ordered_questions(session, questions);
    let last = ordered.len().saturating_sub(1) as i64;
    let answered = ordered
        .iter()
        .filter(|q| session.answers.contains_key(&q.id))
        .count();

    SessionView {
        session_id: session.session_id.clone(),
        course_id: session.course_id.clone(),
        current_index: session.current_index.clamp(0, last),
        completed: session.completed,
        total: ordered.len(),
        answered,
        answers: session.answers.0.clone(),
        questions: ordered
            .into_iter()
            .map(|q| QuizQuestion {
                id: q.id.clone(),
                question_text: q.question_text.clone(),
                options: q.options.0.clone(),
                correct_option: reveal.then_some(q.correct_option),
                explanation: if reveal { q.explanation.clone() } else { None },
            })
            .collect(),
    }
}

/// Per-question result after submission
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub question_id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub selected_option: Option<i64>,
    pub correct_option: i64,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub review: Vec<ReviewItem>,
}

/// Score a session; unanswered questions count as wrong
pub fn score_session(session: &QuizSession, questions: &[Question]) -> QuizResult {
    let review: Vec<ReviewItem> = ordered_questions(session, questions)
        .into_iter()
        .map(|q| {
            let selected = session.answers.get(&q.id).copied();
            ReviewItem {
                question_id: q.id.clone(),
                question_text: q.question_text.clone(),
                options: q.options.0.clone(),
                selected_option: selected,
                correct_option: q.correct_option,
                is_correct: selected == Some(q.correct_option),
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let total = review.len() as i64;
    let score = review.iter().filter(|r| r.is_correct).count() as i64;
    let percentage = if total > 0 {
        (score as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    QuizResult {
        score,
        total,
        percentage,
        review,
    }
}

/// Validate a question's options and answer index
pub fn validate_options(options: &[String], correct_option: i64) -> Result<(), String> {
    if !(2..=6).contains(&options.len()) {
        return Err(format!("questions need 2 to 6 options, got {}", options.len()));
    }
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err("options must not be empty".to_string());
    }
    if correct_option < 0 || correct_option as usize >= options.len() {
        return Err(format!(
            "correct_option {} is out of range for {} options",
            correct_option,
            options.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sqlx::types::Json;

    fn question(id: &str, correct: i64) -> Question {
        Question {
            id: id.to_string(),
            course_id: "c1".to_string(),
            question_text: format!("Question {}", id),
            options: Json(vec!["a".into(), "b".into(), "c".into()]),
            correct_option: correct,
            explanation: Some(format!("Because {}", id)),
            created_at: Utc::now(),
        }
    }

    fn session(session_id: &str, ids: &[&str], completed: bool) -> QuizSession {
        QuizSession {
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            session_id: session_id.to_string(),
            question_ids: Json(ids.iter().map(|s| s.to_string()).collect()),
            answers: Json(BTreeMap::new()),
            current_index: 0,
            completed,
            started_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_decide_branches() {
        let open = session("s1", &["q1"], false);
        let done = session("s1", &["q1"], true);

        assert_eq!(decide(None, "s2", None), SessionDecision::CreateNew);
        assert_eq!(decide(Some(&open), "s1", None), SessionDecision::Hydrate);
        assert_eq!(decide(Some(&done), "s1", None), SessionDecision::Hydrate);
        assert_eq!(decide(Some(&open), "s2", None), SessionDecision::PromptResume);
        assert_eq!(
            decide(Some(&open), "s2", Some(StartMode::Resume)),
            SessionDecision::Resume
        );
        assert_eq!(
            decide(Some(&open), "s2", Some(StartMode::Restart)),
            SessionDecision::CreateNew
        );
        assert_eq!(decide(Some(&done), "s2", None), SessionDecision::CreateNew);
        // Nothing to resume once completed
        assert_eq!(
            decide(Some(&done), "s2", Some(StartMode::Resume)),
            SessionDecision::CreateNew
        );
    }

    #[test]
    fn test_effective_count() {
        assert_eq!(effective_count(None, 20, 100, 50), 20);
        assert_eq!(effective_count(Some(500), 20, 100, 500), 100);
        assert_eq!(effective_count(Some(30), 20, 100, 7), 7);
        assert_eq!(effective_count(Some(0), 20, 100, 7), 1);
    }

    #[test]
    fn test_draw_questions_is_a_subset_without_duplicates() {
        let pool: Vec<Question> = (0..10).map(|i| question(&format!("q{}", i), 0)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = draw_questions(&pool, 4, &mut rng);

        assert_eq!(drawn.len(), 4);
        let mut unique = drawn.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert!(drawn.iter().all(|id| pool.iter().any(|q| &q.id == id)));
    }

    #[test]
    fn test_view_hides_answers_until_completed() {
        let questions = vec![question("q1", 1), question("q2", 2)];
        let open = session("s1", &["q2", "q1"], false);

        let view = session_view(&open, &questions);
        assert_eq!(view.questions[0].id, "q2");
        assert!(view.questions.iter().all(|q| q.correct_option.is_none()));
        assert!(view.questions.iter().all(|q| q.explanation.is_none()));

        let done = session("s1", &["q2", "q1"], true);
        let view = session_view(&done, &questions);
        assert_eq!(view.questions[0].correct_option, Some(2));
    }

    #[test]
    fn test_view_skips_deleted_questions() {
        let questions = vec![question("q2", 0), question("q3", 1)];
        let mut s = session("s1", &["q1", "q2", "q3"], false);
        s.answers.0.insert("q1".to_string(), 0);
        s.answers.0.insert("q3".to_string(), 1);
        s.current_index = 2;

        let view = session_view(&s, &questions);
        assert_eq!(view.total, 2);
        assert_eq!(view.answered, 1);
        assert_eq!(view.current_index, 1);
        assert_eq!(view.questions[view.current_index as usize].id, "q3");
    }

    #[test]
    fn test_score_counts_unanswered_as_wrong() {
        let questions = vec![question("q1", 1), question("q2", 2), question("q3", 0)];
        let mut s = session("s1", &["q1", "q2", "q3", "deleted"], false);
        s.answers.0.insert("q1".to_string(), 1);
        s.answers.0.insert("q2".to_string(), 0);

        let result = score_session(&s, &questions);
        assert_eq!(result.total, 3);
        assert_eq!(result.score, 1);
        assert!((result.percentage - 33.333).abs() < 0.01);
        assert_eq!(result.review[2].selected_option, None);
        assert!(!result.review[2].is_correct);
    }

    #[test]
    fn test_validate_options() {
        let two = vec!["a".to_string(), "b".to_string()];
        assert!(validate_options(&two, 1).is_ok());
        assert!(validate_options(&two, 2).is_err());
        assert!(validate_options(&two, -1).is_err());
        assert!(validate_options(&["only".to_string()], 0).is_err());
        assert!(validate_options(&["a".to_string(), " ".to_string()], 0).is_err());
    }
}
