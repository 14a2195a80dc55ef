//! Integration tests for the study assistant chat
//!
//! Replies stream as server-sent events; the fake provider's canned tokens
//! let the tests check the full event sequence and what gets persisted.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{FakeLlm, TestApp};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

/// Parse an SSE body into (event, data) pairs, skipping keep-alive comments
fn parse_sse(body: &[u8]) -> Vec<(String, Value)> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(chunk) = line.strip_prefix("data:") {
                    data.push_str(chunk.strip_prefix(' ').unwrap_or(chunk));
                }
            }
            let event = event?;
            let value = serde_json::from_str(&data).unwrap_or(Value::String(data));
            Some((event, value))
        })
        .collect()
}

async fn send_message(app: &TestApp, token: &str, session_id: &str, content: &str) -> (StatusCode, Vec<(String, Value)>) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/chat/sessions/{}/messages", session_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "content": content }).to_string()))
        .unwrap();

    let (status, bytes) = app.send(request).await;
    (status, parse_sse(&bytes))
}

async fn new_session(app: &TestApp, token: &str, course_id: Option<&str>) -> String {
    let (status, body) = app
        .call("POST", "/api/chat/sessions", Some(token), Some(json!({ "course_id": course_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["title"], "New chat");
    body["id"].as_str().unwrap().to_string()
}

const NOTES: &str = "Photosynthesis uses light energy to make sugar in the chloroplast. \
The light reactions capture energy and the Calvin cycle fixes carbon dioxide.";

#[tokio::test]
async fn test_reply_streams_and_persists() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Introductory Biology").await;
    let (_, upload) = app
        .upload(&admin, &course, "Week 1", "week1.txt", "text/plain", NOTES.as_bytes())
        .await;
    let resource_id = upload["id"].as_str().unwrap().to_string();
    assert_eq!(app.wait_for_ingestion(&admin, &resource_id).await, "ingested");

    let (student, _) = app.register("sam@studzy.test", "Sam").await;
    let session = new_session(&app, &student, Some(&course)).await;

    let (status, events) =
        send_message(&app, &student, &session, "How does photosynthesis use light?").await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["start", "sources", "token", "token", "token", "done"]);

    let (_, start) = &events[0];
    assert_eq!(start["title"], "How does photosynthesis use light?");

    let (_, sources) = &events[1];
    assert_eq!(sources[0]["resource_id"], resource_id);
    assert_eq!(sources[0]["resource_title"], "Week 1");

    let reply: String = events
        .iter()
        .filter(|(name, _)| name == "token")
        .map(|(_, data)| data["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(reply, "Photosynthesis turns light into sugar.");

    let prompt = app.llm.last_prompt().unwrap();
    assert_eq!(prompt[0].role, "system");
    assert!(prompt[0].content.contains("Introductory Biology"));
    assert!(prompt[0].content.contains("COURSE MATERIALS"));
    assert_eq!(prompt.last().unwrap().role, "user");
    assert_eq!(prompt.last().unwrap().content, "How does photosynthesis use light?");

    let (_, stored) = app
        .call("GET", &format!("/api/chat/sessions/{}", session), Some(&student), None)
        .await;
    assert_eq!(stored["title"], "How does photosynthesis use light?");
    let messages = stored["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], reply);

    let (_, done) = events.last().unwrap();
    assert_eq!(done["message_id"], messages[1]["id"]);
}

#[tokio::test]
async fn test_history_is_sent_and_title_kept() {
    let app = TestApp::new().await;
    let (token, _) = app.register("sam@studzy.test", "Sam").await;
    let session = new_session(&app, &token, None).await;

    send_message(&app, &token, &session, "What is osmosis?").await;
    let (_, events) = send_message(&app, &token, &session, "And diffusion?").await;

    // Only the first message names the session
    assert!(events[0].1["title"].is_null());

    let prompt = app.llm.last_prompt().unwrap();
    let roles: Vec<&str> = prompt.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert!(!prompt[0].content.contains("COURSE MATERIALS"));

    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(sessions[0]["title"], "What is osmosis?");
}

#[tokio::test]
async fn test_reply_is_stored_after_client_disconnects() {
    let app = TestApp::new().await;
    let (token, _) = app.register("sam@studzy.test", "Sam").await;
    let session = new_session(&app, &token, None).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/chat/sessions/{}/messages", session))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "content": "What is osmosis?" }).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Hang up without reading a single event
    drop(response);

    let uri = format!("/api/chat/sessions/{}/messages", session);
    let mut messages = Vec::new();
    for _ in 0..100 {
        let (_, body) = app.call("GET", &uri, Some(&token), None).await;
        messages = body.as_array().cloned().unwrap_or_default();
        if messages.len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(messages.len(), 2, "assistant reply was not stored");
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Photosynthesis turns light into sugar.");
}

#[tokio::test]
async fn test_provider_failure_keeps_user_message() {
    let app = TestApp::with_llm(FakeLlm::failing()).await;
    let (token, _) = app.register("sam@studzy.test", "Sam").await;
    let session = new_session(&app, &token, None).await;

    let (status, events) = send_message(&app, &token, &session, "Explain mitosis").await;
    assert_eq!(status, StatusCode::OK);
    let (name, data) = events.last().unwrap();
    assert_eq!(name, "error");
    assert!(data["message"].as_str().unwrap().contains("503"));

    let (_, messages) = app
        .call("GET", &format!("/api/chat/sessions/{}/messages", session), Some(&token), None)
        .await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn test_empty_reply_is_an_error() {
    let app = TestApp::with_llm(FakeLlm::replying(&["  "])).await;
    let (token, _) = app.register("sam@studzy.test", "Sam").await;
    let session = new_session(&app, &token, None).await;

    let (_, events) = send_message(&app, &token, &session, "Hello").await;
    assert_eq!(events.last().unwrap().0, "error");

    let (_, messages) = app
        .call("GET", &format!("/api/chat/sessions/{}/messages", session), Some(&token), None)
        .await;
    assert_eq!(messages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sessions_are_private() {
    let app = TestApp::new().await;
    let (owner, _) = app.register("sam@studzy.test", "Sam").await;
    let (other, _) = app.register("kim@studzy.test", "Kim").await;
    let session = new_session(&app, &owner, None).await;
    let uri = format!("/api/chat/sessions/{}", session);

    let (status, _) = app.call("GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_message(&app, &other, &session, "hi").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("PATCH", &uri, Some(&owner), Some(json!({ "title": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .call("PATCH", &uri, Some(&owner), Some(json!({ "title": "Cell biology" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Cell biology");

    let (status, _) = app.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_validation() {
    let app = TestApp::new().await;
    let (token, _) = app.register("sam@studzy.test", "Sam").await;
    let session = new_session(&app, &token, None).await;

    let (status, events) = send_message(&app, &token, &session, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(events.is_empty());

    let long = "a".repeat(8001);
    let (status, _) = send_message(&app, &token, &session, &long).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("POST", "/api/chat/sessions", Some(&token), Some(json!({ "course_id": "missing" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
