//! Integration tests for the studzy-server HTTP API
//!
//! Covers authentication, the course catalogue, resource upload and delivery,
//! bookmarks, discussions, activity, progress, presence and admin endpoints.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use studzy_common::events::StudyEvent;

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = TestApp::new().await;
    let (status, body) = app.call("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "studzy-server");
    assert!(body["version"].is_string());
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_first_registration_becomes_admin() {
    let app = TestApp::new().await;

    let (admin_token, _) = app.register("First@Studzy.test", "First User").await;
    let (student_token, _) = app.register("second@studzy.test", "Second User").await;

    let (_, me) = app.call("GET", "/api/auth/me", Some(&admin_token), None).await;
    assert_eq!(me["role"], "admin");
    assert_eq!(me["email"], "first@studzy.test");
    assert!(me.get("password_hash").is_none());

    let (_, me) = app.call("GET", "/api/auth/me", Some(&student_token), None).await;
    assert_eq!(me["role"], "student");
}

#[tokio::test]
async fn test_registration_validation() {
    let app = TestApp::new().await;
    app.register("taken@studzy.test", "Taken").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "TAKEN@studzy.test", "password": "password123", "full_name": "Dup" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "short@studzy.test", "password": "short", "full_name": "Short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "password123", "full_name": "X" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_logout_cycle() {
    let app = TestApp::new().await;
    app.register("ada@studzy.test", "Ada").await;

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@studzy.test", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ADA@studzy.test", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = app.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let (status, body) = app.call("GET", "/api/courses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app.call("GET", "/api/courses", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Courses
// =============================================================================

#[tokio::test]
async fn test_course_admin_and_listing() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (student, _) = app.register("student@studzy.test", "Sam").await;

    let (status, _) = app
        .call(
            "POST",
            "/api/admin/courses",
            Some(&student),
            Some(json!({ "code": "BIO101", "title": "Biology" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let bio = app.create_course(&admin, "bio101", "Introductory Biology").await;
    app.create_course(&admin, "CHM101", "General Chemistry").await;

    let (status, _) = app
        .call(
            "POST",
            "/api/admin/courses",
            Some(&admin),
            Some(json!({ "code": "BIO101", "title": "Duplicate" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.call("GET", "/api/courses?search=bio", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["courses"][0]["code"], "BIO101");
    assert_eq!(body["page"], 1);

    let (_, body) = app.call("GET", "/api/courses?page=9", Some(&student), None).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);

    let (status, body) = app
        .call("GET", &format!("/api/courses/{}", bio), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resource_count"], 0);
    assert_eq!(body["question_count"], 0);

    let (status, _) = app
        .call("DELETE", &format!("/api/admin/courses/{}", bio), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call("GET", &format!("/api/courses/{}", bio), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Resources
// =============================================================================

const NOTES: &str = "Photosynthesis converts light energy into chemical energy.\n\n\
Chlorophyll in the chloroplast absorbs light. The light reactions split water \
and release oxygen. The Calvin cycle fixes carbon dioxide into sugar.";

#[tokio::test]
async fn test_text_upload_is_stored_and_ingested() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;

    let mut events = app.state.event_bus.subscribe();

    let (status, body) = app
        .upload(&admin, &course, "Week 1 notes", "week1.txt", "text/plain", NOTES.as_bytes())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["resource_type"], "document");
    assert_eq!(body["size_bytes"], NOTES.len());
    let resource_id = body["id"].as_str().unwrap().to_string();

    assert_eq!(app.wait_for_ingestion(&admin, &resource_id).await, "ingested");
    match events.recv().await.unwrap() {
        StudyEvent::ResourceIngested {
            resource_id: id,
            chunk_count,
            ..
        } => {
            assert_eq!(id, resource_id);
            assert!(chunk_count >= 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let request = axum::http::Request::builder()
        .uri(format!("/api/resources/{}/file", resource_id))
        .header("Authorization", format!("Bearer {}", admin))
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, NOTES.as_bytes());

    let (_, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(stats["resources"], 1);
    assert!(stats["embeddings"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn test_upload_validation() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;

    let (status, _) = app
        .upload(&admin, &course, "Tool", "setup.exe", "application/x-msdownload", b"MZ")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .upload(&admin, &course, "Empty", "empty.txt", "text/plain", b"")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let big = vec![b'a'; 5000];
    let (status, body) = app
        .upload(&admin, &course, "Big", "big.txt", "text/plain", &big)
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    let (status, _) = app
        .upload(&admin, "no-such-course", "Notes", "n.txt", "text/plain", b"hello")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(stats["resources"], 0);
}

#[tokio::test]
async fn test_pdf_waits_for_supplied_text() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;

    let (status, body) = app
        .upload(&admin, &course, "Slides", "slides.pdf", "application/pdf", b"%PDF-1.4 fake")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ingest_status"], "pending");
    let id = body["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/resources/{}/ingest", id);
    let (status, _) = app.call("POST", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("POST", &uri, Some(&admin), Some(json!({ "text": NOTES })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["chunk_count"].as_u64().unwrap() >= 1);

    let (_, resource) = app
        .call("GET", &format!("/api/resources/{}", id), Some(&admin), None)
        .await;
    assert_eq!(resource["ingest_status"], "ingested");

    let (status, _) = app
        .call("DELETE", &format!("/api/admin/resources/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(stats["embeddings"], 0);
}

#[tokio::test]
async fn test_failed_reingest_drops_old_chunks() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;
    let (_, body) = app
        .upload(&admin, &course, "Slides", "slides.pdf", "application/pdf", b"%PDF-1.4 fake")
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/resources/{}/ingest", id);
    let (status, _) = app
        .call("POST", &uri, Some(&admin), Some(json!({ "text": NOTES })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert!(stats["embeddings"].as_i64().unwrap() >= 1);

    app.llm.fail_embeddings();
    let (status, body) = app
        .call("POST", &uri, Some(&admin), Some(json!({ "text": NOTES })))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");

    let (_, resource) = app
        .call("GET", &format!("/api/resources/{}", id), Some(&admin), None)
        .await;
    assert_eq!(resource["ingest_status"], "failed");
    let (_, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(stats["embeddings"], 0);
}

#[tokio::test]
async fn test_view_count_bookmarks_and_listing() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (student, _) = app.register("student@studzy.test", "Sam").await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;
    let (_, body) = app
        .upload(&admin, &course, "Lecture", "lecture.mp4", "video/mp4", b"\x00\x00\x00\x18ftypmp42")
        .await;
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["ingest_status"], "pending");

    let (_, list) = app
        .call("GET", &format!("/api/courses/{}/resources?type=video", course), Some(&student), None)
        .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, list) = app
        .call("GET", &format!("/api/courses/{}/resources?type=pdf", course), Some(&student), None)
        .await;
    assert!(list.as_array().unwrap().is_empty());

    for expected in 1..=3 {
        let (status, body) = app
            .call("POST", &format!("/api/resources/{}/view", id), Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view_count"], expected);
    }

    let toggle = json!({ "resource_id": id });
    let (_, body) = app.call("POST", "/api/bookmarks/toggle", Some(&student), Some(toggle.clone())).await;
    assert_eq!(body["bookmarked"], true);

    let (_, list) = app.call("GET", "/api/bookmarks", Some(&student), None).await;
    assert_eq!(list[0]["title"], "Lecture");

    let (_, body) = app.call("POST", "/api/bookmarks/toggle", Some(&student), Some(toggle)).await;
    assert_eq!(body["bookmarked"], false);

    let (_, body) = app
        .call("GET", &format!("/api/bookmarks/{}", id), Some(&student), None)
        .await;
    assert_eq!(body["bookmarked"], false);

    let (status, _) = app
        .call("POST", "/api/bookmarks/toggle", Some(&student), Some(json!({ "resource_id": "missing" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Progress and activity
// =============================================================================

#[tokio::test]
async fn test_progress_is_clamped_and_completion_sticky() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;
    let (_, a) = app.upload(&admin, &course, "A", "a.mp3", "audio/mpeg", b"ID3").await;
    app.upload(&admin, &course, "B", "b.mp3", "audio/mpeg", b"ID3").await;
    let a = a["id"].as_str().unwrap().to_string();

    let uri = format!("/api/progress/{}", a);
    let (_, body) = app
        .call("PUT", &uri, Some(&admin), Some(json!({ "progress_percent": 140.0, "position_seconds": 95.5 })))
        .await;
    assert_eq!(body["progress_percent"], 100.0);
    assert_eq!(body["completed"], true);

    let (_, body) = app
        .call("PUT", &uri, Some(&admin), Some(json!({ "progress_percent": 20.0 })))
        .await;
    assert_eq!(body["completed"], true);
    assert_eq!(body["position_seconds"], 95.5);

    let (_, body) = app
        .call("GET", &format!("/api/progress/courses/{}", course), Some(&admin), None)
        .await;
    assert_eq!(body["completed"], 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["percentage"], 50.0);
}

#[tokio::test]
async fn test_study_time_and_summary() {
    let app = TestApp::new().await;
    let (token, _) = app.register("ada@studzy.test", "Ada").await;

    let (status, _) = app
        .call("POST", "/api/activity/study-time", Some(&token), Some(json!({ "seconds": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call("POST", "/api/activity/study-time", Some(&token), Some(json!({ "seconds": 3601 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.call("POST", "/api/activity/study-time", Some(&token), Some(json!({ "seconds": 600 })))
        .await;
    let (status, body) = app
        .call("POST", "/api/activity/study-time", Some(&token), Some(json!({ "seconds": 300 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["today_seconds"], 900);

    let (status, summary) = app.call("GET", "/api/activity/summary", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["streak"]["current"], 1);
    assert_eq!(summary["streak"]["longest"], 1);
    assert_eq!(summary["today_seconds"], 900);
    assert_eq!(summary["total_seconds"], 900);
    assert_eq!(summary["week_counts"][0]["kind"], "study");
    assert_eq!(summary["week_counts"][0]["count"], 1);
}

// =============================================================================
// Discussions
// =============================================================================

#[tokio::test]
async fn test_discussion_threads_and_replies() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (sam, _) = app.register("sam@studzy.test", "Sam").await;
    let (kim, _) = app.register("kim@studzy.test", "Kim").await;
    let bio = app.create_course(&admin, "BIO101", "Biology").await;
    let chem = app.create_course(&admin, "CHM101", "Chemistry").await;

    let uri = format!("/api/courses/{}/discussions", bio);
    let (status, _) = app
        .call("POST", &uri, Some(&sam), Some(json!({ "content": "no title" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, thread) = app
        .call("POST", &uri, Some(&sam), Some(json!({ "title": "Exam tips", "content": "Any advice?" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let thread_id = thread["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call("POST", &uri, Some(&kim), Some(json!({ "content": "Past papers!", "parent_id": thread_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/courses/{}/discussions", chem),
            Some(&kim),
            Some(json!({ "content": "wrong course", "parent_id": thread_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, threads) = app.call("GET", &uri, Some(&kim), None).await;
    assert_eq!(threads[0]["reply_count"], 1);
    assert_eq!(threads[0]["author_name"], "Sam");

    let (_, full) = app
        .call("GET", &format!("/api/discussions/{}", thread_id), Some(&kim), None)
        .await;
    assert_eq!(full["title"], "Exam tips");
    assert_eq!(full["replies"][0]["author_name"], "Kim");

    let delete_uri = format!("/api/discussions/{}", thread_id);
    let (status, _) = app.call("DELETE", &delete_uri, Some(&kim), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("DELETE", &delete_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, threads) = app.call("GET", &uri, Some(&kim), None).await;
    assert!(threads.as_array().unwrap().is_empty());
}

// =============================================================================
// Presence
// =============================================================================

#[tokio::test]
async fn test_presence_transitions_emit_events() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let course = app.create_course(&admin, "BIO101", "Biology").await;
    let (token, user_id) = app.register("sam@studzy.test", "Sam").await;

    let mut events = app.state.event_bus.subscribe();
    let beat = json!({ "course_id": course });

    let (status, _) = app
        .call("POST", "/api/presence/heartbeat", Some(&token), Some(beat.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    match events.try_recv().unwrap() {
        StudyEvent::PresenceChanged { user_id: id, online, .. } => {
            assert_eq!(id, user_id);
            assert!(online);
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Already online: no second event
    app.call("POST", "/api/presence/heartbeat", Some(&token), Some(beat)).await;
    assert!(events.try_recv().is_err());

    let (_, online) = app
        .call("GET", &format!("/api/presence?course_id={}", course), Some(&admin), None)
        .await;
    assert_eq!(online[0]["full_name"], "Sam");

    let (status, _) = app.call("POST", "/api/presence/leave", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    match events.try_recv().unwrap() {
        StudyEvent::PresenceChanged { online, .. } => assert!(!online),
        other => panic!("unexpected event {:?}", other),
    }

    let (_, online) = app.call("GET", "/api/presence", Some(&admin), None).await;
    assert!(online.as_array().unwrap().is_empty());
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_role_changes() {
    let app = TestApp::new().await;
    let (admin, admin_id) = app.register("admin@studzy.test", "Ada").await;
    let (student, student_id) = app.register("sam@studzy.test", "Sam").await;

    let (status, _) = app
        .call("PUT", &format!("/api/admin/users/{}/role", admin_id), Some(&admin), Some(json!({ "role": "student" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call("GET", "/api/admin/stats", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("PUT", &format!("/api/admin/users/{}/role", student_id), Some(&admin), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let (status, body) = app.call("GET", "/api/admin/stats", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profiles"], 2);

    let (status, _) = app
        .call("PUT", "/api/admin/users/nobody/role", Some(&admin), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
