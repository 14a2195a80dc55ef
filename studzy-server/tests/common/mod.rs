//! Shared helpers for studzy-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use studzy_common::config::StudzyConfig;
use studzy_common::db::init_database;
use studzy_server::services::llm::{LlmError, LlmProvider, PromptMessage, TokenStream};
use studzy_server::storage::ObjectStore;
use studzy_server::{build_router, AppState};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const EMBED_DIMS: usize = 16;

/// Deterministic bag-of-words embedding: texts sharing words point the same way
pub fn fake_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIMS];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        vector[hash % EMBED_DIMS] += 1.0;
    }
    vector[EMBED_DIMS - 1] += 0.01;
    vector
}

/// LLM stand-in with canned replies that records every prompt it receives
#[derive(Default)]
pub struct FakeLlm {
    pub reply: Vec<String>,
    pub fail_chat: bool,
    /// Toggled mid-test to make later embedding calls fail
    pub fail_embed: AtomicBool,
    pub prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl FakeLlm {
    pub fn replying(tokens: &[&str]) -> Self {
        Self {
            reply: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Default::default()
        }
    }

    pub fn fail_embeddings(&self) {
        self.fail_embed.store(true, Ordering::SeqCst);
    }

    pub fn last_prompt(&self) -> Option<Vec<PromptMessage>> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn id(&self) -> &str {
        "fake"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(LlmError::Status {
                status: 503,
                body: "embeddings unavailable".to_string(),
            });
        }
        Ok(inputs.iter().map(|t| fake_embedding(t)).collect())
    }

    async fn chat_stream(&self, messages: Vec<PromptMessage>) -> Result<TokenStream, LlmError> {
        self.prompts.lock().unwrap().push(messages);
        if self.fail_chat {
            return Err(LlmError::Status {
                status: 503,
                body: "model overloaded".to_string(),
            });
        }
        let tokens: Vec<Result<String, LlmError>> = self.reply.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(tokens)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub llm: Arc<FakeLlm>,
    _dir: TempDir,
}

pub fn test_config() -> StudzyConfig {
    let mut config = StudzyConfig::default();
    config.server.max_upload_bytes = 4096;
    config.rag.chunk_size = 200;
    config.rag.chunk_overlap = 40;
    config.rag.match_threshold = 0.1;
    config
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_llm(FakeLlm::replying(&["Photosynthesis", " turns light", " into sugar."])).await
    }

    pub async fn with_llm(llm: FakeLlm) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("studzy.db")).await.unwrap();
        let storage = ObjectStore::new(dir.path().join("storage"));
        let llm = Arc::new(llm);

        let state = AppState::new(pool, llm.clone(), storage, test_config());
        let router = build_router(state.clone());

        Self {
            router,
            state,
            llm,
            _dir: dir,
        }
    }

    /// Send a request and return status plus raw body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        (status, bytes.to_vec())
    }

    /// JSON request with optional bearer token; empty bodies become `null`
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Register a profile; returns (token, user id)
    pub async fn register(&self, email: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": "password123", "full_name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["profile"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// First registration is the admin; returns the admin token
    pub async fn admin(&self) -> String {
        self.register("admin@studzy.test", "Ada Admin").await.0
    }

    pub async fn create_course(&self, admin_token: &str, code: &str, title: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/admin/courses",
                Some(admin_token),
                Some(json!({ "code": code, "title": title, "level": 100, "semester": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create course failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn create_question(&self, admin_token: &str, course_id: &str, text: &str, correct: i64) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/admin/questions",
                Some(admin_token),
                Some(json!({
                    "course_id": course_id,
                    "question_text": text,
                    "options": ["A", "B", "C", "D"],
                    "correct_option": correct,
                    "explanation": format!("Explanation for {}", text),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create question failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Multipart upload to the admin resource endpoint
    pub async fn upload(
        &self,
        admin_token: &str,
        course_id: &str,
        title: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "studzy-test-boundary";
        let mut body = Vec::new();
        for (name, value) in [("course_id", course_id), ("title", title)] {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/admin/resources")
            .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, bytes) = self.send(request).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Poll until background ingestion leaves the `pending` state
    pub async fn wait_for_ingestion(&self, token: &str, resource_id: &str) -> String {
        for _ in 0..100 {
            let (_, body) = self
                .call("GET", &format!("/api/resources/{}", resource_id), Some(token), None)
                .await;
            let status = body["ingest_status"].as_str().unwrap_or_default().to_string();
            if status != "pending" {
                return status;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("ingestion of {} did not finish", resource_id);
    }
}
