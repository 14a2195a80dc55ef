//! Retrieval-augmented generation
//!
//! Ingestion: resource text → overlapping chunks → embeddings → rows in
//! `study_material_embeddings`.
//!
//! Query: embed the question, score every candidate chunk by cosine
//! similarity, keep those at or above the threshold, take the top-k and render
//! them as a context block for the system prompt.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use studzy_common::db::Resource;
use studzy_common::events::StudyEvent;
use tracing::{error, info, warn};

use crate::db::embeddings::{self, EmbeddingWithSource};
use crate::db::resources::{self as resource_db, IngestStatus};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Inputs per embedding request
pub const EMBED_BATCH_SIZE: usize = 64;

/// A chunk selected as context for a query
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMatch {
    pub resource_id: String,
    pub resource_title: String,
    pub course_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub similarity: f32,
}

fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.replace("\r\n", "\n").split('\n') {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&words.join(" "));
        blank_run = 0;
    }

    out
}

/// Position just after the best break in `chars[from..to]`, if any
///
/// Paragraph breaks beat sentence ends, which beat line breaks, which beat
/// plain spaces.
fn find_break(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let window = &chars[from..to];

    let paragraph = window
        .windows(2)
        .rposition(|w| w[0] == '\n' && w[1] == '\n')
        .map(|i| from + i + 2);
    if paragraph.is_some() {
        return paragraph;
    }

    let sentence = window
        .windows(2)
        .rposition(|w| matches!(w[0], '.' | '?' | '!') && w[1].is_whitespace())
        .map(|i| from + i + 1);
    if sentence.is_some() {
        return sentence;
    }

    window
        .iter()
        .rposition(|c| c.is_whitespace())
        .map(|i| from + i + 1)
}

/// Split text into chunks of at most `size` characters, consecutive chunks
/// sharing up to `overlap` characters
///
/// Breaks prefer paragraph, then sentence, then word boundaries in the second
/// half of each window. Operates on chars, so multi-byte text is never split
/// mid-character.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);

    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + size).min(len);
        if end < len {
            if let Some(brk) = find_break(&chars, start + size / 2, end) {
                end = brk;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= len {
            break;
        }
        start = if end - start > overlap { end - overlap } else { end };
    }

    chunks
}

/// Cosine similarity; `None` for mismatched dimensions or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Rank candidates against a query vector: threshold, sort descending, top-k
pub fn rank_matches(
    candidates: Vec<EmbeddingWithSource>,
    query: &[f32],
    threshold: f32,
    count: usize,
) -> Vec<DocumentMatch> {
    let mut matches: Vec<DocumentMatch> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let vector = embeddings::decode_vector(&candidate.row.embedding)?;
            let similarity = cosine_similarity(query, &vector)?;
            (similarity >= threshold).then(|| DocumentMatch {
                resource_id: candidate.row.resource_id,
                resource_title: candidate.resource_title,
                course_id: candidate.row.course_id,
                chunk_index: candidate.row.chunk_index,
                content: candidate.row.content,
                similarity,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    matches.truncate(count);
    matches
}

/// Similarity search over stored chunks
pub async fn match_documents(
    pool: &SqlitePool,
    query: &[f32],
    threshold: f32,
    count: usize,
    course_id: Option<&str>,
) -> ApiResult<Vec<DocumentMatch>> {
    let candidates = embeddings::load_candidates(pool, course_id).await?;
    Ok(rank_matches(candidates, query, threshold, count))
}

/// Render matches as numbered source blocks, capped at `max_chars`
pub fn build_context(matches: &[DocumentMatch], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for (i, m) in matches.iter().enumerate() {
        let block = format!("[{}] {}\n{}\n\n", i + 1, m.resource_title, m.content);
        let block_chars = block.chars().count();

        if used + block_chars > max_chars {
            if context.is_empty() {
                // Always keep something from the best match
                context = block.chars().take(max_chars).collect();
            }
            break;
        }

        context.push_str(&block);
        used += block_chars;
    }

    context.trim_end().to_string()
}

const ASSISTANT_INSTRUCTIONS: &str = "You are Studzy, a study assistant for university students. \
Explain concepts clearly, work through problems step by step, and keep answers focused on \
what the student asked. If you are not sure about something, say so.";

/// System prompt with the retrieved context appended when present
pub fn system_prompt(context: &str, course_title: Option<&str>) -> String {
    let mut prompt = ASSISTANT_INSTRUCTIONS.to_string();

    if let Some(title) = course_title {
        prompt.push_str(&format!("\n\nThe student is studying the course \"{}\".", title));
    }

    if !context.is_empty() {
        prompt.push_str(
            "\n\nUse the following excerpts from the course materials when they are relevant. \
Cite them by their bracketed number. If they do not cover the question, answer from general \
knowledge and say that the materials did not cover it.\n\n--- COURSE MATERIALS ---\n",
        );
        prompt.push_str(context);
        prompt.push_str("\n--- END COURSE MATERIALS ---");
    }

    prompt
}

/// Chunk, embed and store a resource's text, replacing any earlier chunks
///
/// Returns the number of stored chunks. Empty text marks the resource as
/// skipped. A failed run leaves the resource with no chunks.
pub async fn ingest_resource(state: &AppState, resource: &Resource, text: &str) -> ApiResult<usize> {
    let rag = &state.config.rag;
    let chunks = chunk_text(text, rag.chunk_size, rag.chunk_overlap);

    if chunks.is_empty() {
        embeddings::delete_for_resource(&state.db, &resource.id).await?;
        resource_db::set_ingest_status(&state.db, &resource.id, IngestStatus::Skipped).await?;
        info!(resource_id = %resource.id, "No text to ingest, marked skipped");
        return Ok(0);
    }

    let result = embed_and_store(state, resource, chunks).await;

    match result {
        Ok(count) => {
            resource_db::set_ingest_status(&state.db, &resource.id, IngestStatus::Ingested)
                .await?;
            info!(resource_id = %resource.id, chunks = count, "Resource ingested");
            state.event_bus.emit_lossy(StudyEvent::ResourceIngested {
                resource_id: resource.id.clone(),
                chunk_count: count,
                timestamp: Utc::now(),
            });
            Ok(count)
        }
        Err(e) => {
            // A failed resource keeps no chunks
            if let Err(delete_err) = embeddings::delete_for_resource(&state.db, &resource.id).await {
                warn!(resource_id = %resource.id, "Failed to drop stale chunks: {}", delete_err);
            }
            if let Err(status_err) =
                resource_db::set_ingest_status(&state.db, &resource.id, IngestStatus::Failed).await
            {
                warn!(resource_id = %resource.id, "Failed to record ingest failure: {}", status_err);
            }
            state.event_bus.emit_lossy(StudyEvent::IngestFailed {
                resource_id: resource.id.clone(),
                message: e.to_string(),
                timestamp: Utc::now(),
            });
            Err(e)
        }
    }
}

async fn embed_and_store(
    state: &AppState,
    resource: &Resource,
    chunks: Vec<String>,
) -> ApiResult<usize> {
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let embedded = state.llm.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(ApiError::Upstream(format!(
                "embedding count mismatch: sent {}, got {}",
                batch.len(),
                embedded.len()
            )));
        }
        vectors.extend(embedded);
    }

    let rows: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
    let count =
        embeddings::replace_for_resource(&state.db, &resource.id, &resource.course_id, &rows)
            .await?;
    Ok(count)
}

/// Fire-and-forget ingestion after an upload
///
/// Failures are logged and broadcast as `IngestFailed`; nothing is retried.
pub fn spawn_ingestion(state: AppState, resource: Resource, text: String) {
    tokio::spawn(async move {
        if let Err(e) = ingest_resource(&state, &resource, &text).await {
            error!(resource_id = %resource.id, "Background ingestion failed: {}", e);
        }
    });
}
