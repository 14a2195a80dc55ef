//! Domain logic shared by the HTTP handlers

pub mod chat;
pub mod llm;
pub mod quiz;
pub mod rag;
pub mod streak;
