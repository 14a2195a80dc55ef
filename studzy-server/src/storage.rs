//! Local object storage for uploaded resources
//!
//! Objects live under `<root>/storage/<course_id>/<resource_id>.<ext>`. Keys are
//! generated by the server, never taken from client input, but are still
//! checked so a corrupted row cannot escape the storage root.

use std::path::{Component, Path, PathBuf};
use studzy_common::{Error, Result};
use tokio::fs;
use tracing::{debug, warn};

/// Upload MIME types accepted for resources, with their resource type
pub const ALLOWED_MIME_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("video/mp4", "video"),
    ("video/webm", "video"),
    ("audio/mpeg", "audio"),
    ("audio/wav", "audio"),
    ("text/plain", "document"),
    ("text/markdown", "document"),
];

/// Resource type for an allowed MIME type
pub fn resource_type_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_MIME_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, kind)| *kind)
}

/// MIME type guessed from a file name, for uploads sent without one
pub fn mime_from_filename(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "txt" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        _ => None,
    }
}

/// Whether resources of this MIME type carry text we can embed directly
pub fn is_text_mime(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
}

/// File extension used for stored objects
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "application/pdf" => "pdf",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        "text/markdown" => "md",
        _ => "txt",
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage key for a new resource object
    pub fn key_for(course_id: &str, resource_id: &str, mime_type: &str) -> String {
        format!("{}/{}.{}", course_id, resource_id, extension_for(mime_type))
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::InvalidInput(format!("Invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(key = %key, size = bytes.len(), "Stored object");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an object; a missing object is not an error
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = %key, "Object already absent on delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
