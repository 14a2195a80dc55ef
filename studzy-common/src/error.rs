//! Error type shared by the Studzy crates
//!
//! Query, storage and config helpers return [`Result`]; the server maps each
//! variant onto an HTTP status.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure in the data root or object store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or inconsistent configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// A row or stored object that should exist does not
    #[error("Not found: {0}")]
    NotFound(String),

    /// Value rejected before it reached storage
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert() {
        fn open_missing() -> Result<()> {
            std::fs::read("/nonexistent/studzy/file")?;
            Ok(())
        }
        assert!(matches!(open_missing(), Err(Error::Io(_))));
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::Config("rag.chunk_size must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: rag.chunk_size must be positive"
        );
    }
}
