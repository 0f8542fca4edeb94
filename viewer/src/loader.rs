//! Document loading
//!
//! A rejected document never replaces the one already loaded.

use std::path::Path;

use shared_types::Document;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Holds the active document
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    document: Document,
    source: Option<String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-parsed document, such as a bundled sample.
    pub fn with_document(document: Document, source: impl Into<String>) -> Self {
        Self {
            document,
            source: Some(source.into()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Name of the input the active document came from
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Parse `raw` and make it active. On failure the previous document stays.
    pub fn load_str(&mut self, raw: &str, source: &str) -> Result<&Document> {
        match serde_json::from_str::<Document>(raw) {
            Ok(document) => {
                tracing::info!(
                    source,
                    conversations = document.len(),
                    "loaded transcript document"
                );
                self.document = document;
                self.source = Some(source.to_string());
                Ok(&self.document)
            }
            Err(err) => {
                tracing::warn!(
                    source,
                    error = %err,
                    "rejected transcript document; keeping previous"
                );
                Err(ViewerError::InvalidDocument(err))
            }
        }
    }

    pub fn load_path(&mut self, path: &Path) -> Result<&Document> {
        let raw = std::fs::read_to_string(path).map_err(|source| ViewerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load_str(&raw, &path.display().to_string())
    }
}
