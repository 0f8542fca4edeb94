//! Document sink: pretty JSON written through a temp file and renamed into place.

use std::fs;
use std::path::Path;

use shared_types::Document;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to encode document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.display().to_string(),
        source,
    }
}

pub fn write_document(document: &Document, path: &Path) -> Result<(), SinkError> {
    let content = serde_json::to_string_pretty(document)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|e| io_error(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| io_error(path, e))?;

    tracing::info!(
        path = %path.display(),
        conversations = document.len(),
        "wrote transcript document"
    );
    Ok(())
}

pub fn read_document(path: &Path) -> Result<Document, SinkError> {
    let raw = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("out.json");
        write_document(&Document::default(), &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"conversations\": []"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_read_missing_file_reports_path() {
        let err = read_document(Path::new("/nonexistent/out.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/out.json"));
    }
}
