//! Temporary file bookkeeping for generated intermediates.
//!
//! Intermediate files are colocated with the source document and named
//! `<basename>_<suffix>.<ext>`, so cleanup only ever sees files the
//! pipeline itself produced. Original source files are never deleted.

use std::path::{Path, PathBuf};

/// Location and display label for a generated intermediate file.
#[derive(Debug, Clone)]
pub struct TempFileInfo {
    pub path: PathBuf,
    pub display_name: String,
}

/// Derive the intermediate file path for a source document.
pub fn temp_file_path(original: &Path, suffix: &str, extension: &str) -> TempFileInfo {
    let base = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let file_name = format!("{}_{}.{}", base, suffix, extension);
    let path = match original.parent() {
        Some(dir) => dir.join(&file_name),
        None => PathBuf::from(&file_name),
    };

    TempFileInfo {
        path,
        display_name: file_name,
    }
}

/// Delete a generated intermediate file if it still exists.
///
/// No-op when preprocessing produced no intermediate. Tolerates a file
/// already removed by another actor.
pub fn cleanup_temp_file(path: Option<&Path>) {
    let Some(path) = path else { return };

    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Temporary file cleaned up"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_colocated_with_source() {
        let info = temp_file_path(Path::new("/data/decks/budget 2024.pptx"), "converted_sliced", "pdf");

        assert_eq!(
            info.path,
            PathBuf::from("/data/decks/budget 2024_converted_sliced.pdf")
        );
        assert_eq!(info.display_name, "budget 2024_converted_sliced.pdf");
    }

    #[test]
    fn test_cleanup_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_sliced.pdf");
        std::fs::write(&path, b"bytes").unwrap();

        cleanup_temp_file(Some(&path));

        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("already_gone.pdf");

        // Must not panic or error
        cleanup_temp_file(Some(&path));
    }

    #[test]
    fn test_cleanup_none_is_noop() {
        cleanup_temp_file(None);
    }
}
