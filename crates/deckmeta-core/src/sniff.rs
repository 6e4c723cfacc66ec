//! MIME detection from file bytes.

use std::path::Path;

use crate::error::{Error, Result};

pub const POWERPOINT_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Detect the MIME type of a file from its content.
///
/// Sniffs magic bytes rather than trusting the file extension, so a
/// mislabeled extension still resolves to the real type. Unrecognized
/// content is an error; the pipeline never guesses.
pub fn detect_mime(bytes: &[u8], path: &Path) -> Result<&'static str> {
    match infer::get(bytes) {
        Some(kind) => {
            tracing::debug!(path = %path.display(), mime = kind.mime_type(), "Detected file type");
            Ok(kind.mime_type())
        }
        None => Err(Error::UnsupportedType {
            path: path.to_path_buf(),
        }),
    }
}
