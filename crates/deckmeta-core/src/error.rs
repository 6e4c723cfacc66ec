//! Error types for the ingestion pipeline.
//!
//! Every variant here aborts processing of the current document except
//! where noted; page-slicing failures never surface as a variant because
//! the slicer falls back to the unsliced document instead of failing.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while extracting metadata from a document.
#[derive(Debug, Error)]
pub enum Error {
    /// MIME sniffing could not determine a concrete content type.
    /// The pipeline fails closed rather than guessing.
    #[error("unsupported file type: {path}")]
    UnsupportedType { path: PathBuf },

    /// Office-to-PDF conversion failed. Fatal for the document: a failed
    /// conversion yields no usable artifact at all.
    #[error("office conversion failed: {0}")]
    Conversion(String),

    /// The remote service reported a terminal failure state for an upload.
    #[error("remote processing failed for file '{name}'")]
    RemoteProcessingFailed { name: String },

    /// The generation service is temporarily unavailable. Retried up to
    /// the configured budget, then escalated.
    #[error("service temporarily unavailable ({status}): {message}")]
    TransientService { status: u16, message: String },

    /// The generation response was not valid JSON matching the metadata
    /// schema. Carries the offending payload for diagnosis.
    #[error("metadata response failed schema validation: {reason}; payload: {payload}")]
    SchemaValidation { reason: String, payload: String },

    /// The upload never reached a terminal state within the configured
    /// maximum wait. Only raised when `max_poll_wait` is set.
    #[error("upload did not reach a terminal state within {waited:?}")]
    PollTimeout { waited: Duration },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the retry loop in the metadata extractor may retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientService { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
