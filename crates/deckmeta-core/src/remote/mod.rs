//! Remote document service abstraction.
//!
//! The pipeline talks to one remote service for two things: file upload
//! with server-side processing, and schema-constrained generation over an
//! uploaded file. This module is the seam; `gemini` is the production
//! backend.

pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// The service's reference to an uploaded artifact.
///
/// Created by the upload call, polled by `name`, consumed by the
/// generation call. The remote side owns its lifecycle; this pipeline
/// never deletes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Opaque server-side name, used for state polls
    pub name: String,
    /// URI referenced by generation requests
    pub uri: String,
    /// Content type as resolved by the service
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Server-side processing state of an uploaded file.
///
/// `Processing` is the only non-terminal state, `Failed` is terminal
/// failure, and anything else counts as terminal success.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Remote upload + generation API consumed by the pipeline.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Upload file bytes. Returns the initial handle; the file may still
    /// be processing server-side.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteFile>;

    /// Fetch the current processing state of an uploaded file.
    async fn get_state(&self, name: &str) -> Result<FileState>;

    /// Issue a schema-constrained generation request over an uploaded
    /// file. Returns the raw response text, expected to be a JSON
    /// document conforming to `response_schema`.
    async fn generate(
        &self,
        model: &str,
        instruction: &str,
        file: &RemoteFile,
        response_schema: &serde_json::Value,
    ) -> Result<String>;
}
