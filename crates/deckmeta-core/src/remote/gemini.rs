//! Google Gemini API backend.
//!
//! Uses reqwest against the Files API (multipart media upload + state
//! polls) and `generateContent` with a response schema for deterministic
//! JSON output.

use async_trait::async_trait;
use reqwest::{multipart, StatusCode};
use serde::{Deserialize, Serialize};

use super::{DocumentService, FileState, RemoteFile};
use crate::error::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client for file upload and schema-constrained generation.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GEMINI_API_URL)
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Map a 503 to the retryable error class; every other non-success
    /// status is fatal on first occurrence.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::TransientService {
                status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                message,
            });
        }

        Ok(response.error_for_status()?)
    }
}

#[async_trait]
impl DocumentService for GeminiClient {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteFile> {
        let metadata = serde_json::json!({
            "file": { "display_name": display_name }
        });

        let mut file_part = multipart::Part::bytes(bytes).file_name(display_name.to_string());
        if let Some(mime) = mime_type {
            file_part = file_part.mime_str(mime)?;
        }

        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part("file", file_part);

        let response = self
            .client
            .post(format!(
                "{}/upload/v1beta/files?key={}",
                self.base_url, self.api_key
            ))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(name = %uploaded.file.name, "File uploaded");

        Ok(uploaded.file)
    }

    async fn get_state(&self, name: &str) -> Result<FileState> {
        let response = self
            .client
            .get(format!(
                "{}/v1beta/{}?key={}",
                self.base_url, name, self.api_key
            ))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let status: FileStatusResponse = response.json().await?;
        Ok(status.state)
    }

    async fn generate(
        &self,
        model: &str,
        instruction: &str,
        file: &RemoteFile,
        response_schema: &serde_json::Value,
    ) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part {
                        text: Some(instruction),
                        file_data: None,
                    },
                    Part {
                        text: None,
                        file_data: Some(FileData {
                            file_uri: &file.uri,
                            mime_type: file.mime_type.as_deref(),
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
                response_schema,
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url, model, self.api_key
            ))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    state: FileState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    file_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    response_mime_type: &'a str,
    response_schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}
