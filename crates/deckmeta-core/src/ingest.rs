//! The ingestion pipeline: sniff, preprocess, upload, poll, extract.
//!
//! Per-document flow is strictly sequential: detect the content type,
//! dispatch to a format processor, upload the processed artifact, block
//! until the remote service reports a terminal processing state, then
//! issue one schema-constrained generation call. Any intermediate file is
//! removed whether the span succeeds or fails.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::convert::OfficeConverter;
use crate::error::{Error, Result};
use crate::processor::{ProcessedFile, ProcessorRegistry};
use crate::remote::{DocumentService, FileState, RemoteFile};
use crate::sniff;
use crate::temp;

const EXTRACT_INSTRUCTION: &str = "Extract metadata from this file.";

/// Structured metadata extracted from a document.
///
/// Only ever constructed by validating the raw generation response;
/// a response that does not satisfy the schema is rejected, never coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title, e.g. from the first page
    pub title: String,
    /// Author or issuing agency
    #[serde(default)]
    pub agency: Option<String>,
    /// Publication year
    #[serde(default)]
    pub year: Option<i32>,
    /// Topics covered by the document
    pub topics: Vec<String>,
}

/// Response schema sent with the generation request.
pub fn metadata_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "The title of the document, e.g. from the first page."
            },
            "agency": {
                "type": "STRING",
                "description": "The author or name of the agency.",
                "nullable": true
            },
            "year": {
                "type": "NUMBER",
                "description": "The year of the document.",
                "nullable": true
            },
            "topics": {
                "type": "ARRAY",
                "description": "The topics of the document.",
                "items": {
                    "type": "STRING",
                    "description": "A topic of the document."
                }
            }
        }
    })
}

/// Validate a raw generation response against the metadata schema.
fn parse_metadata(text: &str) -> Result<Metadata> {
    serde_json::from_str(text).map_err(|e| Error::SchemaValidation {
        reason: e.to_string(),
        payload: text.to_string(),
    })
}

/// Metadata extraction pipeline over a remote document service.
pub struct MetadataPipeline {
    service: Arc<dyn DocumentService>,
    registry: ProcessorRegistry,
    config: PipelineConfig,
}

impl MetadataPipeline {
    pub fn new(
        service: Arc<dyn DocumentService>,
        converter: Arc<dyn OfficeConverter>,
        config: PipelineConfig,
    ) -> Self {
        let registry = ProcessorRegistry::new(converter, &config);
        Self {
            service,
            registry,
            config,
        }
    }

    /// Extract metadata for a single source document.
    ///
    /// Safe to call once per document. Not safe to call concurrently on
    /// the same path from two callers: intermediate file names are
    /// derived deterministically from the source path and would collide.
    pub async fn extract_metadata(&self, path: &Path) -> Result<Metadata> {
        let bytes = std::fs::read(path)?;
        let mime = sniff::detect_mime(&bytes, path)?;

        let processed = self.registry.process_file(path, mime).await?;

        // Cleanup wraps the whole upload+extraction span; it must run on
        // every exit path but never touch the original source file.
        let result = self.upload_and_extract(&processed).await;
        temp::cleanup_temp_file(processed.temp_file_path.as_deref());

        result
    }

    async fn upload_and_extract(&self, processed: &ProcessedFile) -> Result<Metadata> {
        let file = self.upload_and_wait(processed).await?;
        self.request_metadata(&file).await
    }

    /// Upload the processed artifact and block until its processing state
    /// is terminal. Not idempotent: a caller retrying after failure
    /// performs a new upload.
    async fn upload_and_wait(&self, processed: &ProcessedFile) -> Result<RemoteFile> {
        let bytes = std::fs::read(&processed.file_path)?;
        let file = self
            .service
            .upload(bytes, &processed.display_name, processed.mime_type.as_deref())
            .await?;

        tracing::info!(
            name = %file.name,
            display_name = %processed.display_name,
            "File uploaded, waiting for processing"
        );

        let started = Instant::now();
        let mut state = self.service.get_state(&file.name).await?;

        while state == FileState::Processing {
            if let Some(max_wait) = self.config.max_poll_wait {
                if started.elapsed() >= max_wait {
                    return Err(Error::PollTimeout {
                        waited: started.elapsed(),
                    });
                }
            }

            tracing::debug!(
                name = %file.name,
                interval = ?self.config.poll_interval,
                "File still processing, retrying"
            );
            tokio::time::sleep(self.config.poll_interval).await;
            state = self.service.get_state(&file.name).await?;
        }

        if state == FileState::Failed {
            return Err(Error::RemoteProcessingFailed { name: file.name });
        }

        Ok(file)
    }

    /// Request metadata for an uploaded file, retrying only transient
    /// service unavailability: fixed delay, fixed budget, no backoff.
    async fn request_metadata(&self, file: &RemoteFile) -> Result<Metadata> {
        let schema = metadata_schema();
        let mut attempt = 0;

        loop {
            match self
                .service
                .generate(&self.config.model, EXTRACT_INSTRUCTION, file, &schema)
                .await
            {
                Ok(text) => return parse_metadata(&text),
                Err(e) if e.is_transient() && attempt < self.config.generate_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.generate_retries,
                        error = %e,
                        "Generation temporarily unavailable, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::pdf::fixtures::multipage_pdf;

    /// Scripted in-memory service: pops state and generation responses
    /// from queues, counts calls.
    #[derive(Default)]
    struct FakeService {
        states: Mutex<VecDeque<FileState>>,
        responses: Mutex<VecDeque<Result<String>>>,
        fail_upload: bool,
        uploads: AtomicUsize,
        polls: AtomicUsize,
        generations: AtomicUsize,
    }

    impl FakeService {
        fn new(states: Vec<FileState>, responses: Vec<Result<String>>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn failing_upload() -> Self {
            Self {
                fail_upload: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl DocumentService for FakeService {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            _display_name: &str,
            _mime_type: Option<&str>,
        ) -> Result<RemoteFile> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "upload refused",
                )));
            }
            Ok(RemoteFile {
                name: "files/test".to_string(),
                uri: "https://example.com/files/test".to_string(),
                mime_type: Some("application/pdf".to_string()),
            })
        }

        async fn get_state(&self, _name: &str) -> Result<FileState> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .states
                .lock()
                .unwrap()
                .pop_front()
                .expect("poll past end of scripted states"))
        }

        async fn generate(
            &self,
            _model: &str,
            _instruction: &str,
            _file: &RemoteFile,
            _response_schema: &serde_json::Value,
        ) -> Result<String> {
            self.generations.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("generate past end of scripted responses")
        }
    }

    struct NoopConverter;

    #[async_trait]
    impl OfficeConverter for NoopConverter {
        async fn convert(&self, _source: &[u8], _target_ext: &str) -> Result<Vec<u8>> {
            unreachable!("tests only feed PDF inputs")
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_millis(1),
            retry_delay: Duration::from_millis(1),
            ..PipelineConfig::default()
        }
    }

    fn pipeline(service: Arc<FakeService>) -> MetadataPipeline {
        MetadataPipeline::new(service, Arc::new(NoopConverter), fast_config())
    }

    fn write_test_pdf(dir: &Path) -> PathBuf {
        let path = dir.join("report.pdf");
        std::fs::write(&path, multipage_pdf(&["Quarterly Report"])).unwrap();
        path
    }

    fn ok_response() -> Result<String> {
        Ok(r#"{"title":"Q3 Report","agency":"GAO","year":2024,"topics":["finance"]}"#.to_string())
    }

    fn transient() -> Result<String> {
        Err(Error::TransientService {
            status: 503,
            message: "model overloaded".to_string(),
        })
    }

    #[test]
    fn test_metadata_optional_fields_default_to_none() {
        let metadata = parse_metadata(r#"{"title":"Q3 Report","topics":["finance"]}"#).unwrap();

        assert_eq!(
            metadata,
            Metadata {
                title: "Q3 Report".to_string(),
                agency: None,
                year: None,
                topics: vec!["finance".to_string()],
            }
        );
    }

    #[test]
    fn test_metadata_null_optionals_accepted() {
        let metadata =
            parse_metadata(r#"{"title":"T","agency":null,"year":null,"topics":[]}"#).unwrap();

        assert_eq!(metadata.agency, None);
        assert_eq!(metadata.year, None);
        assert!(metadata.topics.is_empty());
    }

    #[test]
    fn test_metadata_topics_as_string_rejected() {
        let result = parse_metadata(r#"{"title":"T","topics":"finance"}"#);

        match result {
            Err(Error::SchemaValidation { payload, .. }) => {
                assert!(payload.contains("\"finance\""));
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_metadata_missing_title_rejected() {
        let result = parse_metadata(r#"{"topics":["finance"]}"#);
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
    }

    #[test]
    fn test_metadata_invalid_json_rejected() {
        let result = parse_metadata("not json at all");
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
    }

    #[tokio::test]
    async fn test_poller_repolls_until_terminal() {
        let service = Arc::new(FakeService::new(
            vec![FileState::Processing, FileState::Processing, FileState::Active],
            vec![ok_response()],
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());

        let metadata = pipeline(service.clone()).extract_metadata(&path).await.unwrap();

        assert_eq!(metadata.title, "Q3 Report");
        // Initial fetch plus two sleep/re-poll cycles
        assert_eq!(service.polls.load(Ordering::SeqCst), 3);
        assert_eq!(service.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poller_failed_state_stops_polling() {
        let service = Arc::new(FakeService::new(
            vec![FileState::Failed, FileState::Processing],
            vec![ok_response()],
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());

        let result = pipeline(service.clone()).extract_metadata(&path).await;

        assert!(matches!(result, Err(Error::RemoteProcessingFailed { .. })));
        assert_eq!(service.polls.load(Ordering::SeqCst), 1);
        assert_eq!(service.generations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_poll_timeout_when_bounded() {
        let service = Arc::new(FakeService::new(
            vec![FileState::Processing; 100],
            vec![ok_response()],
        ));
        let config = PipelineConfig {
            poll_interval: Duration::from_millis(1),
            max_poll_wait: Some(Duration::from_millis(10)),
            ..PipelineConfig::default()
        };
        let pipeline = MetadataPipeline::new(service, Arc::new(NoopConverter), config);
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());

        let result = pipeline.extract_metadata(&path).await;

        assert!(matches!(result, Err(Error::PollTimeout { .. })));
    }

    #[tokio::test]
    async fn test_retry_budget_allows_three_transient_failures() {
        let service = Arc::new(FakeService::new(
            vec![FileState::Active],
            vec![transient(), transient(), transient(), ok_response()],
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());

        let metadata = pipeline(service.clone()).extract_metadata(&path).await.unwrap();

        assert_eq!(metadata.title, "Q3 Report");
        assert_eq!(service.generations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_propagates_last_error() {
        let service = Arc::new(FakeService::new(
            vec![FileState::Active],
            vec![transient(), transient(), transient(), transient(), ok_response()],
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());

        let result = pipeline(service.clone()).extract_metadata(&path).await;

        assert!(matches!(result, Err(Error::TransientService { .. })));
        // First attempt plus exactly three retries
        assert_eq!(service.generations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_transient_generation_error_not_retried() {
        let service = Arc::new(FakeService::new(
            vec![FileState::Active],
            vec![
                Err(Error::SchemaValidation {
                    reason: "boom".to_string(),
                    payload: String::new(),
                }),
                ok_response(),
            ],
        ));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());

        let result = pipeline(service.clone()).extract_metadata(&path).await;

        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
        assert_eq!(service.generations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_success() {
        let service = Arc::new(FakeService::new(vec![FileState::Active], vec![ok_response()]));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());
        let temp_path = dir.path().join("report_sliced.pdf");

        pipeline(service).extract_metadata(&path).await.unwrap();

        assert!(!temp_path.exists());
        assert!(path.exists(), "original source must never be deleted");
    }

    #[tokio::test]
    async fn test_temp_file_removed_when_upload_fails() {
        let service = Arc::new(FakeService::failing_upload());
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());
        let temp_path = dir.path().join("report_sliced.pdf");

        let result = pipeline(service).extract_metadata(&path).await;

        assert!(result.is_err());
        assert!(!temp_path.exists());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_temp_file_removed_when_processing_fails() {
        let service = Arc::new(FakeService::new(vec![FileState::Failed], vec![]));
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_pdf(dir.path());
        let temp_path = dir.path().join("report_sliced.pdf");

        let result = pipeline(service).extract_metadata(&path).await;

        assert!(matches!(result, Err(Error::RemoteProcessingFailed { .. })));
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_unknown_type_fails_before_upload() {
        let service = Arc::new(FakeService::new(vec![], vec![]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.dat");
        std::fs::write(&path, b"no recognizable magic bytes here").unwrap();

        let result = pipeline(service.clone()).extract_metadata(&path).await;

        assert!(matches!(result, Err(Error::UnsupportedType { .. })));
        assert_eq!(service.uploads.load(Ordering::SeqCst), 0);
    }
}
