//! Format-dependent preprocessing strategies.
//!
//! Each processor declares which content types it accepts and transforms a
//! source file into the artifact actually handed to the upload step. The
//! registry dispatches to the first matching processor; the default
//! processor accepts every type and must stay last, so dispatch always
//! succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::convert::OfficeConverter;
use crate::error::{Error, Result};
use crate::pdf;
use crate::sniff::{PDF_MIME_TYPE, POWERPOINT_MIME_TYPE};
use crate::temp;

/// The artifact handed to the upload step.
///
/// Constructed once per source file by exactly one processor, read-only
/// afterward. A populated `temp_file_path` transfers cleanup ownership to
/// the pipeline; the file is deleted unconditionally once the
/// upload+extraction span completes.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Bytes to upload: the original file or a generated intermediate
    pub file_path: PathBuf,
    /// Content type to declare; `None` lets the service infer it
    pub mime_type: Option<String>,
    /// Set only when preprocessing wrote a new file
    pub temp_file_path: Option<PathBuf>,
    /// Human-readable label sent alongside the upload
    pub display_name: String,
}

#[async_trait]
trait FileProcessor: Send + Sync {
    fn can_handle(&self, mime_type: &str) -> bool;
    async fn process(&self, file_path: &Path) -> Result<ProcessedFile>;
}

/// Slide decks: convert to PDF, slice, upload the intermediate.
struct PowerPointProcessor {
    converter: Arc<dyn OfficeConverter>,
    max_pages: usize,
}

#[async_trait]
impl FileProcessor for PowerPointProcessor {
    fn can_handle(&self, mime_type: &str) -> bool {
        mime_type == POWERPOINT_MIME_TYPE
    }

    async fn process(&self, file_path: &Path) -> Result<ProcessedFile> {
        tracing::info!(path = %file_path.display(), "Processing PowerPoint file");

        let source = std::fs::read(file_path)?;
        let temp_info = temp::temp_file_path(file_path, "converted_sliced", "pdf");

        let pdf_bytes = self.converter.convert(&source, "pdf").await?;
        let sliced = pdf::slice_pdf_or_original(pdf_bytes, self.max_pages);

        std::fs::write(&temp_info.path, sliced)?;
        tracing::debug!(temp = %temp_info.path.display(), "PowerPoint converted to PDF and sliced");

        Ok(ProcessedFile {
            file_path: temp_info.path.clone(),
            mime_type: Some(PDF_MIME_TYPE.to_string()),
            temp_file_path: Some(temp_info.path),
            display_name: temp_info.display_name,
        })
    }
}

/// PDFs: slice in place, upload the intermediate.
struct PdfProcessor {
    max_pages: usize,
}

#[async_trait]
impl FileProcessor for PdfProcessor {
    fn can_handle(&self, mime_type: &str) -> bool {
        mime_type == PDF_MIME_TYPE
    }

    async fn process(&self, file_path: &Path) -> Result<ProcessedFile> {
        tracing::info!(path = %file_path.display(), "Processing PDF file");

        let source = std::fs::read(file_path)?;
        let temp_info = temp::temp_file_path(file_path, "sliced", "pdf");

        let sliced = pdf::slice_pdf_or_original(source, self.max_pages);

        std::fs::write(&temp_info.path, sliced)?;
        tracing::debug!(temp = %temp_info.path.display(), "PDF sliced");

        Ok(ProcessedFile {
            file_path: temp_info.path.clone(),
            mime_type: Some(PDF_MIME_TYPE.to_string()),
            temp_file_path: Some(temp_info.path),
            display_name: temp_info.display_name,
        })
    }
}

/// Everything else: upload the original file untouched and let the remote
/// service infer the content type.
struct DefaultProcessor;

#[async_trait]
impl FileProcessor for DefaultProcessor {
    fn can_handle(&self, _mime_type: &str) -> bool {
        true
    }

    async fn process(&self, file_path: &Path) -> Result<ProcessedFile> {
        let display_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        Ok(ProcessedFile {
            file_path: file_path.to_path_buf(),
            mime_type: None,
            temp_file_path: None,
            display_name,
        })
    }
}

/// Ordered strategy dispatch over the format processors.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn FileProcessor>>,
}

impl ProcessorRegistry {
    pub fn new(converter: Arc<dyn OfficeConverter>, config: &PipelineConfig) -> Self {
        Self {
            processors: vec![
                Box::new(PowerPointProcessor {
                    converter,
                    max_pages: config.max_pages,
                }),
                Box::new(PdfProcessor {
                    max_pages: config.max_pages,
                }),
                // Accepts all types; must stay last
                Box::new(DefaultProcessor),
            ],
        }
    }

    /// Preprocess a source file for upload.
    pub async fn process_file(&self, file_path: &Path, mime_type: &str) -> Result<ProcessedFile> {
        let processor = self
            .processors
            .iter()
            .find(|p| p.can_handle(mime_type))
            // Unreachable while the catch-all stays registered last
            .ok_or_else(|| Error::UnsupportedType {
                path: file_path.to_path_buf(),
            })?;

        processor.process(file_path).await
    }
}
