//! Office document conversion.
//!
//! Slide decks cannot be page-sliced directly; they are converted to a
//! paginated document first. Conversion delegates to a local LibreOffice
//! install. Any failure is fatal for the document (unlike slicing, which
//! falls back to the original): a failed conversion yields no usable
//! artifact at all.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Converts office formats into a paginated document.
#[async_trait]
pub trait OfficeConverter: Send + Sync {
    /// Convert `source` bytes to the target format (e.g. "pdf").
    async fn convert(&self, source: &[u8], target_ext: &str) -> Result<Vec<u8>>;
}

/// Conversion through LibreOffice (`soffice --headless --convert-to`).
pub struct SofficeConverter {
    binary: PathBuf,
}

impl SofficeConverter {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("soffice"),
        }
    }

    /// Use a specific LibreOffice binary instead of resolving `soffice`
    /// from `PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run_soffice(&self, source: &[u8], target_ext: &str) -> anyhow::Result<Vec<u8>> {
        // soffice only works on files, so stage the bytes in a scratch dir
        // that doubles as the output dir.
        let work = tempfile::tempdir().context("Failed to create scratch directory")?;
        let input = work.path().join("source");
        std::fs::write(&input, source).context("Failed to stage source file")?;

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg(target_ext)
            .arg("--outdir")
            .arg(work.path())
            .arg(&input)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "conversion exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let converted = work.path().join(format!("source.{target_ext}"));
        let bytes = std::fs::read(&converted).context("Converted file missing from output dir")?;

        tracing::debug!(size = bytes.len(), target_ext, "Office document converted");

        Ok(bytes)
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OfficeConverter for SofficeConverter {
    async fn convert(&self, source: &[u8], target_ext: &str) -> Result<Vec<u8>> {
        self.run_soffice(source, target_ext)
            .await
            .map_err(|e| Error::Conversion(format!("{e:#}")))
    }
}
