//! Deckmeta Core - document metadata extraction pipeline
//!
//! Normalizes heterogeneous document files (slide decks, PDFs, anything
//! else) into a form a remote document-understanding service accepts,
//! uploads them, waits for server-side processing, and extracts
//! structured metadata through a schema-constrained generation call:
//! - MIME sniffing from file bytes (infer)
//! - Format-dependent preprocessing: page slicing (lopdf) and
//!   office-to-PDF conversion (LibreOffice)
//! - Upload + processing-state polling and metadata extraction with
//!   bounded retry (reqwest against the Gemini API)
//!
//! The single entry point is [`MetadataPipeline::extract_metadata`].

pub mod config;
pub mod convert;
pub mod error;
pub mod ingest;
pub mod pdf;
pub mod processor;
pub mod remote;
pub mod sniff;
pub mod temp;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use ingest::{Metadata, MetadataPipeline};
pub use remote::gemini::GeminiClient;
pub use remote::DocumentService;
