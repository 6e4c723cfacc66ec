//! Page slicing for paginated documents.

use anyhow::{Context, Result};
use lopdf::Document;

/// Bound a PDF to its first `max_pages` pages.
///
/// Documents already within the bound are returned byte-identical, so the
/// common case avoids a needless re-encode. Oversized documents keep
/// exactly the first `max_pages` pages in original order.
pub fn slice_pdf(pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf_bytes).context("Failed to parse PDF")?;
    let total_pages = doc.get_pages().len();

    if total_pages <= max_pages {
        tracing::debug!(total_pages, max_pages, "PDF already within page limit, keeping original");
        return Ok(pdf_bytes.to_vec());
    }

    let beyond_limit: Vec<u32> = (max_pages as u32 + 1..=total_pages as u32).collect();
    doc.delete_pages(&beyond_limit);
    doc.prune_objects();

    let mut sliced = Vec::new();
    doc.save_to(&mut sliced)
        .context("Failed to serialize sliced PDF")?;

    tracing::info!(total_pages, kept = max_pages, "PDF sliced");

    Ok(sliced)
}

/// Fail-soft slicing: on any error, log and return the original bytes.
///
/// A large but complete upload beats pipeline failure for one document in
/// a batch job.
pub fn slice_pdf_or_original(pdf_bytes: Vec<u8>, max_pages: usize) -> Vec<u8> {
    match slice_pdf(&pdf_bytes, max_pages) {
        Ok(sliced) => sliced,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to slice PDF, keeping original");
            pdf_bytes
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::multipage_pdf;
    use super::*;

    #[test]
    fn test_slice_within_limit_is_identity() {
        let pdf_bytes = multipage_pdf(&["Page One", "Page Two", "Page Three"]);

        let sliced = slice_pdf(&pdf_bytes, 10).unwrap();

        // Byte-identical: no re-encoding drift for documents under the limit
        assert_eq!(sliced, pdf_bytes);
    }

    #[test]
    fn test_slice_at_exact_limit_is_identity() {
        let pdf_bytes = multipage_pdf(&["One", "Two"]);

        let sliced = slice_pdf(&pdf_bytes, 2).unwrap();

        assert_eq!(sliced, pdf_bytes);
    }

    #[test]
    fn test_slice_keeps_first_pages_in_order() {
        let pdf_bytes = multipage_pdf(&["Page One", "Page Two", "Page Three", "Page Four"]);

        let sliced = slice_pdf(&pdf_bytes, 2).unwrap();
        let doc = Document::load_mem(&sliced).unwrap();

        assert_eq!(doc.get_pages().len(), 2);
        let first = doc.extract_text(&[1]).unwrap();
        let second = doc.extract_text(&[2]).unwrap();
        assert!(first.contains("Page One"), "page 1 was: {first}");
        assert!(second.contains("Page Two"), "page 2 was: {second}");

        let all = doc.extract_text(&[1, 2]).unwrap();
        assert!(!all.contains("Page Three"));
        assert!(!all.contains("Page Four"));
    }

    #[test]
    fn test_slice_invalid_pdf_errors() {
        let result = slice_pdf(b"this is not a pdf", 10);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse PDF"));
    }

    #[test]
    fn test_slice_or_original_falls_back_on_error() {
        let garbage = b"this is not a pdf".to_vec();

        let result = slice_pdf_or_original(garbage.clone(), 10);

        assert_eq!(result, garbage);
    }

    #[test]
    fn test_slice_or_original_slices_valid_pdf() {
        let pdf_bytes = multipage_pdf(&["A", "B", "C"]);

        let result = slice_pdf_or_original(pdf_bytes, 1);
        let doc = Document::load_mem(&result).unwrap();

        assert_eq!(doc.get_pages().len(), 1);
    }
}
