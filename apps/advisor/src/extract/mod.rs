//! Document text extraction: PDF in, plain text out.
//!
//! Pages are read in stored order and concatenated with no separator; page
//! boundaries are not marked in the output. Any page failure fails the whole
//! extraction rather than returning partial text.

use bytes::Bytes;
use tracing::{debug, info};

use crate::errors::AppError;

const PDF_MAGIC: &[u8] = b"%PDF";

/// A document that can hand out the plain text of each page.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Plain text of page `index` (0-based).
    fn page_text(&mut self, index: usize) -> Result<String, AppError>;
}

/// Concatenates the text of every page of `source`, in order.
///
/// Takes the source by value: it is dropped on every return path.
pub fn extract_text<S: PageSource>(mut source: S) -> Result<String, AppError> {
    let mut text = String::new();
    for index in 0..source.page_count() {
        text.push_str(&source.page_text(index)?);
    }
    Ok(text)
}

/// An opened PDF, decoded page by page by `pdf-extract`.
pub struct PdfDocument {
    pages: Vec<String>,
}

impl PdfDocument {
    pub fn from_bytes(data: &[u8]) -> Result<Self, AppError> {
        if !data.starts_with(PDF_MAGIC) {
            let head: Vec<u8> = data.iter().take(4).copied().collect();
            return Err(AppError::DocumentParse(format!(
                "file is not a PDF (first bytes: {head:?})"
            )));
        }

        let pages = pdf_extract::extract_text_from_mem_by_pages(data)
            .map_err(|e| AppError::DocumentParse(e.to_string()))?;
        if pages.is_empty() {
            return Err(AppError::DocumentParse("PDF contains no pages".to_string()));
        }
        debug!("Parsed PDF: {} bytes, {} pages", data.len(), pages.len());
        Ok(Self { pages })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&mut self, index: usize) -> Result<String, AppError> {
        self.pages
            .get_mut(index)
            .map(std::mem::take)
            .ok_or_else(|| {
                AppError::DocumentParse(format!(
                    "page {} is out of range (document has {} pages)",
                    index + 1,
                    self.pages.len()
                ))
            })
    }
}

/// Extracts the text of an uploaded PDF on the blocking pool.
///
/// A panic inside the PDF parser is reported as a `DocumentParse` error.
pub async fn extract_pdf(data: Bytes) -> Result<String, AppError> {
    let size = data.len();
    let text = tokio::task::spawn_blocking(move || {
        PdfDocument::from_bytes(&data).and_then(extract_text)
    })
    .await
    .map_err(|e| {
        if e.is_panic() {
            AppError::DocumentParse("the PDF parser could not process this file".to_string())
        } else {
            AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}"))
        }
    })??;

    info!(
        "Extracted {} characters from {} byte PDF",
        text.chars().count(),
        size
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pdf_with_pages;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StubPages {
        pages: Vec<Result<&'static str, &'static str>>,
        dropped: Arc<AtomicBool>,
    }

    impl StubPages {
        fn new(pages: Vec<Result<&'static str, &'static str>>) -> (Self, Arc<AtomicBool>) {
            let dropped = Arc::new(AtomicBool::new(false));
            (
                Self {
                    pages,
                    dropped: dropped.clone(),
                },
                dropped,
            )
        }
    }

    impl PageSource for StubPages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&mut self, index: usize) -> Result<String, AppError> {
            self.pages[index]
                .map(String::from)
                .map_err(|e| AppError::DocumentParse(e.to_string()))
        }
    }

    impl Drop for StubPages {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_pages_concatenate_in_order_without_separator() {
        let (source, dropped) = StubPages::new(vec![Ok("A"), Ok("B"), Ok("C")]);
        assert_eq!(extract_text(source).unwrap(), "ABC");
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_page_failure_aborts_and_still_releases_source() {
        let (source, dropped) = StubPages::new(vec![Ok("A"), Err("bad xref"), Ok("C")]);
        let err = extract_text(source).unwrap_err();
        assert!(matches!(err, AppError::DocumentParse(ref m) if m == "bad xref"));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_document_yields_empty_text() {
        let (source, _) = StubPages::new(vec![]);
        assert_eq!(extract_text(source).unwrap(), "");
    }

    #[test]
    fn test_non_pdf_bytes_are_rejected() {
        let err = PdfDocument::from_bytes(b"PK\x03\x04 zip archive").err().unwrap();
        assert!(matches!(err, AppError::DocumentParse(ref m) if m.contains("not a PDF")));
    }

    #[test]
    fn test_pdf_document_has_one_entry_per_page() {
        let document = PdfDocument::from_bytes(&pdf_with_pages(&["A", "B", "C"])).unwrap();
        assert_eq!(document.page_count(), 3);
    }

    #[tokio::test]
    async fn test_extract_pdf_reads_pages_in_order() {
        let pdf = pdf_with_pages(&["A", "B", "C"]);
        let text = extract_pdf(Bytes::from(pdf)).await.unwrap();
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_truncated_pdf_is_a_parse_error() {
        let result = extract_pdf(Bytes::from_static(b"%PDF-1.7\n1 0 obj\n<<")).await;
        assert!(matches!(result, Err(AppError::DocumentParse(_))));
    }
}
