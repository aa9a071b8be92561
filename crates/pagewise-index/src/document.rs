//! Uploaded documents and per-page text extraction.

use std::fmt;
use std::path::Path;

use crate::error::{IndexError, Result};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Separates pages in plain-text documents (the form feed `pdftotext` emits).
pub const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }

    /// Sniff the format from the leading bytes.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else {
            Self::Text
        }
    }
}

/// Raw document bytes as uploaded, consumed by [`Document::load`].
#[derive(Clone)]
pub struct Document {
    name: String,
    bytes: Vec<u8>,
    format: DocumentFormat,
    declared_pages: Option<usize>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .field("format", &self.format)
            .field("declared_pages", &self.declared_pages)
            .finish()
    }
}

impl Document {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let format = DocumentFormat::detect(&bytes);
        Self {
            name: name.into(),
            bytes,
            format,
            declared_pages: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }

    /// Page count reported by the uploader. Pages that extract to nothing
    /// (scanned images) still count toward it.
    #[must_use]
    pub fn with_page_count(mut self, pages: usize) -> Self {
        self.declared_pages = Some(pages);
        self
    }

    /// Read a document from disk, picking the format from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or larger than `max_file_size`.
    pub async fn from_path(path: &Path, max_file_size: u64) -> Result<Self> {
        let path = tokio::fs::canonicalize(path).await?;

        let meta = tokio::fs::metadata(&path).await?;
        if meta.len() > max_file_size {
            return Err(IndexError::FileTooLarge(meta.len()));
        }

        let bytes = tokio::fs::read(&path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
            .unwrap_or_else(|| DocumentFormat::detect(&bytes));

        Ok(Self::new(name, bytes).with_format(format))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Extract per-page text, discarding the raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyDocument`] when no page has any text, and an
    /// extraction error when the bytes cannot be parsed.
    pub fn load(self, extractor: &dyn PageExtractor) -> Result<LoadedDocument> {
        let mut pages = extractor.extract_pages(&self.bytes)?;

        if let Some(declared) = self.declared_pages {
            if pages.len() > declared {
                return Err(IndexError::PageCountMismatch {
                    declared,
                    extracted: pages.len(),
                });
            }
            pages.resize(declared, String::new());
        }

        let loaded = LoadedDocument {
            name: self.name,
            pages,
        };
        if !loaded.has_text() {
            tracing::warn!(name = %loaded.name, pages = loaded.page_count(), "no extractable text");
            return Err(IndexError::EmptyDocument);
        }

        tracing::info!(
            name = %loaded.name,
            pages = loaded.page_count(),
            extractor = extractor.name(),
            "extracted document text"
        );
        Ok(loaded)
    }
}

/// Per-page text of a document; `pages[i]` is page `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    name: String,
    pages: Vec<String>,
}

impl LoadedDocument {
    #[must_use]
    pub fn new(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.trim().is_empty())
    }
}

pub trait PageExtractor: Send + Sync {
    /// Text of each page, in page order.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be parsed.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// UTF-8 text with form-feed page breaks. Invalid sequences are replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PageExtractor for PlainTextExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_suffix(PAGE_BREAK).unwrap_or(&text);
        Ok(text.split(PAGE_BREAK).map(str::to_owned).collect())
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[cfg(feature = "pdf")]
impl PageExtractor for PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| IndexError::Extraction(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}

/// Extractor for `format`.
///
/// # Errors
///
/// Returns [`IndexError::UnsupportedFormat`] for PDFs when built without the `pdf` feature.
pub fn extractor_for(format: DocumentFormat) -> Result<Box<dyn PageExtractor>> {
    match format {
        DocumentFormat::Text => Ok(Box::new(PlainTextExtractor)),
        #[cfg(feature = "pdf")]
        DocumentFormat::Pdf => Ok(Box::new(PdfExtractor)),
        #[cfg(not(feature = "pdf"))]
        DocumentFormat::Pdf => Err(IndexError::UnsupportedFormat(
            "pdf (built without the `pdf` feature)".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_text(text: &str) -> Result<LoadedDocument> {
        Document::new("doc.txt", text.as_bytes().to_vec()).load(&PlainTextExtractor)
    }

    #[test]
    fn detects_pdf_magic() {
        assert_eq!(DocumentFormat::detect(b"%PDF-1.7\n..."), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect(b"plain words"), DocumentFormat::Text);
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("docx"), None);
    }

    #[test]
    fn form_feeds_split_pages() {
        let doc = load_text("one\x0ctwo\x0cthree").unwrap();
        assert_eq!(doc.pages(), ["one", "two", "three"]);
        assert_eq!(doc.page_count(), 3);
    }

    #[test]
    fn trailing_form_feed_does_not_add_a_page() {
        let doc = load_text("one\x0ctwo\x0c").unwrap();
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn text_without_breaks_is_one_page() {
        let doc = load_text("just one page").unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn whitespace_only_is_empty_document() {
        assert!(matches!(load_text(" \n\x0c\t\x0c"), Err(IndexError::EmptyDocument)));
        assert!(matches!(load_text(""), Err(IndexError::EmptyDocument)));
    }

    #[test]
    fn declared_pages_pad_missing_text() {
        let doc = Document::new("scan.txt", b"cover".to_vec())
            .with_page_count(3)
            .load(&PlainTextExtractor)
            .unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages()[2], "");
    }

    #[test]
    fn more_pages_than_declared_is_rejected() {
        let err = Document::new("doc.txt", b"a\x0cb\x0cc".to_vec())
            .with_page_count(2)
            .load(&PlainTextExtractor)
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::PageCountMismatch {
                declared: 2,
                extracted: 3
            }
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let doc = Document::new("bin.txt", vec![b'o', b'k', 0xff])
            .load(&PlainTextExtractor)
            .unwrap();
        assert!(doc.pages()[0].starts_with("ok"));
    }

    #[test]
    fn debug_hides_bytes() {
        let doc = Document::new("a.txt", vec![b'x'; 4096]);
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("4096"));
        assert!(!dbg.contains("xxxx"));
    }

    #[test]
    fn text_extractor_always_available() {
        assert_eq!(extractor_for(DocumentFormat::Text).unwrap().name(), "text");
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn pdf_requires_feature() {
        assert!(matches!(
            extractor_for(DocumentFormat::Pdf),
            Err(IndexError::UnsupportedFormat(_))
        ));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn garbage_pdf_is_extraction_error() {
        let err = PdfExtractor.extract_pages(b"%PDF-1.4 not really").unwrap_err();
        assert!(matches!(err, IndexError::Extraction(_)));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn textless_pdf_is_empty_document() {
        let bytes = include_bytes!("../tests/fixtures/blank.pdf").to_vec();
        let doc = Document::new("scan.pdf", bytes);
        assert_eq!(doc.format(), DocumentFormat::Pdf);
        let err = doc.load(&PdfExtractor).unwrap_err();
        assert!(matches!(err, IndexError::EmptyDocument));
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "# Title\x0cbody").unwrap();

        let doc = Document::from_path(&file, DEFAULT_MAX_FILE_SIZE).await.unwrap();
        assert_eq!(doc.name(), "notes.md");
        assert_eq!(doc.format(), DocumentFormat::Text);
        assert_eq!(doc.load(&PlainTextExtractor).unwrap().page_count(), 2);
    }

    #[tokio::test]
    async fn from_path_unknown_extension_sniffs_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("upload.bin");
        std::fs::write(&file, b"%PDF-1.5").unwrap();

        let doc = Document::from_path(&file, DEFAULT_MAX_FILE_SIZE).await.unwrap();
        assert_eq!(doc.format(), DocumentFormat::Pdf);
    }

    #[tokio::test]
    async fn from_path_enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "0123456789").unwrap();

        let err = Document::from_path(&file, 4).await.unwrap_err();
        assert!(matches!(err, IndexError::FileTooLarge(10)));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = Document::from_path(Path::new("/nonexistent/file.pdf"), DEFAULT_MAX_FILE_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
